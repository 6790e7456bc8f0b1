//!
//! src/pipeline.rs
//!
//! Sequences one character request: history -> prompt -> text generator
//! -> sections -> image prompt -> render -> username. Collaborator
//! errors propagate untouched, nothing is retried or cached.
//!

use std::{path::Path, sync::Arc};

use tracing::{debug, info, warn};

use crate::auth::AuthSession;
use crate::errors::AlterEgoError;
use crate::fetch::{TimeRange, TrackHistory};
use crate::generator::TextGenerator;
use crate::image::ImageGenerator;
use crate::normalize::{normalize_recent_tracks, normalize_top_tracks};
use crate::prompt::{build_prompt, format_image_prompt, TemplateStore};
use crate::response::parse_generator_response;
use crate::types::{GenerationResult, TrackRecord};
use crate::username::{generate_username, generate_username_with, GenreBucket, Picker};

pub const TOP_TRACKS_LIMIT: u32 = 10;
pub const RECENT_TRACKS_LIMIT: u32 = 50;
pub const STATIC_PREFIX: &str = "/static";

/// Normalized top and recent lists for one listener
#[derive(Debug, Clone, Default)]
pub struct ListeningHistory {
    pub top: Vec<TrackRecord>,
    pub recent: Vec<TrackRecord>
}

pub async fn fetch_top(history: &dyn TrackHistory, session: &AuthSession) ->
    Result<Vec<TrackRecord>, AlterEgoError> {
    let raw = history.fetch_top_tracks(session, TOP_TRACKS_LIMIT, TimeRange::LongTerm).await?;
    Ok( normalize_top_tracks(&raw) )
}

pub async fn fetch_recent(history: &dyn TrackHistory, session: &AuthSession) ->
    Result<Vec<TrackRecord>, AlterEgoError> {
    let raw = history.fetch_recent_tracks(session, RECENT_TRACKS_LIMIT).await?;
    Ok( normalize_recent_tracks(&raw) )
}

pub async fn fetch_history(history: &dyn TrackHistory, session: &AuthSession) ->
    Result<ListeningHistory, AlterEgoError> {
    let top = fetch_top(history, session).await?;
    let recent = fetch_recent(history, session).await?;
    Ok( ListeningHistory { top, recent } )
}

/// `/static/<file name>` for a render written into the served directory
pub fn image_url_for(path: &Path) -> String {
    let name = path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{STATIC_PREFIX}/{name}")
}

/// Everything but the username, which needs the randomness source
struct Draft {
    prompt: String,
    raw_response: String,
    description: String,
    image_directive: String,
    formatted_prompt: String,
    image_url: String,
    degraded: bool
}

impl Draft {
    fn finish(self, username: String) -> GenerationResult {
        GenerationResult {
            prompt: self.prompt,
            raw_response: self.raw_response,
            character_description: self.description,
            image_prompt: self.image_directive,
            formatted_prompt: self.formatted_prompt,
            image_url: self.image_url,
            username,
            degraded: self.degraded
        }
    }
}

#[derive(Clone)]
pub struct CharacterPipeline {
    templates: Arc<dyn TemplateStore>,
    text: Arc<dyn TextGenerator>,
    images: Arc<dyn ImageGenerator>
}

impl CharacterPipeline {
    pub fn new(
        templates: Arc<dyn TemplateStore>,
        text: Arc<dyn TextGenerator>,
        images: Arc<dyn ImageGenerator>
    ) -> Self {
        Self { templates, text, images }
    }

    /// Full request: fetch both lists for the session, then generate
    pub async fn run(&self, history: &dyn TrackHistory, session: &AuthSession) ->
        Result<GenerationResult, AlterEgoError> {
        let listening = fetch_history(history, session).await?;
        self.generate(&listening.top, &listening.recent).await
    }

    pub async fn generate(&self, top: &[TrackRecord], recent: &[TrackRecord]) ->
        Result<GenerationResult, AlterEgoError> {
        let draft = self.draft(top, recent).await?;
        let username = generate_username(&draft.description);
        Ok( draft.finish(username) )
    }

    pub async fn generate_with<P: Picker + Send>(
        &self,
        top: &[TrackRecord],
        recent: &[TrackRecord],
        picker: &mut P
    ) -> Result<GenerationResult, AlterEgoError> {
        let draft = self.draft(top, recent).await?;
        let username = generate_username_with(&draft.description, picker);
        Ok( draft.finish(username) )
    }

    async fn draft(&self, top: &[TrackRecord], recent: &[TrackRecord]) -> Result<Draft, AlterEgoError> {
        info!(top = top.len(), recent = recent.len(), "pipeline.start");

        let template = self.templates.load_template()?;
        let prompt = build_prompt(&template, top, recent);

        let raw_response = self.text.generate(&prompt).await?;
        let sections = parse_generator_response(&raw_response);
        let degraded = !sections.is_complete();
        if degraded {
            warn!(
                has_description = !sections.description.is_empty(),
                has_image = !sections.image_directive.is_empty(),
                "pipeline.parse.degraded"
            );
        }
        debug!(
            bucket = GenreBucket::classify(&sections.description).map(GenreBucket::as_str),
            "pipeline.parse"
        );

        let formatted_prompt = format_image_prompt(&sections.image_directive);
        let image_path = self.images.generate_image(&formatted_prompt).await?;

        info!(image = %image_path.display(), degraded, "pipeline.done");
        Ok( Draft {
            prompt,
            raw_response,
            description: sections.description,
            image_directive: sections.image_directive,
            formatted_prompt,
            image_url: image_url_for(&image_path),
            degraded
        })
    }
}
