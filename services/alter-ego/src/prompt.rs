//!
//! src/prompt.rs
//!
//! Template store, prompt rendering for the text generator and the
//! style preamble bolted onto every image directive
//!

use std::path::{Path, PathBuf};

use crate::errors::AlterEgoError;
use crate::types::TrackRecord;

pub const TOP_TRACKS_TOKEN: &str = "{{TOP_TRACKS}}";
pub const RECENT_TRACKS_TOKEN: &str = "{{RECENT_TRACKS}}";

pub const STYLE_PREAMBLE: &str = "Pixar-style 3D character portrait. Bust shot, centered face, \
    expressive cartoon features, big eyes, cinematic lighting.";

/// Source of the generation prompt template
pub trait TemplateStore: Send + Sync {
    fn load_template(&self) -> Result<String, AlterEgoError>;
}

/// Reads the template from disk on every call so edits apply without restart
#[derive(Debug, Clone)]
pub struct FileTemplateStore {
    path: PathBuf
}

impl FileTemplateStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }
}

impl TemplateStore for FileTemplateStore {
    fn load_template(&self) -> Result<String, AlterEgoError> {
        std::fs::read_to_string(&self.path).map_err(|e| AlterEgoError::Config(
            format!("prompt template {}: {e}", self.path.display())
        ))
    }
}

/// `- '<name>' by <a1, a2>` per track, newline separated
pub fn render_track_list(tracks: &[TrackRecord]) -> String {
    tracks.iter()
        .map(|t| format!("- '{}' by {}", t.name, t.artists.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Substitutes both track lists into the template. A missing token is
/// left alone rather than reported.
pub fn build_prompt(template: &str, top: &[TrackRecord], recent: &[TrackRecord]) -> String {
    template
        .replace(TOP_TRACKS_TOKEN, &render_track_list(top))
        .replace(RECENT_TRACKS_TOKEN, &render_track_list(recent))
}

pub fn format_image_prompt(directive: &str) -> String {
    if directive.is_empty() {
        return STYLE_PREAMBLE.to_string();
    }
    format!("{STYLE_PREAMBLE} {directive}")
}
