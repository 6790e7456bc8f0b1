//!
//! src/main.rs
//!
//! Wires configuration, logging and the collaborators into the http
//! server, then runs until ctrl-c
//!

mod config;
mod errors;
mod logging;

mod auth;
mod fetch;
mod generator;
mod image;
mod normalize;
mod pipeline;
mod prompt;
mod response;
mod server;
mod types;
mod username;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::errors::AlterEgoError;

#[tokio::main]
async fn main() -> Result<(), AlterEgoError> {
    let cfgs = config::load_config()?;
    let _guard = logging::init_logging(&cfgs.logging)?;

    tracing::info!(
        service = "alter-ego",
        version = %env!("CARGO_PKG_VERSION"),
        bind = %cfgs.server.bind,
        model = %cfgs.generator.model,
        "starting"
    );

    let spotify  = Arc::new(fetch::SpotifyClient::new(&cfgs.http, &cfgs.spotify)?);
    let text     = Arc::new(generator::OllamaCli::new(&cfgs.generator));
    let images   = Arc::new(image::DiffusionClient::new(&cfgs.image)?);
    let template = Arc::new(prompt::FileTemplateStore::new(&cfgs.server.prompt_template));

    tokio::fs::create_dir_all(images.output_dir()).await?;

    let state = server::AppState {
        sessions: Arc::new(auth::SessionStore::new()),
        history: spotify.clone(),
        tokens: spotify,
        pipeline: Arc::new(pipeline::CharacterPipeline::new(template, text, images.clone())),
        ui_page: cfgs.server.ui_page.clone(),
        static_dir: images.output_dir().to_path_buf(),
        secure_cookies: cfgs.server.secure_cookies
    };

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("shutdown.signal"),
            Err(e) => tracing::error!(error = %e, "shutdown.signal.failed")
        }
        trigger.cancel();
    });

    let listener = tokio::net::TcpListener::bind(cfgs.server.bind).await?;
    server::serve(listener, server::router(state), shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrackRecord;

    fn live() -> bool {
        std::env::var("LIVE_HTTP").ok().as_deref() == Some("1")
    }

    fn track(name: &str, artist: &str) -> TrackRecord {
        TrackRecord {
            id: name.to_lowercase(),
            name: name.to_string(),
            artists: vec![artist.to_string()],
            album: String::new(),
            popularity: 0,
            duration_ms: 0,
            external_urls: String::new(),
            preview_url: None,
            album_cover: None,
            played_at: None
        }
    }

    /// Runs the local model and diffusion server end to end on a fixed history
    #[tokio::test]
    #[allow(dead_code)]
    async fn character_pipeline_testbench() -> Result<(), AlterEgoError> {
        dotenvy::dotenv().ok();

        if !live() {
            eprintln!("Set LIVE_HTTP=1 to run");
            return Ok(())
        }

        let cfgs = config::load_config()?;
        let pipeline = pipeline::CharacterPipeline::new(
            Arc::new(prompt::FileTemplateStore::new(&cfgs.server.prompt_template)),
            Arc::new(generator::OllamaCli::new(&cfgs.generator)),
            Arc::new(image::DiffusionClient::new(&cfgs.image)?)
        );

        let top = vec![track("Disorder", "Joy Division"), track("Cherry Wine", "Hozier")];
        let recent = vec![track("Motion Sickness", "Phoebe Bridgers")];
        let result = pipeline.generate(&top, &recent).await?;

        println!("result: {}", serde_json::to_string_pretty(&result)?);
        assert!(!result.username.is_empty());
        Ok(())
    }
}
