//!
//! src/image.rs
//!
//! Portrait rendering through a local stable diffusion http endpoint
//! (automatic1111-style txt2img). Renders land on disk under a fresh
//! uuid file name.
//!

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::ImageConfig;
use crate::errors::AlterEgoError;
use crate::fetch::send_json;

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Renders the prompt and returns where the png was written
    async fn generate_image(&self, prompt: &str) -> Result<PathBuf, AlterEgoError>;
}

#[derive(Debug, Serialize)]
struct Txt2ImgRequest<'a> {
    prompt: &'a str,
    steps: u32,
    cfg_scale: f32,
    width: u32,
    height: u32,
    batch_size: u32
}

#[derive(Debug, Deserialize)]
struct Txt2ImgResponse {
    #[serde(default)]
    images: Vec<String>
}

#[derive(Debug, Clone)]
pub struct DiffusionClient {
    http: Client,
    endpoint: Url,
    cfg: ImageConfig
}

impl DiffusionClient {
    pub fn new(cfg: &ImageConfig) -> Result<Self, AlterEgoError> {
        let http = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| AlterEgoError::Http(format!("build client: {e}")))?;
        let endpoint = cfg.base_url.join("sdapi/v1/txt2img")
            .map_err(|e| AlterEgoError::Config(format!("DIFFUSION_URL invalid {e}")))?;
        Ok( Self { http, endpoint, cfg: cfg.clone() } )
    }

    pub fn output_dir(&self) -> &Path {
        &self.cfg.output_dir
    }
}

/// Strips a `data:image/png;base64,` prefix some servers add
fn decode_image(b64: &str) -> Result<Vec<u8>, AlterEgoError> {
    let payload = b64.split_once(',').map(|(_, data)| data).unwrap_or(b64);
    STANDARD.decode(payload.trim())
        .map_err(|e| AlterEgoError::Image(format!("base64 decode: {e}")))
}

/// Writes through a temp file in the target dir, then renames into place
pub fn save_png(dir: &Path, bytes: &[u8]) -> Result<PathBuf, AlterEgoError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.png", uuid::Uuid::new_v4()));

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut temp, bytes)?;
    temp.persist(&path)
        .map_err(|e| AlterEgoError::Image(format!("persist {}: {e}", path.display())))?;
    Ok(path)
}

#[async_trait]
impl ImageGenerator for DiffusionClient {
    async fn generate_image(&self, prompt: &str) -> Result<PathBuf, AlterEgoError> {
        let body = Txt2ImgRequest {
            prompt,
            steps: self.cfg.steps,
            cfg_scale: self.cfg.guidance_scale,
            width: self.cfg.width,
            height: self.cfg.height,
            batch_size: 1
        };
        tracing::info!(steps = body.steps, cfg_scale = body.cfg_scale, "image.render.start");

        let response: Txt2ImgResponse = send_json(self.http.post(self.endpoint.clone()).json(&body))
            .await
            .map_err(|e| AlterEgoError::Image(e.to_string()))?;
        let first = response.images.first()
            .ok_or_else(|| AlterEgoError::Image("diffusion server returned no images".to_string()))?;
        let bytes = decode_image(first)?;

        let dir = self.cfg.output_dir.clone();
        let path = tokio::task::spawn_blocking(move || save_png(&dir, &bytes))
            .await
            .map_err(|e| AlterEgoError::Image(format!("save task: {e}")))??;

        tracing::info!(path = %path.display(), "image.render.done");
        Ok(path)
    }
}
