//!
//! src/config.rs
//!
//! Reads environment (and .env) into the typed configuration the
//! clients, generators and http server are built from
//!

use std::{net::SocketAddr, path::PathBuf, time};

use url::Url;

use crate::errors::AlterEgoError;

/// Constants for HTTP Config
pub const HTTP_TIMEOUT: u64 = 8000;
pub const HTTP_CONNECT_TIMEOUT: u64 = 2000;
pub const HTTP_POOL_MAX_IDLE: usize = 16;
pub const HTTP_POOL_IDLE_TIMEOUT: u64 = 90000;
pub const HTTP_MAX_REDIRECTS: u8 = 4;

/// Diffusion renders are slow on cpu, so they get their own timeout
pub const IMAGE_TIMEOUT: u64 = 600_000;

pub const SPOTIFY_SCOPE: &str = "user-top-read user-read-recently-played";

/// Wrapper over env::var to return an invalid enviroment var error
fn env_check(s: &str) -> Result<String, AlterEgoError> {
    match std::env::var(s) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AlterEgoError::Config(format!("{s} was not set"))),
    }
}

fn env_or(s: &str, default: &str) -> String {
    std::env::var(s)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_to_uint(s: &str, default: u32) -> u32 {
    match std::env::var(s) {
        Ok(s) => s.trim().parse::<u32>().unwrap_or(default),
        Err(_) => default
    }
}

fn env_to_float(s: &str, default: f32) -> f32 {
    match std::env::var(s) {
        Ok(s) => s.trim().parse::<f32>().unwrap_or(default),
        Err(_) => default
    }
}

/// Ensures that url is https
fn ensure_https(url: &Url) -> Result<(), String> {
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(format!("URL must be https: {url}"))
    }
}

fn ensure_host(url: &Url, expected_host: &str) -> Result<(), String> {
    match url.host_str() {
        Some(h) if h.eq_ignore_ascii_case(expected_host) => Ok(()),
        Some(h) => Err(
            format!("Unexpected host for {url} (got {h}, expected {expected_host})")
        ),
        None => Err(format!("URL missing host: {url}"))
    }
}

fn ensure_trailing_slash(url: &mut Url) {
    if !url.path().ends_with('/') {
        let mut path = url.path().to_string();
        path.push('/');
        url.set_path(&path);
    }
}

fn parse_url(name: &str, raw: &str) -> Result<Url, AlterEgoError> {
    Url::parse(raw).map_err(|e| AlterEgoError::Config(format!("{name} invalid {e}")))
}

/// Configuration that Spotify expects for the authorization code flow
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: Url,
    pub scope: String,
    pub authorize_url: Url,
    pub token_url: Url,
    pub api_base: Url,
}

fn build_spotify() -> Result<SpotifyConfig, AlterEgoError> {
    let client_id     = env_check("SPOTIFY_CLIENT_ID")?;
    let client_secret = env_check("SPOTIFY_CLIENT_SECRET")?;
    let redirect_uri  = env_check("SPOTIFY_REDIRECT_URI")?;

    let authorize_url = env_or("SPOTIFY_AUTH_URL", "https://accounts.spotify.com/authorize");
    let token_url     = env_or("SPOTIFY_TOKEN_URL", "https://accounts.spotify.com/api/token");
    let api_base      = env_or("SPOTIFY_API_BASE", "https://api.spotify.com/v1/");

    let redirect_uri  = parse_url("SPOTIFY_REDIRECT_URI", &redirect_uri)?;
    let authorize_url = parse_url("SPOTIFY_AUTH_URL", &authorize_url)?;
    let token_url     = parse_url("SPOTIFY_TOKEN_URL", &token_url)?;
    let mut api_base  = parse_url("SPOTIFY_API_BASE", &api_base)?;

    // ensure valid https and hostname for the spotify urls
    ensure_https(&authorize_url).map_err(AlterEgoError::Config)?;
    ensure_https(&token_url).map_err(AlterEgoError::Config)?;
    ensure_https(&api_base).map_err(AlterEgoError::Config)?;
    ensure_host(&authorize_url, "accounts.spotify.com").map_err(AlterEgoError::Config)?;
    ensure_host(&token_url, "accounts.spotify.com").map_err(AlterEgoError::Config)?;
    ensure_host(&api_base, "api.spotify.com").map_err(AlterEgoError::Config)?;

    ensure_trailing_slash(&mut api_base);

    Ok( SpotifyConfig {
        client_id,
        client_secret,
        redirect_uri,
        scope: SPOTIFY_SCOPE.to_string(),
        authorize_url,
        token_url,
        api_base
    })
}

///
/// Configuration for Http timeouts, pools, etc.
///
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: time::Duration,
    pub connect_timeout: time::Duration,
    pub pool_max_idle_per_host: usize,
    pub pool_idle_timeout: time::Duration,
    pub max_redirects: u8,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: time::Duration::from_millis(HTTP_TIMEOUT),
            connect_timeout: time::Duration::from_millis(HTTP_CONNECT_TIMEOUT),
            pool_max_idle_per_host: HTTP_POOL_MAX_IDLE,
            pool_idle_timeout: time::Duration::from_millis(HTTP_POOL_IDLE_TIMEOUT),
            max_redirects: HTTP_MAX_REDIRECTS,
        }
    }
}

///
/// Configuration for the local text generation cli
///
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub binary: String,
    pub model: String,
    pub timeout: Option<time::Duration>,   // None waits on the cli forever
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            binary: "ollama".to_string(),
            model: "llama3".to_string(),
            timeout: None
        }
    }
}

fn build_generator() -> GeneratorConfig {
    let timeout = match env_to_uint("GENERATOR_TIMEOUT_SECS", 0) {
        0 => None,
        secs => Some(time::Duration::from_secs(secs as u64))
    };
    GeneratorConfig {
        binary: env_or("OLLAMA_BIN", "ollama"),
        model: env_or("OLLAMA_MODEL", "llama3"),
        timeout
    }
}

///
/// Configuration for the stable diffusion endpoint and where renders land
///
#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub base_url: Url,          // http://127.0.0.1:7860/
    pub output_dir: PathBuf,    // served under /static
    pub steps: u32,             // default 30
    pub guidance_scale: f32,    // default 7.5
    pub width: u32,
    pub height: u32,
    pub timeout: time::Duration
}

fn build_image() -> Result<ImageConfig, AlterEgoError> {
    let mut base_url = parse_url(
        "DIFFUSION_URL",
        &env_or("DIFFUSION_URL", "http://127.0.0.1:7860/")
    )?;
    ensure_trailing_slash(&mut base_url);

    Ok( ImageConfig {
        base_url,
        output_dir: PathBuf::from(env_or("IMAGE_OUTPUT_DIR", "static")),
        steps: env_to_uint("IMAGE_STEPS", 30),
        guidance_scale: env_to_float("IMAGE_GUIDANCE", 7.5),
        width: env_to_uint("IMAGE_WIDTH", 512),
        height: env_to_uint("IMAGE_HEIGHT", 512),
        timeout: time::Duration::from_millis(IMAGE_TIMEOUT)
    })
}

///
/// Configuration for the http surface
///
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub prompt_template: PathBuf,
    pub ui_page: PathBuf,
    pub secure_cookies: bool
}

fn build_server(spotify: &SpotifyConfig) -> Result<ServerConfig, AlterEgoError> {
    let host = env_or("BIND_HOST", "127.0.0.1");
    let port = env_to_uint("PORT", 5000);
    let bind: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| AlterEgoError::Config(format!("invalid bind address {host}:{port}: {e}")))?;

    Ok( ServerConfig {
        bind,
        prompt_template: PathBuf::from(env_or("PROMPT_TEMPLATE_PATH", "spotify_prompt.txt")),
        ui_page: PathBuf::from(env_or("UI_PAGE_PATH", "templates/index.html")),
        secure_cookies: spotify.redirect_uri.scheme() == "https"
    })
}

///
/// Configuration for Logger
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter_directives: String,
    pub include_file_line: bool,
    pub include_target: bool,
    pub format: LogFormat,
    pub log_dir: Option<PathBuf>,   // daily rolling file instead of stdout
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter_directives: "info,alter_ego=debug,reqwest=warn,tower_http=info".to_string(),
            include_file_line: true,
            include_target: true,
            format: LogFormat::Json,
            log_dir: None
        }
    }
}

fn build_logging() -> LoggingConfig {
    let format = match env_or("LOG_FORMAT", "json").to_ascii_lowercase().as_str() {
        "pretty" | "text" => LogFormat::Pretty,
        _ => LogFormat::Json
    };
    let log_dir = std::env::var("LOG_DIR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);
    LoggingConfig { format, log_dir, ..LoggingConfig::default() }
}

///
/// AppConfig which holds everything main needs to wire the service
///
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub spotify: SpotifyConfig,
    pub http: HttpConfig,
    pub generator: GeneratorConfig,
    pub image: ImageConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig
}

///
/// Return all environment variables to caller at program start.
///
pub fn load_config() -> Result<AppConfig, AlterEgoError> {
    dotenvy::dotenv().ok();

    let spotify   = build_spotify()?;
    let http      = HttpConfig::default();
    let generator = build_generator();
    let image     = build_image()?;
    let server    = build_server(&spotify)?;
    let logging   = build_logging();

    Ok( AppConfig { spotify, http, generator, image, server, logging } )
}
