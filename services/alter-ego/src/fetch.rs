//!
//! src/fetch.rs
//!
//! Defines methods for hitting the Spotify accounts and web api
//! endpoints on behalf of the signed-in listener
//!

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, header, redirect, RequestBuilder};
use serde::de::DeserializeOwned;
use url::Url;

use crate::auth::{AuthSession, TokenLifecycle, TokenResponse};
use crate::config::{HttpConfig, SpotifyConfig};
use crate::errors::AlterEgoError;
use crate::types::{Paging, RawPlayEvent, RawTrack, RawUser};

/// Window Spotify aggregates top tracks over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRange {
    ShortTerm,
    MediumTerm,
    LongTerm
}

impl TimeRange {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeRange::ShortTerm  => "short_term",
            TimeRange::MediumTerm => "medium_term",
            TimeRange::LongTerm   => "long_term"
        }
    }
}

/// Listening history as the pipeline consumes it
#[async_trait]
pub trait TrackHistory: Send + Sync {
    async fn fetch_top_tracks(
        &self,
        session: &AuthSession,
        limit: u32,
        time_range: TimeRange
    ) -> Result<Vec<RawTrack>, AlterEgoError>;

    async fn fetch_recent_tracks(
        &self,
        session: &AuthSession,
        limit: u32
    ) -> Result<Vec<RawPlayEvent>, AlterEgoError>;

    async fn current_user(&self, session: &AuthSession) -> Result<RawUser, AlterEgoError>;
}

/// Client building functionality
fn client_helper(http: &HttpConfig) -> reqwest::ClientBuilder {
    Client::builder()
        .timeout(http.timeout)
        .connect_timeout(http.connect_timeout)
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .pool_idle_timeout(Some(http.pool_idle_timeout))
        .redirect(redirect::Policy::limited(http.max_redirects as usize))
}

pub fn base_client(http: &HttpConfig) -> Result<Client, AlterEgoError> {
    let mut h = header::HeaderMap::new();
    h.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
    client_helper(http)
        .default_headers(h)
        .build()
        .map_err(|e| AlterEgoError::Http(format!("build client: {e}")))
}

/// Sends and decodes, mapping any non-2xx into an upstream error
pub async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, AlterEgoError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = %status, "spotify.status");
        return Err(AlterEgoError::Upstream(format!("status {status}: {body}")));
    }
    let bytes = response.bytes().await?;
    Ok( serde_json::from_slice(&bytes)? )
}

#[derive(Clone, Debug)]
pub struct SpotifyClient {
    pub http: Client,
    pub cfg: SpotifyConfig
}

impl SpotifyClient {
    pub fn new(http_config: &HttpConfig, cfg: &SpotifyConfig) -> Result<Self, AlterEgoError> {
        let http = base_client(http_config)?;
        Ok( Self {
            http,
            cfg: cfg.clone()
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, AlterEgoError> {
        self.cfg.api_base
            .join(path)
            .map_err(|e| AlterEgoError::Config(format!("api path {path}: {e}")))
    }

    /// POST /api/token with client credentials in the basic auth header
    pub fn token_request(&self, form: &[(&str, &str)]) -> RequestBuilder {
        self.http
            .post(self.cfg.token_url.clone())
            .basic_auth(&self.cfg.client_id, Some(&self.cfg.client_secret))
            .form(form)
    }

    /// GET /v1/me/top/tracks?limit=&time_range=
    pub fn top_tracks(&self, limit: u32, time_range: TimeRange, bearer: &str) ->
        Result<RequestBuilder, AlterEgoError> {
        let url = self.endpoint("me/top/tracks")?;
        Ok( self.http.get(url).bearer_auth(bearer).query(&[
            ("limit", limit.to_string().as_str()),
            ("time_range", time_range.as_str())
        ]))
    }

    /// GET /v1/me/player/recently-played?limit=
    pub fn recently_played(&self, limit: u32, bearer: &str) ->
        Result<RequestBuilder, AlterEgoError> {
        let url = self.endpoint("me/player/recently-played")?;
        Ok( self.http.get(url).bearer_auth(bearer).query(&[("limit", limit.to_string())]) )
    }

    /// GET /v1/me
    pub fn me(&self, bearer: &str) -> Result<RequestBuilder, AlterEgoError> {
        let url = self.endpoint("me")?;
        Ok( self.http.get(url).bearer_auth(bearer) )
    }
}

#[async_trait]
impl TrackHistory for SpotifyClient {
    async fn fetch_top_tracks(
        &self,
        session: &AuthSession,
        limit: u32,
        time_range: TimeRange
    ) -> Result<Vec<RawTrack>, AlterEgoError> {
        let request = self.top_tracks(limit, time_range, &session.access_token)?;
        let page: Paging<RawTrack> = send_json(request).await?;
        tracing::debug!(count = page.items.len(), range = time_range.as_str(), "spotify.top_tracks");
        Ok(page.items)
    }

    async fn fetch_recent_tracks(
        &self,
        session: &AuthSession,
        limit: u32
    ) -> Result<Vec<RawPlayEvent>, AlterEgoError> {
        let request = self.recently_played(limit, &session.access_token)?;
        let page: Paging<RawPlayEvent> = send_json(request).await?;
        tracing::debug!(count = page.items.len(), "spotify.recently_played");
        Ok(page.items)
    }

    async fn current_user(&self, session: &AuthSession) -> Result<RawUser, AlterEgoError> {
        send_json(self.me(&session.access_token)?).await
    }
}

#[async_trait]
impl TokenLifecycle for SpotifyClient {
    fn authorize_url(&self) -> Url {
        let mut url = self.cfg.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.cfg.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", self.cfg.redirect_uri.as_str())
            .append_pair("scope", &self.cfg.scope)
            .append_pair("show_dialog", "false");
        url
    }

    async fn exchange_code(&self, code: &str) -> Result<AuthSession, AlterEgoError> {
        let request = self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.cfg.redirect_uri.as_str())
        ]);
        let token: TokenResponse = send_json(request).await?;
        tracing::info!(scope = %token.scope, expires_in = token.expires_in, "spotify.token.issued");
        Ok( AuthSession::from_token(token, Utc::now()) )
    }

    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, AlterEgoError> {
        let refresh_token = session.refresh_token.as_deref()
            .ok_or_else(|| AlterEgoError::Auth("session has no refresh token".to_string()))?;
        let request = self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token)
        ]);
        let token: TokenResponse = send_json(request).await?;
        tracing::info!(expires_in = token.expires_in, "spotify.token.refreshed");
        Ok( session.refreshed(token, Utc::now()) )
    }
}
