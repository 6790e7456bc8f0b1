//!
//! src/auth.rs
//!
//! Session-scoped Spotify tokens: the immutable AuthSession value every
//! handler receives, the token lifecycle seam and the cookie-keyed table
//!

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::RwLock;
use url::Url;

use crate::errors::AlterEgoError;

pub const SESSION_COOKIE: &str = "alter_ego_session";

/// Refresh a little before the provider would reject the token
pub const EXPIRY_SKEW_SECS: i64 = 60;

/// Body of accounts.spotify.com/api/token
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub scope: String,
    pub expires_at: DateTime<Utc>
}

impl AuthSession {
    pub fn from_token(token: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            scope: token.scope,
            expires_at: now + Duration::seconds(token.expires_in)
        }
    }

    /// Spotify may omit the refresh token on refresh, keep the old one then
    pub fn refreshed(&self, token: TokenResponse, now: DateTime<Utc>) -> Self {
        let refresh_token = token.refresh_token.clone().or_else(|| self.refresh_token.clone());
        let scope = if token.scope.is_empty() { self.scope.clone() } else { token.scope.clone() };
        Self { refresh_token, scope, ..Self::from_token(token, now) }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Authorization-code flow against the provider
#[async_trait]
pub trait TokenLifecycle: Send + Sync {
    fn authorize_url(&self) -> Url;
    async fn exchange_code(&self, code: &str) -> Result<AuthSession, AlterEgoError>;
    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, AlterEgoError>;
}

/// Sessions keyed by the random id stored in the browser cookie
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, AuthSession>>
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: AuthSession) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.sessions.write().await.insert(id.clone(), session);
        id
    }

    pub async fn get(&self, id: &str) -> Option<AuthSession> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn replace(&self, id: &str, session: AuthSession) {
        self.sessions.write().await.insert(id.to_string(), session);
    }

    pub async fn remove(&self, id: &str) -> Option<AuthSession> {
        self.sessions.write().await.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(expires_in: i64, refresh: Option<&str>) -> TokenResponse {
        TokenResponse {
            access_token: "access".to_string(),
            token_type: "Bearer".to_string(),
            scope: "user-top-read".to_string(),
            expires_in,
            refresh_token: refresh.map(str::to_string)
        }
    }

    #[test]
    fn expiry_includes_skew() {
        let now = Utc::now();
        let session = AuthSession::from_token(token(3600, Some("r")), now);
        assert!(!session.is_expired_at(now));
        assert!(session.is_expired_at(now + Duration::seconds(3600 - EXPIRY_SKEW_SECS)));
        assert!(session.is_expired_at(now + Duration::seconds(7200)));
    }

    #[test]
    fn refresh_keeps_old_refresh_token_when_omitted() {
        let now = Utc::now();
        let session = AuthSession::from_token(token(3600, Some("first")), now);
        let mut next = token(3600, None);
        next.access_token = "second-access".to_string();
        next.scope = String::new();

        let later = now + Duration::seconds(4000);
        let refreshed = session.refreshed(next, later);
        assert_eq!(refreshed.access_token, "second-access");
        assert_eq!(refreshed.refresh_token.as_deref(), Some("first"));
        assert_eq!(refreshed.scope, "user-top-read");
        assert!(!refreshed.is_expired_at(later));
    }

    #[test]
    fn refresh_takes_rotated_token() {
        let now = Utc::now();
        let session = AuthSession::from_token(token(3600, Some("first")), now);
        let refreshed = session.refreshed(token(3600, Some("rotated")), now);
        assert_eq!(refreshed.refresh_token.as_deref(), Some("rotated"));
    }

    #[tokio::test]
    async fn store_round_trip() {
        let store = SessionStore::new();
        let session = AuthSession::from_token(token(3600, None), Utc::now());
        let id = store.insert(session.clone()).await;
        assert_eq!(store.get(&id).await, Some(session.clone()));

        let mut updated = session.clone();
        updated.access_token = "new".to_string();
        store.replace(&id, updated.clone()).await;
        assert_eq!(store.get(&id).await, Some(updated));

        assert!(store.remove(&id).await.is_some());
        assert!(store.get(&id).await.is_none());
    }
}
