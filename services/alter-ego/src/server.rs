//!
//! src/server.rs
//!
//! Http surface: oauth callback, cookie-backed sessions and the json
//! routes the ui calls
//!

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
    extract::{FromRequestParts, Query, Request, State},
    http::request::Parts,
    response::{Html, Redirect, Response},
    routing::get,
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{debug, info, warn, Span};
use uuid::Uuid;

use crate::auth::{AuthSession, SessionStore, TokenLifecycle, SESSION_COOKIE};
use crate::errors::AlterEgoError;
use crate::fetch::TrackHistory;
use crate::pipeline::{fetch_history, fetch_recent, CharacterPipeline, STATIC_PREFIX};
use crate::types::{GenerationResult, UserProfile};

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionStore>,
    pub history: Arc<dyn TrackHistory>,
    pub tokens: Arc<dyn TokenLifecycle>,
    pub pipeline: Arc<CharacterPipeline>,
    pub ui_page: PathBuf,
    pub static_dir: PathBuf,
    pub secure_cookies: bool
}

/// A live session resolved from the cookie, refreshed if it was stale
pub struct Authed {
    pub session: AuthSession
}

impl FromRequestParts<AppState> for Authed {
    type Rejection = Redirect;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let login = || Redirect::to(state.tokens.authorize_url().as_str());

        let jar = CookieJar::from_headers(&parts.headers);
        let Some(id) = jar.get(SESSION_COOKIE).map(|c| c.value().to_string()) else {
            debug!("session.missing");
            return Err(login());
        };
        let Some(session) = state.sessions.get(&id).await else {
            debug!("session.unknown");
            return Err(login());
        };

        if !session.is_expired() {
            return Ok( Authed { session } );
        }

        match state.tokens.refresh(&session).await {
            Ok(fresh) => {
                state.sessions.replace(&id, fresh.clone()).await;
                info!(expires_at = %fresh.expires_at, "session.refreshed");
                Ok( Authed { session: fresh } )
            }
            Err(e) => {
                warn!(error = %e, "session.refresh.failed");
                state.sessions.remove(&id).await;
                Err(login())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    code: Option<String>,
    error: Option<String>
}

async fn index(State(state): State<AppState>, Authed { session }: Authed) ->
    Result<Json<Value>, AlterEgoError> {
    let listening = fetch_history(state.history.as_ref(), &session).await?;
    Ok( Json(json!({
        "status": "success",
        "top_tracks": listening.top,
        "recent_tracks": listening.recent
    })))
}

async fn ui(State(state): State<AppState>) -> Result<Html<String>, AlterEgoError> {
    let page = tokio::fs::read_to_string(&state.ui_page).await?;
    Ok( Html(page) )
}

async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar
) -> Result<(CookieJar, Redirect), AlterEgoError> {
    if let Some(reason) = params.error.as_deref() {
        warn!(reason, "oauth.denied");
    }
    let code = params.code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AlterEgoError::Auth("No code provided".to_string()))?;

    let session = state.tokens.exchange_code(&code).await.map_err(|e| {
        warn!(error = %e, "oauth.exchange.failed");
        AlterEgoError::Auth("Could not get token".to_string())
    })?;

    // a re-login replaces whatever session this browser held before
    if let Some(previous) = jar.get(SESSION_COOKIE) {
        if state.sessions.remove(previous.value()).await.is_some() {
            debug!("oauth.session.replaced");
        }
    }
    let id = state.sessions.insert(session).await;
    info!("oauth.session.created");

    let cookie = Cookie::build((SESSION_COOKIE, id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.secure_cookies);
    Ok( (jar.add(cookie), Redirect::to("/")) )
}

async fn character(State(state): State<AppState>, Authed { session }: Authed) ->
    Result<Json<GenerationResult>, AlterEgoError> {
    let result = state.pipeline.run(state.history.as_ref(), &session).await?;
    Ok( Json(result) )
}

async fn recent_tracks(State(state): State<AppState>, Authed { session }: Authed) ->
    Result<Json<Value>, AlterEgoError> {
    let recent = fetch_recent(state.history.as_ref(), &session).await?;
    Ok( Json(json!({ "recent_tracks": recent })) )
}

async fn user_info(State(state): State<AppState>, Authed { session }: Authed) ->
    Result<Json<Value>, AlterEgoError> {
    let user = UserProfile::from(state.history.current_user(&session).await?);
    Ok( Json(json!({ "user": user })) )
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(state: AppState) -> Router {
    let statics = ServeDir::new(&state.static_dir);

    Router::new()
        .route("/", get(index))
        .route("/ui", get(ui))
        .route("/callback", get(callback))
        .route("/character", get(character))
        .route("/recent-tracks", get(recent_tracks))
        .route("/user-info", get(user_info))
        .route("/health", get(health))
        .nest_service(STATIC_PREFIX, statics)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request| {
                    tracing::info_span!(
                        "http_request",
                        request_id = %Uuid::new_v4(),
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                })
                .on_response(|response: &Response, latency: Duration, _span: &Span| {
                    let status = response.status().as_u16();
                    let latency_ms = latency.as_millis() as u64;
                    match status {
                        500..=599 => tracing::error!(status, latency_ms, "http.response"),
                        400..=499 => tracing::warn!(status, latency_ms, "http.response"),
                        _ => tracing::info!(status, latency_ms, "http.response")
                    }
                })
        )
}

/// Serves until the token is cancelled, then drains in-flight requests
pub async fn serve(listener: TcpListener, app: Router, shutdown: CancellationToken) ->
    Result<(), AlterEgoError> {
    let addr = listener.local_addr()?;
    info!(%addr, "server.listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("server.stopped");
    Ok(())
}
