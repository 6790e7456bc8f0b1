//!
//! src/errors.rs
//!
//! Defines the error enum shared by the pipeline, its collaborators
//! and the http layer, plus conversions into json error responses
//!
//!

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlterEgoError {
    #[error("config error: {0}")]
    Config(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("upstream error: {0}")]
    Upstream(String),
    #[error("generation error: {0}")]
    Generation(String),
    #[error("image error: {0}")]
    Image(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("auth error: {0}")]
    Auth(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error)
}

impl From<reqwest::Error> for AlterEgoError {
    fn from(e: reqwest::Error) -> Self { AlterEgoError::Http(e.to_string()) }
}

impl From<serde_json::Error> for AlterEgoError {
    fn from(e: serde_json::Error) -> Self { AlterEgoError::Parse(e.to_string()) }
}

impl AlterEgoError {
    pub fn status(&self) -> StatusCode {
        match self {
            AlterEgoError::Auth(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AlterEgoError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request.failed");
        } else {
            tracing::warn!(error = %self, "request.rejected");
        }
        let body = match &self {
            // auth errors carry a message meant for the browser verbatim
            AlterEgoError::Auth(msg) => msg.clone(),
            other => other.to_string()
        };
        (status, Json(serde_json::json!({ "error": body }))).into_response()
    }
}
