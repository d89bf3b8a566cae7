//! Error types for the HTTP surface and the upstream completion capability.

use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced to HTTP clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The request body was missing, malformed, or not declared as JSON.
    #[error("Request must be JSON")]
    NotJson,

    /// A required field failed validation.
    #[error("{0}")]
    Validation(String),
}

impl GatewayError {
    pub fn prompt_required() -> Self {
        Self::Validation("Prompt is required".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::NotJson | GatewayError::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Short label used for the rejection metric.
    pub fn reason(&self) -> &'static str {
        match self {
            GatewayError::NotJson => "not_json",
            GatewayError::Validation(_) => "validation",
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

/// Failures reported by a completion backend.
#[derive(Error, Debug)]
pub enum CompletionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("{0}")]
    Upstream(String),

    #[error("invalid upstream response: {0}")]
    InvalidResponse(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}
