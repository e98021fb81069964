//! Error types for the Bouncer service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Main error type for Bouncer operations.
#[derive(Error, Debug)]
pub enum BouncerError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A rate limit policy with a zero window or zero request budget
    #[error("Invalid rate limit policy: {0}")]
    InvalidPolicy(String),

    /// Malformed decision requests from edge handlers
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Bouncer operations.
pub type Result<T> = std::result::Result<T, BouncerError>;

impl IntoResponse for BouncerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            BouncerError::InvalidRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
