//! Error types for the rota service.
//!
//! Every failure surfaced to an HTTP caller maps to one of these variants;
//! the [`IntoResponse`] impl turns a variant into the matching status code
//! and a JSON `{"error": "..."}` body.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Top-level error type for the assignment service.
#[derive(Debug, thiserror::Error)]
pub enum RotaError {
    /// A named user is not in the roster.
    #[error("unknown user: {0}")]
    UnknownUser(String),

    /// Attempt to add a user that is already in the roster.
    #[error("user already exists: {0}")]
    DuplicateUser(String),

    /// Malformed name, period, date, or delay amount.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The stored document changed between load and save.
    #[error("write conflict: stored data changed since it was read")]
    WriteConflict,

    /// Blob store read/write failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Startup configuration error.
    #[error("config error: {0}")]
    Config(String),
}

impl RotaError {
    /// HTTP status code for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownUser(_) => StatusCode::NOT_FOUND,
            Self::DuplicateUser(_) | Self::WriteConflict => StatusCode::CONFLICT,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Storage(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RotaError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, RotaError>;
