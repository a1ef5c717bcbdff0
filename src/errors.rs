use crate::services::error::{ArchiveError, ErrorKind};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

/// Client errors keep their message; server errors are logged in full and
/// answered with a generic one.
impl From<ArchiveError> for AppError {
    fn from(err: ArchiveError) -> Self {
        match err.kind() {
            ErrorKind::NotFound => {
                tracing::debug!("not found: {}", err);
                AppError::not_found(err.to_string())
            }
            ErrorKind::PathViolation => {
                tracing::debug!("rejected path: {}", err);
                AppError::new(StatusCode::BAD_REQUEST, err.to_string())
            }
            ErrorKind::ExtractionFailure => {
                tracing::error!("extraction failure: {}", err);
                AppError::internal("Error reading code archive")
            }
            ErrorKind::Internal => {
                tracing::error!("internal error: {}", err);
                AppError::internal("Internal server error")
            }
        }
    }
}
