//! Error types for medley-web

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found or not owned by the caller (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// No valid session (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// medley-common error
    #[error("{0}")]
    Common(#[from] medley_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Common errors keep their taxonomy when crossing the HTTP boundary
        let error = match self {
            ApiError::Common(err) => match err {
                medley_common::Error::NotFound(msg) => ApiError::NotFound(msg),
                medley_common::Error::Unauthorized(msg) => ApiError::Unauthorized(msg),
                medley_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
                other => ApiError::Internal(other.to_string()),
            },
            other => other,
        };

        let (status, error_code, message) = match error {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Io(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Other(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
            ApiError::Common(_) => unreachable!("normalized above"),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
