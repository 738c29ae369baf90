//! Server error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lockbox_storage::StorageError;
use lockbox_sync::protocol::{ErrorBody, ErrorCode};
use thiserror::Error;
use tracing::error;

/// Errors returned by handlers, mapped to HTTP status codes.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("invalid entity class: {0}")]
    InvalidEntityClass(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for ServerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => Self::NotFound(what),
            StorageError::Conflict(what) => Self::Conflict(what),
            StorageError::InvalidData(what) => Self::BadRequest(what),
            other => Self::Storage(other),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized),
            Self::InvalidEntityClass(_) => (StatusCode::NOT_FOUND, ErrorCode::InvalidEntityClass),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NotFound),
            Self::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::Conflict),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadRequest),
            Self::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Internal),
        };

        let message = match &self {
            Self::Storage(e) => {
                error!("Storage failure: {}", e);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody::new(code, message))).into_response()
    }
}
