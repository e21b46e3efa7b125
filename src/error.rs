use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

/// Failures at the storage boundary. `PreconditionFailed` is the losing side
/// of a conditional write.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    PreconditionFailed(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("{0}")]
    Unavailable(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => AppError::NotFound(msg),
            StoreError::PreconditionFailed(msg) => AppError::Conflict(msg),
            StoreError::InvalidTransition(msg) => AppError::Conflict(msg),
            StoreError::Unavailable(msg) => AppError::Internal(msg),
        }
    }
}

/// Failures inside the sync core. Reconciliation errors are logged and the
/// offending event skipped; they never propagate past the feed task.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("snapshot load failed: {0}")]
    Snapshot(#[from] StoreError),

    #[error("malformed row: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("event missing {0} field")]
    MissingField(&'static str),
}
