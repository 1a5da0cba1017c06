//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON body with an
//! appropriate status code.
//!
//! Internal errors are logged with full detail, but the caller only gets a
//! generic message, so SQL and file paths never reach clients.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tally_core::LedgerError;
use thiserror::Error;
use tracing::{error, warn};

/// All errors that can occur in the tally-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The caller referenced a task or user that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller is identified but does not own the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// No usable caller identity on the request.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The store is busy; the request may be retried.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
            ServerError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_owned(),
                )
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::NotFound { .. } => ServerError::NotFound(e.to_string()),
            LedgerError::Forbidden { .. } => ServerError::Forbidden(e.to_string()),
            LedgerError::InvalidInput(m) => ServerError::BadRequest(m),
            LedgerError::Transient(ref source) => {
                warn!(error = %source, "store busy; request rolled back");
                ServerError::Unavailable("store busy, retry later".to_owned())
            }
            other => ServerError::Internal(other.to_string()),
        }
    }
}
