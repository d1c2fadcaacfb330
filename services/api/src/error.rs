//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and the mapping of
//! port errors onto HTTP responses.

use crate::config::ConfigError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use learning_progress_core::ports::PortError;
use tracing::{error, warn};

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// Maps a port error to the status code and message returned by the handlers.
///
/// Internal details are logged and never sent to the client.
pub fn port_error_response(err: PortError) -> (StatusCode, String) {
    match err {
        PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        PortError::Validation(msg) => {
            warn!("Rejected request: {}", msg);
            (StatusCode::BAD_REQUEST, msg)
        }
        PortError::Conflict(msg) => {
            error!("Conflicting progress update: {}", msg);
            (StatusCode::CONFLICT, "Conflicting progress update, please retry".to_string())
        }
        PortError::Unexpected(msg) => {
            error!("Unexpected port error: {}", msg);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
        }
    }
}

/// Maps an undecodable JSON body to 400, the same status as a rejected payload.
pub fn json_rejection_response(rejection: JsonRejection) -> (StatusCode, String) {
    let msg = rejection.body_text();
    warn!("Rejected request body: {}", msg);
    (StatusCode::BAD_REQUEST, msg)
}
