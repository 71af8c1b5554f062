//! Error types for the sync server.

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The request was malformed or over limits.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// All 1023 node id slots are leased.
    #[error("node registry exhausted: no free id in 1..=1023")]
    RegistryExhausted,

    /// Store error while serving a request.
    #[error("store error: {0}")]
    Core(#[from] rowsync_core::CoreError),
}

impl ServerError {
    /// Returns true if the client caused the failure (4xx-class).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidRequest(_) | ServerError::RegistryExhausted
        )
    }
}
