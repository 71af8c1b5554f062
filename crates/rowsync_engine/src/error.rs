//! Error types for the sync engine.

use rowsync_core::CoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// A response could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Under `version_strict`, an incoming change did not continue the
    /// local version sequence.
    #[error(
        "version gap at change {change_id} on {table}: local version {local_version}, incoming {incoming_version}"
    )]
    VersionGap {
        /// The offending change id; the watermark stops just before it.
        change_id: u64,
        /// Table of the offending change.
        table: String,
        /// Version of the local row (0 for a missing row).
        local_version: u64,
        /// Version carried by the incoming change.
        incoming_version: u64,
    },

    /// Applying an accepted change failed, typically a missing FK
    /// parent. The watermark points just before the failed entry so a
    /// retry can resume.
    #[error("apply failed at change {change_id} on {table}: {reason}")]
    ApplyFailed {
        /// The offending change id.
        change_id: u64,
        /// Table of the offending change.
        table: String,
        /// Underlying failure.
        reason: String,
    },

    /// The server denied a registration or sync request.
    #[error("server denied request: {0}")]
    ServerDenied(String),

    /// Core store error outside of an apply.
    #[error("store error: {0}")]
    Core(#[from] CoreError),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Wraps a core failure as an apply failure at a specific change.
    pub fn apply_failed(change_id: u64, table: impl Into<String>, reason: &CoreError) -> Self {
        Self::ApplyFailed {
            change_id,
            table: table.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if retrying the same invocation may succeed.
    ///
    /// The engine itself never retries; this classifies for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport { retryable: true, .. })
    }
}
