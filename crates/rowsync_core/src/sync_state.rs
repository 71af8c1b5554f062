//! Per-peer sync watermarks.

use serde::{Deserialize, Serialize};

/// Watermarks for one (local database, peer) relationship.
///
/// Both cursors are monotonic: they advance only after the
/// corresponding apply or push has committed, and never move backwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Opaque identifier of the other side.
    pub peer_id: String,
    /// Highest peer change id observed and applied locally.
    pub last_pulled_change_id: u64,
    /// Highest local change id confirmed sent to the peer.
    pub last_pushed_change_id: u64,
}

impl SyncState {
    /// Creates the zero-initialized state for a peer never synced with.
    pub fn new(peer_id: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
            last_pulled_change_id: 0,
            last_pushed_change_id: 0,
        }
    }

    /// Advances the pull watermark, never backwards.
    pub fn advance_pulled(&mut self, change_id: u64) {
        self.last_pulled_change_id = self.last_pulled_change_id.max(change_id);
    }

    /// Advances the push watermark, never backwards.
    pub fn advance_pushed(&mut self, change_id: u64) {
        self.last_pushed_change_id = self.last_pushed_change_id.max(change_id);
    }
}
