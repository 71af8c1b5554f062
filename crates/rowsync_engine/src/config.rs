//! Configuration for the sync engine.

use crate::conflict::ConflictPolicy;

/// Default number of changes per pull or push batch.
pub const DEFAULT_BATCH_SIZE: u32 = 500;

/// Configuration for one sync relationship.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Opaque identifier of the peer being synced with.
    pub peer_id: String,
    /// This node's id, as stamped into `origin_node_id`.
    pub node_id: String,
    /// Conflict policy for incoming changes.
    pub policy: ConflictPolicy,
    /// Maximum changes per pull or push batch.
    pub batch_size: u32,
}

impl EngineConfig {
    /// Creates a configuration with the default policy and batch size.
    pub fn new(peer_id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            peer_id: peer_id.into(),
            node_id: node_id.into(),
            policy: ConflictPolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Sets the conflict policy.
    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }
}
