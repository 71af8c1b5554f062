//! Server configuration.

use rowsync_engine::ConflictPolicy;

/// Configuration for the sync server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum changes returned per pull page.
    pub max_pull_batch: u32,
    /// Maximum changes accepted per push request.
    pub max_push_batch: u32,
    /// Conflict policy applied to pushed changes.
    pub policy: ConflictPolicy,
}

impl ServerConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            max_pull_batch: 500,
            max_push_batch: 500,
            policy: ConflictPolicy::LastWriteWins,
        }
    }

    /// Sets the maximum pull page size.
    pub fn with_max_pull_batch(mut self, size: u32) -> Self {
        self.max_pull_batch = size;
        self
    }

    /// Sets the maximum push batch size.
    pub fn with_max_push_batch(mut self, size: u32) -> Self {
        self.max_push_batch = size;
        self
    }

    /// Sets the conflict policy for pushed changes.
    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}
