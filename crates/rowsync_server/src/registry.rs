//! Node id issuance.

use crate::error::{ServerError, ServerResult};
use parking_lot::RwLock;
use rowsync_core::MAX_NODE_ID;
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

/// Node id the server itself uses; never leased to clients.
pub const SERVER_NODE_ID: u16 = 0;

/// Leases small-integer node ids to client devices.
///
/// A device key is bound to at most one node id, and an id to at most
/// one device key. Re-registering a known key returns its existing
/// lease.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    inner: RwLock<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    by_key: BTreeMap<String, u16>,
    used: BTreeSet<u16>,
}

impl NodeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the node id bound to `device_key`, leasing the smallest
    /// free id in 1..=1023 if the key is new.
    ///
    /// Fails with [`ServerError::RegistryExhausted`] when every slot is
    /// taken.
    pub fn register(&self, device_key: &str) -> ServerResult<u16> {
        let mut inner = self.inner.write();
        if let Some(node_id) = inner.by_key.get(device_key) {
            return Ok(*node_id);
        }

        let node_id = (1..=MAX_NODE_ID)
            .find(|candidate| !inner.used.contains(candidate))
            .ok_or(ServerError::RegistryExhausted)?;

        inner.by_key.insert(device_key.to_string(), node_id);
        inner.used.insert(node_id);
        info!(node_id, "leased node id to new device");
        Ok(node_id)
    }

    /// Looks up a lease without creating one.
    pub fn lookup(&self, device_key: &str) -> Option<u16> {
        self.inner.read().by_key.get(device_key).copied()
    }

    /// Number of leased node ids.
    pub fn len(&self) -> usize {
        self.inner.read().by_key.len()
    }

    /// Returns true if nothing has been leased.
    pub fn is_empty(&self) -> bool {
        self.inner.read().by_key.is_empty()
    }
}
