//! JSON messages exchanged between sync peers.

use rowsync_core::ChangeEntry;
use serde::{Deserialize, Serialize};

/// Path of the change-feed endpoint (GET to pull, POST to push).
pub const CHANGES_PATH: &str = "/sync/changes";

/// Path of the node registration endpoint.
pub const REGISTER_PATH: &str = "/nodes/register";

/// Builds the pull query string for [`CHANGES_PATH`].
pub fn changes_query(since: u64, exclude_origin: &str, limit: u32) -> String {
    format!(
        "since={since}&exclude_origin={}&limit={limit}",
        urlencode(exclude_origin)
    )
}

/// Percent-encodes the characters that matter in a query value.
fn urlencode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// One page of a peer's change feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangesPage {
    /// Changes in ascending change-id order.
    pub changes: Vec<ChangeEntry>,
    /// Whether more changes remain past this page.
    pub has_more: bool,
}

impl ChangesPage {
    /// Creates a page.
    pub fn new(changes: Vec<ChangeEntry>, has_more: bool) -> Self {
        Self { changes, has_more }
    }

    /// An empty terminal page.
    pub fn empty() -> Self {
        Self {
            changes: Vec::new(),
            has_more: false,
        }
    }
}

/// Body of a push request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushChanges {
    /// Locally authored changes in ascending change-id order.
    pub changes: Vec<ChangeEntry>,
}

impl PushChanges {
    /// Creates a push body.
    pub fn new(changes: Vec<ChangeEntry>) -> Self {
        Self { changes }
    }
}

/// Server acknowledgement of a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushAccepted {
    /// Highest pushed change id the server processed.
    ///
    /// The pusher advances its push watermark to this value; on a
    /// partial failure it covers only the accepted prefix.
    pub highest_accepted_change_id: u64,
}

/// Body of a node registration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Stable, opaque key identifying the client device.
    pub device_key: String,
}

/// Server response to a registration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// The node id leased to the device (1..=1023; 0 is the server).
    pub node_id: u16,
}
