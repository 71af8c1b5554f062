//! The append-only per-database changelog.

use crate::ids::RowId;
use crate::value::Value;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Logical operation recorded by a change entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    /// Row was created.
    Insert,
    /// Row was meaningfully updated.
    Update,
    /// Row was soft-deleted.
    Delete,
}

/// One append-only record describing a row-level mutation.
///
/// Entries are immutable once written. `change_id` is a dense local
/// counter, monotonic per database; cross-node ordering is never
/// derived from it. `captured_at` is local bookkeeping and stays off
/// the wire: the receiving side stamps its own insertion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEntry {
    /// Dense local sequence number.
    pub change_id: u64,
    /// Mirrored table the change applies to.
    pub table: String,
    /// Row the change applies to.
    pub row_id: RowId,
    /// Logical operation.
    pub op: ChangeOp,
    /// Full post-image; for deletes only the system columns.
    pub payload: Option<BTreeMap<String, Value>>,
    /// Row version after the write.
    pub version: u64,
    /// Row timestamp after the write.
    pub updated_at: DateTime<Utc>,
    /// Node that authored the change.
    pub origin_node_id: String,
    /// Local-clock insertion time.
    #[serde(skip_serializing, default = "Utc::now")]
    pub captured_at: DateTime<Utc>,
}

/// Append-only log of change entries, ordered by insertion.
#[derive(Debug)]
pub struct Changelog {
    entries: Vec<ChangeEntry>,
    next_change_id: u64,
}

impl Default for Changelog {
    fn default() -> Self {
        Self::new()
    }
}

impl Changelog {
    /// Creates an empty changelog; the first entry gets change id 1.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_change_id: 1,
        }
    }

    /// Appends an entry, assigning the next dense change id and
    /// re-stamping `captured_at` with the local clock.
    ///
    /// Returns the assigned change id.
    pub fn append(&mut self, mut entry: ChangeEntry) -> u64 {
        let change_id = self.next_change_id;
        self.next_change_id += 1;
        entry.change_id = change_id;
        entry.captured_at = Utc::now();
        self.entries.push(entry);
        change_id
    }

    /// Entries with `change_id > since`, ascending, up to `limit`.
    pub fn entries_since(&self, since: u64, limit: usize) -> Vec<ChangeEntry> {
        self.entries
            .iter()
            .filter(|e| e.change_id > since)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Entries after `since` not authored by `exclude_origin`.
    ///
    /// This is the pull-side filter: a peer never receives its own
    /// changes back.
    pub fn entries_since_excluding(
        &self,
        since: u64,
        exclude_origin: &str,
        limit: usize,
    ) -> Vec<ChangeEntry> {
        self.entries
            .iter()
            .filter(|e| e.change_id > since && e.origin_node_id != exclude_origin)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Whether more filtered entries exist past `since` + `limit`.
    pub fn has_more_excluding(&self, since: u64, exclude_origin: &str, limit: usize) -> bool {
        self.entries
            .iter()
            .filter(|e| e.change_id > since && e.origin_node_id != exclude_origin)
            .nth(limit)
            .is_some()
    }

    /// Entries after `since` authored by `origin`, ascending.
    ///
    /// This is the push-side query: only locally authored changes are
    /// ever shipped; echoes belong to their own peer relationships.
    pub fn authored_since(&self, since: u64, origin: &str, limit: usize) -> Vec<ChangeEntry> {
        self.entries
            .iter()
            .filter(|e| e.change_id > since && e.origin_node_id == origin)
            .take(limit)
            .cloned()
            .collect()
    }

    /// The highest assigned change id, 0 when empty.
    pub fn latest_change_id(&self) -> u64 {
        self.next_change_id - 1
    }

    /// Number of entries in the log.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been logged.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
