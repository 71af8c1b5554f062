//! Conflict resolution policies.

use chrono::{DateTime, Utc};
use rowsync_core::{ChangeEntry, Row};
use serde::{Deserialize, Serialize};

/// How concurrent writes to the same row are reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Accept an incoming change iff its `(version, updated_at)` pair
    /// is lexicographically greater than the local row's; older
    /// changes are dropped silently.
    #[default]
    LastWriteWins,
    /// Accept only changes that continue the version sequence exactly
    /// (`incoming == local + 1`); anything else is a version gap the
    /// operator must resolve.
    VersionStrict,
}

/// Outcome of judging one incoming change against the local row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Upsert the change into the local row.
    Accept,
    /// Ignore the change; the local row is as new or newer.
    Drop,
    /// The change does not continue the version sequence.
    Gap,
}

impl ConflictPolicy {
    /// Judges an incoming change against the current local row.
    ///
    /// A missing local row is treated as a ghost at version 0.
    pub fn decide(&self, entry: &ChangeEntry, local: Option<&Row>) -> Resolution {
        let (local_version, local_updated_at) = match local {
            Some(row) => (row.version, row.updated_at),
            None => (0, DateTime::<Utc>::MIN_UTC),
        };

        match self {
            ConflictPolicy::LastWriteWins => {
                if (entry.version, entry.updated_at) > (local_version, local_updated_at) {
                    Resolution::Accept
                } else {
                    Resolution::Drop
                }
            }
            ConflictPolicy::VersionStrict => {
                if entry.version == local_version + 1 {
                    Resolution::Accept
                } else {
                    Resolution::Gap
                }
            }
        }
    }
}
