//! Mirrored rows and their payload form.

use crate::error::{CoreError, CoreResult};
use crate::ids::RowId;
use crate::schema::is_system_column;
use crate::value::Value;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// One row of a mirrored table.
///
/// The four system columns (`id`, `updated_at`, `version`, `deleted_at`)
/// are typed fields; everything else lives in `data`. A row is live iff
/// `deleted_at` is unset; the engine never removes rows physically.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Primary key, assigned at insert and immutable.
    pub id: RowId,
    /// Set by the store on every write.
    pub updated_at: DateTime<Utc>,
    /// Bumped only on meaningful writes.
    pub version: u64,
    /// Soft-delete marker.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Domain columns.
    pub data: BTreeMap<String, Value>,
}

impl Row {
    /// Creates a freshly inserted row at version 1.
    pub fn new(id: RowId, data: BTreeMap<String, Value>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            updated_at: now,
            version: 1,
            deleted_at: None,
            data,
        }
    }

    /// Returns true if the row has not been soft-deleted.
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }

    /// Returns a domain column, treating absent columns as null.
    pub fn get(&self, column: &str) -> &Value {
        self.data.get(column).unwrap_or(&Value::Null)
    }

    /// Serializes the full post-image: system columns plus domain columns.
    pub fn full_payload(&self) -> BTreeMap<String, Value> {
        let mut payload = self.system_payload();
        for (column, value) in &self.data {
            payload.insert(column.clone(), value.clone());
        }
        payload
    }

    /// Serializes only the system columns (the delete post-image).
    pub fn system_payload(&self) -> BTreeMap<String, Value> {
        let mut payload = BTreeMap::new();
        payload.insert("id".to_string(), Value::from(self.id));
        payload.insert(
            "updated_at".to_string(),
            Value::from_timestamp(self.updated_at),
        );
        payload.insert("version".to_string(), Value::Integer(self.version as i64));
        payload.insert(
            "deleted_at".to_string(),
            self.deleted_at.map(Value::from_timestamp).unwrap_or(Value::Null),
        );
        payload
    }

    /// Reconstructs a row from a change payload.
    ///
    /// `id`, `version` and `updated_at` come from the change entry's
    /// typed fields; `deleted_at` and the domain columns come from the
    /// payload map.
    pub fn from_payload(
        id: RowId,
        version: u64,
        updated_at: DateTime<Utc>,
        payload: &BTreeMap<String, Value>,
    ) -> CoreResult<Self> {
        let deleted_at = match payload.get("deleted_at") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.as_timestamp().ok_or_else(|| {
                CoreError::serialization(format!(
                    "deleted_at is not an RFC 3339 timestamp: {value:?}"
                ))
            })?),
        };

        let data = payload
            .iter()
            .filter(|(column, _)| !is_system_column(column))
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect();

        Ok(Self {
            id,
            updated_at,
            version,
            deleted_at,
            data,
        })
    }
}
