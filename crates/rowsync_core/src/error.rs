//! Error types for the core engine.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Node id outside the 10-bit range.
    #[error("node id {0} out of range 0..=1023")]
    BadNodeId(u16),

    /// An insert needed a row id and no allocator was bound.
    #[error("no id allocator bound; call bind_allocator or set_default_allocator first")]
    NoAllocatorBound,

    /// The mirrored tables contain a foreign-key cycle.
    #[error("foreign-key cycle among tables: {}", cycle.join(" -> "))]
    SchemaCycle {
        /// The tables participating in the cycle.
        cycle: Vec<String>,
    },

    /// A table was referenced that the schema does not know.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// A foreign key points at a row that does not exist.
    #[error("foreign key violation: {table}.{column} references missing {target} row {row_id}")]
    ForeignKeyViolation {
        /// Referring table.
        table: String,
        /// Referring column.
        column: String,
        /// Target table.
        target: String,
        /// The missing row id.
        row_id: u64,
    },

    /// A row was expected to exist.
    #[error("row {row_id} not found in table {table}")]
    RowNotFound {
        /// Table searched.
        table: String,
        /// The missing row id.
        row_id: u64,
    },

    /// A payload could not be decoded into a row.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CoreError {
    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Creates a foreign-key violation error.
    pub fn fk_violation(
        table: impl Into<String>,
        column: impl Into<String>,
        target: impl Into<String>,
        row_id: u64,
    ) -> Self {
        Self::ForeignKeyViolation {
            table: table.into(),
            column: column.into(),
            target: target.into(),
            row_id,
        }
    }

    /// Creates a row-not-found error.
    pub fn row_not_found(table: impl Into<String>, row_id: u64) -> Self {
        Self::RowNotFound {
            table: table.into(),
            row_id,
        }
    }
}
