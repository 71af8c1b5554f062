//! # Rowsync Core
//!
//! Core engine for local-first row synchronization.
//!
//! This crate provides:
//! - K-sorted row ids and the per-context allocator binding
//! - Schema introspection with a parents-first apply order
//! - The transactional row store with change capture and
//!   dirty-field suppression
//! - The append-only changelog and per-peer sync watermarks

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod changelog;
pub mod error;
pub mod ids;
pub mod row;
pub mod schema;
pub mod store;
pub mod sync_state;
pub mod value;

pub use changelog::{ChangeEntry, ChangeOp, Changelog};
pub use error::{CoreError, CoreResult};
pub use ids::{
    bind_allocator, clear_default_allocator, current_allocator, set_default_allocator,
    AllocatorGuard, IdAllocator, RowId, EPOCH_MS, MAX_NODE_ID,
};
pub use row::Row;
pub use schema::{is_system_column, Schema, TableDef, SYSTEM_COLUMNS};
pub use store::{Database, Txn};
pub use sync_state::SyncState;
pub use value::Value;
