//! # Rowsync Engine
//!
//! Client-side sync engine for rowsync.
//!
//! This crate provides:
//! - The pull-then-push sync cycle with per-peer watermarks
//! - Conflict policies (last-write-wins, version-strict)
//! - The transport abstraction with an HTTP implementation

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod conflict;
mod engine;
mod error;
mod http;
mod transport;

pub use config::{EngineConfig, DEFAULT_BATCH_SIZE};
pub use conflict::{ConflictPolicy, Resolution};
pub use engine::{SyncEngine, SyncOutcome};
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpTransport};
pub use transport::{MockTransport, Transport};
