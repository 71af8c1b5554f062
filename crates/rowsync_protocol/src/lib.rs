//! # Rowsync Sync Protocol
//!
//! Wire types for the rowsync HTTP/JSON sync protocol.
//!
//! This crate provides:
//! - Pull pages, push bodies and acknowledgements
//! - Node registration messages
//! - Endpoint paths and the pull query builder
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod messages;

pub use messages::{
    changes_query, ChangesPage, PushAccepted, PushChanges, RegisterRequest, RegisterResponse,
    CHANGES_PATH, REGISTER_PATH,
};
