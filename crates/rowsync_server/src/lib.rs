//! # Rowsync Sync Server
//!
//! Server side of the rowsync protocol.
//!
//! This crate provides:
//! - Handlers for the pull, push and register endpoints
//! - The node id registry
//! - A facade the HTTP host mounts its routes on

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod handler;
mod registry;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use registry::{NodeRegistry, SERVER_NODE_ID};
pub use server::SyncServer;
