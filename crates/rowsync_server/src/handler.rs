//! Request handlers for the sync endpoints.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::registry::NodeRegistry;
use rowsync_core::Database;
use rowsync_engine::Resolution;
use rowsync_protocol::{ChangesPage, PushAccepted, PushChanges, RegisterRequest, RegisterResponse};
use std::sync::Arc;
use tracing::{debug, warn};

/// Longest accepted device key.
const MAX_DEVICE_KEY_LEN: usize = 64;

/// Shared state behind the request handlers.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// The server's mirrored database.
    pub db: Arc<Database>,
    /// Node id registry.
    pub registry: Arc<NodeRegistry>,
}

impl HandlerContext {
    /// Creates a handler context.
    pub fn new(config: ServerConfig, db: Arc<Database>, registry: Arc<NodeRegistry>) -> Self {
        Self {
            config,
            db,
            registry,
        }
    }
}

/// Handler for the three sync endpoints.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a handler over shared context.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Serves `GET /sync/changes`: a page of the server changelog past
    /// `since`, excluding entries the caller authored.
    pub fn handle_pull(
        &self,
        since: u64,
        exclude_origin: &str,
        limit: u32,
    ) -> ServerResult<ChangesPage> {
        let limit = limit.min(self.context.config.max_pull_batch).max(1);
        let (changes, has_more) =
            self.context
                .db
                .changes_for_peer(since, exclude_origin, limit as usize);
        debug!(since, count = changes.len(), has_more, "served pull page");
        Ok(ChangesPage::new(changes, has_more))
    }

    /// Serves `POST /sync/changes`: applies pushed changes under the
    /// server's conflict policy and re-logs accepted ones, origin
    /// preserved, so other peers can pull them.
    ///
    /// The acknowledgement covers the processed prefix: a change the
    /// policy drops (an idempotent re-push of something already seen)
    /// is acknowledged without being re-logged, while an apply failure
    /// stops processing so the pusher retries from that point.
    pub fn handle_push(&self, request: PushChanges) -> ServerResult<PushAccepted> {
        if request.changes.len() > self.context.config.max_push_batch as usize {
            return Err(ServerError::InvalidRequest(format!(
                "push of {} changes exceeds limit {}",
                request.changes.len(),
                self.context.config.max_push_batch
            )));
        }

        let db = &self.context.db;
        let policy = self.context.config.policy;
        let mut highest = 0u64;

        for entry in &request.changes {
            // An echo of a change this server authored needs no apply.
            if entry.origin_node_id == db.node_id() {
                highest = entry.change_id;
                continue;
            }

            let local = match db.get(&entry.table, entry.row_id) {
                Ok(local) => local,
                Err(e) => {
                    warn!(change_id = entry.change_id, table = %entry.table, error = %e,
                        "stopping push apply");
                    break;
                }
            };

            match policy.decide(entry, local.as_ref()) {
                Resolution::Accept => {
                    let result = db.transaction(|txn| {
                        txn.apply_sync(entry)?;
                        txn.append_foreign(entry.clone());
                        Ok(())
                    });
                    match result {
                        Ok(()) => highest = entry.change_id,
                        Err(e) => {
                            warn!(change_id = entry.change_id, table = %entry.table, error = %e,
                                "stopping push apply");
                            break;
                        }
                    }
                }
                Resolution::Drop => {
                    // Already have this state (or newer); acknowledge
                    // without a duplicate changelog entry.
                    highest = entry.change_id;
                }
                Resolution::Gap => {
                    warn!(change_id = entry.change_id, table = %entry.table,
                        incoming_version = entry.version, "version gap in pushed change");
                    break;
                }
            }
        }

        Ok(PushAccepted {
            highest_accepted_change_id: highest,
        })
    }

    /// Serves `POST /nodes/register`.
    pub fn handle_register(&self, request: RegisterRequest) -> ServerResult<RegisterResponse> {
        if request.device_key.is_empty() || request.device_key.len() > MAX_DEVICE_KEY_LEN {
            return Err(ServerError::InvalidRequest("invalid device_key".into()));
        }
        let node_id = self.context.registry.register(&request.device_key)?;
        Ok(RegisterResponse { node_id })
    }
}
