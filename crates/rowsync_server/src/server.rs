//! The sync server facade.

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::handler::{HandlerContext, RequestHandler};
use crate::registry::{NodeRegistry, SERVER_NODE_ID};
use rowsync_core::{Database, Schema};
use rowsync_protocol::{ChangesPage, PushAccepted, PushChanges, RegisterRequest, RegisterResponse};
use std::sync::Arc;

/// The sync server.
///
/// Holds the server-side mirrored database (node id 0), the node
/// registry, and the request handlers for the three endpoints. The
/// HTTP host maps routes onto `handle_pull`, `handle_push` and
/// `handle_register`; initiative always lies with the clients.
pub struct SyncServer {
    context: Arc<HandlerContext>,
    handler: RequestHandler,
}

impl SyncServer {
    /// Creates a server with a fresh database for `schema`.
    pub fn new(schema: Arc<Schema>, config: ServerConfig) -> Self {
        let db = Arc::new(Database::new(schema, SERVER_NODE_ID.to_string()));
        Self::with_database(db, config)
    }

    /// Creates a server over an existing database.
    pub fn with_database(db: Arc<Database>, config: ServerConfig) -> Self {
        let context = Arc::new(HandlerContext::new(
            config,
            db,
            Arc::new(NodeRegistry::new()),
        ));
        let handler = RequestHandler::new(Arc::clone(&context));
        Self { context, handler }
    }

    /// The server's mirrored database.
    pub fn database(&self) -> &Arc<Database> {
        &self.context.db
    }

    /// The node id registry.
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.context.registry
    }

    /// Serves a pull request.
    pub fn handle_pull(
        &self,
        since: u64,
        exclude_origin: &str,
        limit: u32,
    ) -> ServerResult<ChangesPage> {
        self.handler.handle_pull(since, exclude_origin, limit)
    }

    /// Serves a push request.
    pub fn handle_push(&self, request: PushChanges) -> ServerResult<PushAccepted> {
        self.handler.handle_push(request)
    }

    /// Serves a registration request.
    pub fn handle_register(&self, request: RegisterRequest) -> ServerResult<RegisterResponse> {
        self.handler.handle_register(request)
    }
}
