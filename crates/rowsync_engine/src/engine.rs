//! The pull-then-push sync engine.

use crate::config::EngineConfig;
use crate::conflict::Resolution;
use crate::error::{SyncError, SyncResult};
use crate::transport::Transport;
use rowsync_core::{ChangeEntry, Database};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of one sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Changes received from the peer and processed.
    pub pulled: u64,
    /// Changes confirmed shipped to the peer.
    pub pushed: u64,
}

/// Drives one sync relationship: pull the peer's changes, apply them
/// under the configured conflict policy, then push locally authored
/// changes.
///
/// One engine instance is driven by one caller at a time; concurrent
/// cycles on the same relationship are undefined. The engine never
/// retries: transport errors abort the invocation with watermarks
/// untouched, and the caller owns retry policy.
pub struct SyncEngine<T: Transport> {
    db: Arc<Database>,
    transport: T,
    config: EngineConfig,
}

impl<T: Transport> SyncEngine<T> {
    /// Creates an engine over a local database and a transport.
    pub fn new(db: Arc<Database>, transport: T, config: EngineConfig) -> Self {
        Self {
            db,
            transport,
            config,
        }
    }

    /// Returns the engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Runs one sync cycle and reports how much moved in each
    /// direction.
    pub fn pull_then_push(&self) -> SyncResult<SyncOutcome> {
        let pulled = self.pull_all()?;
        let pushed = self.push_all()?;
        info!(
            peer = %self.config.peer_id,
            pulled,
            pushed,
            "sync cycle complete"
        );
        Ok(SyncOutcome { pulled, pushed })
    }

    fn pull_all(&self) -> SyncResult<u64> {
        let mut pulled = 0u64;
        loop {
            let since = self
                .db
                .sync_state(&self.config.peer_id)
                .last_pulled_change_id;
            let page = self
                .transport
                .pull(since, &self.config.node_id, self.config.batch_size)?;
            if page.changes.is_empty() {
                break;
            }
            debug!(since, count = page.changes.len(), "applying pulled page");
            pulled += self.apply_page(&page.changes)?;
            if !page.has_more {
                break;
            }
        }
        Ok(pulled)
    }

    /// Applies one pulled page: tables in schema apply order so FK
    /// parents land before children, preserving change-id order within
    /// each table.
    fn apply_page(&self, changes: &[ChangeEntry]) -> SyncResult<u64> {
        let mut by_table: BTreeMap<&str, Vec<&ChangeEntry>> = BTreeMap::new();
        for entry in changes {
            by_table.entry(entry.table.as_str()).or_default().push(entry);
        }

        // A table the schema does not mirror fails the page before any
        // of it is applied, keeping the watermark below every entry.
        for (table, group) in &by_table {
            if !self.db.schema().contains(table) {
                return Err(SyncError::ApplyFailed {
                    change_id: group[0].change_id,
                    table: table.to_string(),
                    reason: "table is not mirrored".into(),
                });
            }
        }

        let mut processed = 0u64;
        for table in self.db.schema().apply_order() {
            let Some(group) = by_table.get(table.as_str()) else {
                continue;
            };
            for entry in group {
                self.apply_one(entry)?;
                processed += 1;
            }
        }
        Ok(processed)
    }

    fn apply_one(&self, entry: &ChangeEntry) -> SyncResult<()> {
        // Never apply an echo of a locally authored change. The peer
        // filters by origin already; this enforces the invariant even
        // against a misbehaving peer.
        if entry.origin_node_id == self.config.node_id {
            return self.mark_pulled(entry.change_id);
        }

        let local = self
            .db
            .get(&entry.table, entry.row_id)
            .map_err(|e| SyncError::apply_failed(entry.change_id, &entry.table, &e))?;

        match self.config.policy.decide(entry, local.as_ref()) {
            Resolution::Accept => self
                .db
                .transaction(|txn| {
                    txn.apply_sync(entry)?;
                    txn.advance_pulled(&self.config.peer_id, entry.change_id);
                    Ok(())
                })
                .map_err(|e| SyncError::apply_failed(entry.change_id, &entry.table, &e)),
            Resolution::Drop => self.mark_pulled(entry.change_id),
            Resolution::Gap => Err(SyncError::VersionGap {
                change_id: entry.change_id,
                table: entry.table.clone(),
                local_version: local.map(|r| r.version).unwrap_or(0),
                incoming_version: entry.version,
            }),
        }
    }

    /// Advances the pull watermark without touching any row.
    fn mark_pulled(&self, change_id: u64) -> SyncResult<()> {
        self.db.transaction(|txn| {
            txn.advance_pulled(&self.config.peer_id, change_id);
            Ok(())
        })?;
        Ok(())
    }

    fn push_all(&self) -> SyncResult<u64> {
        let mut pushed = 0u64;
        loop {
            let since = self
                .db
                .sync_state(&self.config.peer_id)
                .last_pushed_change_id;
            let batch = self
                .db
                .authored_changes_since(since, self.config.batch_size as usize);
            let Some(last) = batch.last() else {
                break;
            };
            let shipped_high = last.change_id;

            debug!(since, count = batch.len(), "pushing authored changes");
            let ack = self.transport.push(&batch)?;
            let confirmed = ack.highest_accepted_change_id.min(shipped_high);
            if confirmed <= since {
                // Nothing new confirmed; stop rather than loop on the
                // same batch. The caller may retry the invocation.
                break;
            }

            pushed += batch.iter().filter(|e| e.change_id <= confirmed).count() as u64;
            self.db.transaction(|txn| {
                txn.advance_pushed(&self.config.peer_id, confirmed);
                Ok(())
            })?;

            if confirmed < shipped_high {
                // Partial confirmation: the watermark covers only the
                // accepted prefix; resume from there next invocation.
                break;
            }
            if batch.len() < self.config.batch_size as usize {
                break;
            }
        }
        Ok(pushed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::ConflictPolicy;
    use crate::transport::MockTransport;
    use chrono::Utc;
    use rowsync_core::{
        bind_allocator, ChangeOp, IdAllocator, Row, RowId, Schema, TableDef, Value,
    };
    use rowsync_protocol::ChangesPage;
    use std::collections::BTreeMap;

    fn test_schema() -> Arc<Schema> {
        Arc::new(
            Schema::build(vec![
                TableDef::new("customers", ["name"]),
                TableDef::new("orders", ["total", "customer_id"])
                    .with_fk("customer_id", "customers"),
            ])
            .unwrap(),
        )
    }

    fn engine_with(
        policy: ConflictPolicy,
    ) -> (Arc<Database>, SyncEngine<MockTransport>) {
        let db = Arc::new(Database::new(test_schema(), "1"));
        let config = EngineConfig::new("server", "1").with_policy(policy);
        let engine = SyncEngine::new(Arc::clone(&db), MockTransport::new(), config);
        (db, engine)
    }

    fn remote_change(
        change_id: u64,
        table: &str,
        row_id: u64,
        version: u64,
        name: &str,
        origin: &str,
    ) -> ChangeEntry {
        let mut data = BTreeMap::new();
        data.insert("name".to_string(), Value::from(name));
        let mut row = Row::new(RowId::from_raw(row_id), data, Utc::now());
        row.version = version;

        ChangeEntry {
            change_id,
            table: table.to_string(),
            row_id: row.id,
            op: if version == 1 {
                ChangeOp::Insert
            } else {
                ChangeOp::Update
            },
            payload: Some(row.full_payload()),
            version,
            updated_at: row.updated_at,
            origin_node_id: origin.to_string(),
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn pull_applies_and_advances_watermark() {
        let (db, engine) = engine_with(ConflictPolicy::LastWriteWins);
        engine.transport().queue_pull_page(ChangesPage::new(
            vec![
                remote_change(4, "customers", 10, 1, "Ada", "0"),
                remote_change(9, "customers", 11, 1, "Grace", "0"),
            ],
            false,
        ));

        let outcome = engine.pull_then_push().unwrap();
        assert_eq!(outcome.pulled, 2);
        assert_eq!(outcome.pushed, 0);

        assert!(db.get("customers", RowId::from_raw(10)).unwrap().is_some());
        assert!(db.get("customers", RowId::from_raw(11)).unwrap().is_some());
        assert_eq!(db.sync_state("server").last_pulled_change_id, 9);
        // Applying pulled changes captures nothing locally.
        assert_eq!(db.changelog_len(), 0);
    }

    #[test]
    fn pull_loops_while_server_has_more() {
        let (db, engine) = engine_with(ConflictPolicy::LastWriteWins);
        engine.transport().queue_pull_page(ChangesPage::new(
            vec![remote_change(1, "customers", 10, 1, "Ada", "0")],
            true,
        ));
        engine.transport().queue_pull_page(ChangesPage::new(
            vec![remote_change(2, "customers", 11, 1, "Grace", "0")],
            false,
        ));

        let outcome = engine.pull_then_push().unwrap();
        assert_eq!(outcome.pulled, 2);
        assert_eq!(db.sync_state("server").last_pulled_change_id, 2);
    }

    #[test]
    fn own_echo_is_never_applied() {
        let (db, engine) = engine_with(ConflictPolicy::LastWriteWins);
        engine.transport().queue_pull_page(ChangesPage::new(
            vec![
                remote_change(5, "customers", 10, 1, "Mine", "1"),
                remote_change(6, "customers", 11, 1, "Theirs", "0"),
            ],
            false,
        ));

        engine.pull_then_push().unwrap();

        assert!(db.get("customers", RowId::from_raw(10)).unwrap().is_none());
        assert!(db.get("customers", RowId::from_raw(11)).unwrap().is_some());
        assert_eq!(db.sync_state("server").last_pulled_change_id, 6);
    }

    #[test]
    fn lww_drops_older_change_but_advances_watermark() {
        let (db, engine) = engine_with(ConflictPolicy::LastWriteWins);

        // Local row already at version 4.
        let newer = remote_change(1, "customers", 10, 4, "Local", "0");
        db.transaction(|txn| txn.apply_sync(&newer)).unwrap();

        engine.transport().queue_pull_page(ChangesPage::new(
            vec![remote_change(7, "customers", 10, 3, "Stale", "0")],
            false,
        ));

        let outcome = engine.pull_then_push().unwrap();
        assert_eq!(outcome.pulled, 1);

        let row = db.get("customers", RowId::from_raw(10)).unwrap().unwrap();
        assert_eq!(row.version, 4);
        assert_eq!(row.get("name"), &Value::from("Local"));
        assert_eq!(db.sync_state("server").last_pulled_change_id, 7);
    }

    #[test]
    fn version_gap_stops_the_run_before_the_offender() {
        let (db, engine) = engine_with(ConflictPolicy::VersionStrict);
        engine.transport().queue_pull_page(ChangesPage::new(
            vec![
                remote_change(3, "customers", 10, 1, "Ada", "0"),
                remote_change(9, "customers", 10, 7, "Future", "0"),
            ],
            false,
        ));

        let err = engine.pull_then_push().unwrap_err();
        match err {
            SyncError::VersionGap {
                change_id,
                local_version,
                incoming_version,
                ..
            } => {
                assert_eq!(change_id, 9);
                assert_eq!(local_version, 1);
                assert_eq!(incoming_version, 7);
            }
            other => panic!("expected VersionGap, got {other:?}"),
        }

        // The accepted prefix committed; the watermark stops before 9.
        let row = db.get("customers", RowId::from_raw(10)).unwrap().unwrap();
        assert_eq!(row.version, 1);
        assert_eq!(db.sync_state("server").last_pulled_change_id, 3);
    }

    #[test]
    fn unmirrored_table_fails_before_any_apply() {
        let (db, engine) = engine_with(ConflictPolicy::LastWriteWins);
        engine.transport().queue_pull_page(ChangesPage::new(
            vec![
                remote_change(1, "customers", 10, 1, "Ada", "0"),
                remote_change(2, "invoices", 11, 1, "Nope", "0"),
            ],
            false,
        ));

        let err = engine.pull_then_push().unwrap_err();
        assert!(matches!(err, SyncError::ApplyFailed { change_id: 2, .. }));
        assert!(db.get("customers", RowId::from_raw(10)).unwrap().is_none());
        assert_eq!(db.sync_state("server").last_pulled_change_id, 0);
    }

    #[test]
    fn push_ships_only_locally_authored_changes() {
        let (db, engine) = engine_with(ConflictPolicy::LastWriteWins);
        let _guard = bind_allocator(Arc::new(IdAllocator::new(1).unwrap()));

        db.transaction(|txn| {
            let mut data = BTreeMap::new();
            data.insert("name".to_string(), Value::from("Ada"));
            txn.insert("customers", data)?;
            // A foreign entry relayed into the local log must stay put.
            txn.append_foreign(remote_change(50, "customers", 99, 1, "Foreign", "2"));
            Ok(())
        })
        .unwrap();

        let outcome = engine.pull_then_push().unwrap();
        assert_eq!(outcome.pushed, 1);

        let batches = engine.transport().pushed_batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
        assert_eq!(batches[0][0].origin_node_id, "1");

        let state = db.sync_state("server");
        assert_eq!(state.last_pushed_change_id, batches[0][0].change_id);
    }

    #[test]
    fn partial_push_confirmation_advances_prefix_only() {
        let (db, engine) = engine_with(ConflictPolicy::LastWriteWins);
        let _guard = bind_allocator(Arc::new(IdAllocator::new(1).unwrap()));

        db.transaction(|txn| {
            for name in ["Ada", "Grace", "Edsger"] {
                let mut data = BTreeMap::new();
                data.insert("name".to_string(), Value::from(name));
                txn.insert("customers", data)?;
            }
            Ok(())
        })
        .unwrap();

        engine.transport().confirm_up_to(2);
        let outcome = engine.pull_then_push().unwrap();

        assert_eq!(outcome.pushed, 2);
        assert_eq!(db.sync_state("server").last_pushed_change_id, 2);
    }

    #[test]
    fn transport_error_leaves_watermarks_unchanged() {
        let (db, engine) = engine_with(ConflictPolicy::LastWriteWins);
        engine.transport().fail_next("connection reset");

        let err = engine.pull_then_push().unwrap_err();
        assert!(err.is_retryable());

        let state = db.sync_state("server");
        assert_eq!(state.last_pulled_change_id, 0);
        assert_eq!(state.last_pushed_change_id, 0);
    }

    #[test]
    fn empty_sync_is_a_noop() {
        let (_db, engine) = engine_with(ConflictPolicy::LastWriteWins);
        let outcome = engine.pull_then_push().unwrap();
        assert_eq!(
            outcome,
            SyncOutcome {
                pulled: 0,
                pushed: 0
            }
        );
    }
}
