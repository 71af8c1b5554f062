//! The transactional row store with change capture.
//!
//! [`Database`] models the mirrored relational store: tables of rows
//! keyed by [`RowId`], foreign-key checks against the [`Schema`], the
//! append-only changelog, and per-peer sync state. All writes go
//! through [`Database::transaction`]; the changelog append shares the
//! transaction with the row write, so committed rows always have a
//! matching changelog tail and aborted transactions leave no orphan
//! entries.
//!
//! Change capture is not a callback registry: the store's own write
//! paths stage captures, and the sync-apply path
//! ([`Txn::apply_sync`]) is a distinct operation that stages none.

use crate::changelog::{ChangeEntry, ChangeOp, Changelog};
use crate::error::{CoreError, CoreResult};
use crate::ids::{current_allocator, RowId};
use crate::row::Row;
use crate::schema::{is_system_column, Schema};
use crate::sync_state::SyncState;
use crate::value::Value;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An in-memory mirrored database: rows, changelog and sync state.
pub struct Database {
    schema: Arc<Schema>,
    node_id: String,
    inner: Mutex<DbInner>,
}

struct DbInner {
    tables: BTreeMap<String, BTreeMap<RowId, Row>>,
    changelog: Changelog,
    sync_state: BTreeMap<String, SyncState>,
}

impl Database {
    /// Creates an empty database for the given schema.
    ///
    /// `node_id` is the origin stamped on every locally captured
    /// change ("0" is conventionally the server).
    pub fn new(schema: Arc<Schema>, node_id: impl Into<String>) -> Self {
        let tables = schema
            .table_names()
            .map(|name| (name.to_string(), BTreeMap::new()))
            .collect();
        Self {
            schema,
            node_id: node_id.into(),
            inner: Mutex::new(DbInner {
                tables,
                changelog: Changelog::new(),
                sync_state: BTreeMap::new(),
            }),
        }
    }

    /// The node id stamped on locally authored changes.
    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// The schema this database mirrors.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Reads a row outside of any transaction.
    pub fn get(&self, table: &str, id: RowId) -> CoreResult<Option<Row>> {
        let inner = self.inner.lock();
        let rows = inner
            .tables
            .get(table)
            .ok_or_else(|| CoreError::UnknownTable(table.to_string()))?;
        Ok(rows.get(&id).cloned())
    }

    /// Number of rows (live and soft-deleted) in a table.
    pub fn row_count(&self, table: &str) -> CoreResult<usize> {
        let inner = self.inner.lock();
        inner
            .tables
            .get(table)
            .map(BTreeMap::len)
            .ok_or_else(|| CoreError::UnknownTable(table.to_string()))
    }

    /// Changelog entries after `since`, ascending, up to `limit`.
    pub fn changes_since(&self, since: u64, limit: usize) -> Vec<ChangeEntry> {
        self.inner.lock().changelog.entries_since(since, limit)
    }

    /// Serves a peer's pull: entries after `since` not authored by
    /// `exclude_origin`, plus whether more remain.
    pub fn changes_for_peer(
        &self,
        since: u64,
        exclude_origin: &str,
        limit: usize,
    ) -> (Vec<ChangeEntry>, bool) {
        let inner = self.inner.lock();
        let changes = inner
            .changelog
            .entries_since_excluding(since, exclude_origin, limit);
        let has_more = inner
            .changelog
            .has_more_excluding(since, exclude_origin, limit);
        (changes, has_more)
    }

    /// Locally authored entries after `since`, the push candidates.
    pub fn authored_changes_since(&self, since: u64, limit: usize) -> Vec<ChangeEntry> {
        self.inner
            .lock()
            .changelog
            .authored_since(since, &self.node_id, limit)
    }

    /// The highest change id assigned so far.
    pub fn latest_change_id(&self) -> u64 {
        self.inner.lock().changelog.latest_change_id()
    }

    /// Number of changelog entries.
    pub fn changelog_len(&self) -> usize {
        self.inner.lock().changelog.len()
    }

    /// The sync state for a peer, zero-initialized when never synced.
    pub fn sync_state(&self, peer_id: &str) -> SyncState {
        self.inner
            .lock()
            .sync_state
            .get(peer_id)
            .cloned()
            .unwrap_or_else(|| SyncState::new(peer_id))
    }

    /// Runs `f` inside a transaction.
    ///
    /// On `Ok` the staged row writes, captures and watermark updates
    /// commit atomically; on `Err` everything staged is discarded.
    pub fn transaction<F, T>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Txn<'_>) -> CoreResult<T>,
    {
        let mut inner = self.inner.lock();
        let mut txn = Txn {
            schema: &self.schema,
            node_id: &self.node_id,
            inner: &mut *inner,
            staged_rows: BTreeMap::new(),
            staged_log: Vec::new(),
            staged_state: BTreeMap::new(),
        };
        match f(&mut txn) {
            Ok(value) => {
                txn.commit();
                Ok(value)
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("node_id", &self.node_id)
            .field("changelog_len", &self.changelog_len())
            .finish_non_exhaustive()
    }
}

enum StagedLog {
    /// A locally authored write; the entry is built at commit from the
    /// post-image snapshot taken when the write was staged.
    Local {
        table: String,
        op: ChangeOp,
        row: Row,
    },
    /// A foreign-authored entry re-logged verbatim (server push path).
    Foreign(ChangeEntry),
}

/// An open transaction over a [`Database`].
pub struct Txn<'a> {
    schema: &'a Schema,
    node_id: &'a str,
    inner: &'a mut DbInner,
    staged_rows: BTreeMap<(String, RowId), Row>,
    staged_log: Vec<StagedLog>,
    staged_state: BTreeMap<String, SyncState>,
}

impl Txn<'_> {
    /// Reads a row, seeing writes staged earlier in this transaction.
    pub fn get(&self, table: &str, id: RowId) -> CoreResult<Option<Row>> {
        if !self.schema.contains(table) {
            return Err(CoreError::UnknownTable(table.to_string()));
        }
        if let Some(row) = self.staged_rows.get(&(table.to_string(), id)) {
            return Ok(Some(row.clone()));
        }
        Ok(self
            .inner
            .tables
            .get(table)
            .and_then(|rows| rows.get(&id))
            .cloned())
    }

    fn row_exists(&self, table: &str, id: RowId) -> bool {
        self.staged_rows.contains_key(&(table.to_string(), id))
            || self
                .inner
                .tables
                .get(table)
                .is_some_and(|rows| rows.contains_key(&id))
    }

    /// Verifies every FK column present in `columns` references an
    /// existing target row. Soft-deleted parents still satisfy the
    /// constraint; rows are never physically removed.
    fn check_fks(&self, table: &str, columns: &BTreeMap<String, Value>) -> CoreResult<()> {
        for (column, target) in self.schema.fk_edges(table) {
            let Some(value) = columns.get(column) else {
                continue;
            };
            let Some(ref_id) = value.as_row_id() else {
                continue;
            };
            if !self.row_exists(target, ref_id) {
                return Err(CoreError::fk_violation(
                    table,
                    column.clone(),
                    target.clone(),
                    ref_id.as_u64(),
                ));
            }
        }
        Ok(())
    }

    fn stage_row(&mut self, table: &str, row: Row) {
        self.staged_rows.insert((table.to_string(), row.id), row);
    }

    fn stage_capture(&mut self, table: &str, op: ChangeOp, row: &Row) {
        self.staged_log.push(StagedLog::Local {
            table: table.to_string(),
            op,
            row: row.clone(),
        });
    }

    /// Inserts a row, minting an id from the bound allocator.
    ///
    /// Fails with [`CoreError::NoAllocatorBound`] when no allocator is
    /// bound to the current context. The row starts at version 1 with
    /// `deleted_at` unset, and an `Insert` capture is staged.
    pub fn insert(&mut self, table: &str, data: BTreeMap<String, Value>) -> CoreResult<RowId> {
        let id = current_allocator()?.next_id();
        self.insert_with_id(table, id, data)?;
        Ok(id)
    }

    /// Inserts a row under a caller-provided id.
    pub fn insert_with_id(
        &mut self,
        table: &str,
        id: RowId,
        data: BTreeMap<String, Value>,
    ) -> CoreResult<()> {
        if !self.schema.contains(table) {
            return Err(CoreError::UnknownTable(table.to_string()));
        }
        self.check_fks(table, &data)?;

        let row = Row::new(id, data, Utc::now());
        self.stage_capture(table, ChangeOp::Insert, &row);
        self.stage_row(table, row);
        Ok(())
    }

    /// Updates domain columns of a row.
    ///
    /// The dirty set is computed against the pre-image by value, so
    /// reassigning identical values does not count. System-column
    /// assignments are ignored. A write whose dirty set is empty is
    /// non-meaningful: the store-level auto timestamp still fires but
    /// the version is not bumped and nothing is captured.
    pub fn update(
        &mut self,
        table: &str,
        id: RowId,
        changes: BTreeMap<String, Value>,
    ) -> CoreResult<()> {
        let mut row = self
            .get(table, id)?
            .ok_or_else(|| CoreError::row_not_found(table, id.as_u64()))?;

        let dirty: BTreeMap<String, Value> = changes
            .into_iter()
            .filter(|(column, value)| {
                !is_system_column(column) && row.get(column) != value
            })
            .collect();

        if dirty.is_empty() {
            row.updated_at = Utc::now();
            self.stage_row(table, row);
            return Ok(());
        }

        self.check_fks(table, &dirty)?;
        for (column, value) in dirty {
            row.data.insert(column, value);
        }
        row.version += 1;
        row.updated_at = Utc::now();

        self.stage_capture(table, ChangeOp::Update, &row);
        self.stage_row(table, row);
        Ok(())
    }

    /// Soft-deletes a row: sets `deleted_at`, bumps the version, and
    /// stages a `Delete` capture. Deleting an already-deleted row is a
    /// no-op.
    pub fn soft_delete(&mut self, table: &str, id: RowId) -> CoreResult<()> {
        let mut row = self
            .get(table, id)?
            .ok_or_else(|| CoreError::row_not_found(table, id.as_u64()))?;
        if row.deleted_at.is_some() {
            return Ok(());
        }

        let now = Utc::now();
        row.deleted_at = Some(now);
        row.updated_at = now;
        row.version += 1;

        self.stage_capture(table, ChangeOp::Delete, &row);
        self.stage_row(table, row);
        Ok(())
    }

    /// Applies an incoming change entry without capturing.
    ///
    /// This is the sync-apply path: the payload is upserted over the
    /// current row (absent columns are left alone), including
    /// `version`, `updated_at` and `deleted_at`, and no changelog
    /// entry is staged. Conflict-policy decisions happen before this
    /// call.
    pub fn apply_sync(&mut self, entry: &ChangeEntry) -> CoreResult<()> {
        if !self.schema.contains(&entry.table) {
            return Err(CoreError::UnknownTable(entry.table.clone()));
        }
        let payload = entry.payload.as_ref().ok_or_else(|| {
            CoreError::serialization(format!(
                "change {} for {} has no payload",
                entry.change_id, entry.table
            ))
        })?;

        let incoming = Row::from_payload(entry.row_id, entry.version, entry.updated_at, payload)?;
        self.check_fks(&entry.table, &incoming.data)?;

        let merged = match self.get(&entry.table, entry.row_id)? {
            Some(mut existing) => {
                existing.version = incoming.version;
                existing.updated_at = incoming.updated_at;
                existing.deleted_at = incoming.deleted_at;
                for (column, value) in incoming.data {
                    existing.data.insert(column, value);
                }
                existing
            }
            None => incoming,
        };
        self.stage_row(&entry.table, merged);
        Ok(())
    }

    /// Re-logs a foreign-authored entry into the local changelog.
    ///
    /// The origin, version and payload are preserved; a fresh local
    /// change id is assigned at commit. This is how a server makes
    /// pushed changes visible to its other peers.
    pub fn append_foreign(&mut self, entry: ChangeEntry) {
        self.staged_log.push(StagedLog::Foreign(entry));
    }

    /// The sync state for a peer as seen by this transaction.
    pub fn sync_state(&self, peer_id: &str) -> SyncState {
        if let Some(state) = self.staged_state.get(peer_id) {
            return state.clone();
        }
        self.inner
            .sync_state
            .get(peer_id)
            .cloned()
            .unwrap_or_else(|| SyncState::new(peer_id))
    }

    /// Advances the pull watermark for a peer.
    pub fn advance_pulled(&mut self, peer_id: &str, change_id: u64) {
        let mut state = self.sync_state(peer_id);
        state.advance_pulled(change_id);
        self.staged_state.insert(peer_id.to_string(), state);
    }

    /// Advances the push watermark for a peer.
    pub fn advance_pushed(&mut self, peer_id: &str, change_id: u64) {
        let mut state = self.sync_state(peer_id);
        state.advance_pushed(change_id);
        self.staged_state.insert(peer_id.to_string(), state);
    }

    fn commit(self) {
        for ((table, id), row) in self.staged_rows {
            if let Some(rows) = self.inner.tables.get_mut(&table) {
                rows.insert(id, row);
            }
        }

        for staged in self.staged_log {
            let entry = match staged {
                StagedLog::Local { table, op, row } => {
                    let payload = match op {
                        ChangeOp::Delete => row.system_payload(),
                        _ => row.full_payload(),
                    };
                    ChangeEntry {
                        change_id: 0,
                        table,
                        row_id: row.id,
                        op,
                        payload: Some(payload),
                        version: row.version,
                        updated_at: row.updated_at,
                        origin_node_id: self.node_id.to_string(),
                        captured_at: Utc::now(),
                    }
                }
                StagedLog::Foreign(entry) => entry,
            };
            self.inner.changelog.append(entry);
        }

        for (peer_id, staged) in self.staged_state {
            let state = self
                .inner
                .sync_state
                .entry(peer_id.clone())
                .or_insert_with(|| SyncState::new(peer_id));
            state.advance_pulled(staged.last_pulled_change_id);
            state.advance_pushed(staged.last_pushed_change_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{bind_allocator, IdAllocator};
    use crate::schema::TableDef;

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

    fn bound_db(node: u16) -> (Database, crate::ids::AllocatorGuard) {
        let db = Database::new(test_schema(), node.to_string());
        let guard = bind_allocator(Arc::new(IdAllocator::new(node).unwrap()));
        (db, guard)
    }

    fn name(value: &str) -> BTreeMap<String, Value> {
        let mut data = BTreeMap::new();
        data.insert("name".to_string(), Value::from(value));
        data
    }

    #[test]
    fn insert_mints_id_from_bound_allocator() {
        let (db, _guard) = bound_db(7);

        let id = db
            .transaction(|txn| txn.insert("customers", name("Ada")))
            .unwrap();

        assert_eq!(id.node_id(), 7);
        let row = db.get("customers", id).unwrap().unwrap();
        assert_eq!(row.version, 1);
        assert!(row.is_live());

        let changes = db.changes_since(0, 10);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].op, ChangeOp::Insert);
        assert_eq!(changes[0].origin_node_id, "7");
        assert_eq!(changes[0].version, 1);
    }

    #[test]
    fn insert_without_allocator_fails() {
        let _serial = crate::ids::tests_default_lock().lock();
        crate::ids::clear_default_allocator();
        let db = Database::new(test_schema(), "1");

        let err = db
            .transaction(|txn| txn.insert("customers", name("Ada")))
            .unwrap_err();
        assert!(matches!(err, CoreError::NoAllocatorBound));
        assert_eq!(db.changelog_len(), 0);
    }

    #[test]
    fn explicit_id_is_respected() {
        let (db, _guard) = bound_db(1);
        let id = RowId::from_raw(4242);

        db.transaction(|txn| txn.insert_with_id("customers", id, name("Ada")))
            .unwrap();

        assert!(db.get("customers", id).unwrap().is_some());
    }

    #[test]
    fn insert_rejects_missing_fk_parent() {
        let (db, _guard) = bound_db(1);

        let mut data = BTreeMap::new();
        data.insert("total".to_string(), Value::Integer(100));
        data.insert("customer_id".to_string(), Value::Integer(999));

        let err = db
            .transaction(|txn| txn.insert("orders", data))
            .unwrap_err();
        assert!(matches!(err, CoreError::ForeignKeyViolation { .. }));
        assert_eq!(db.changelog_len(), 0);
    }

    #[test]
    fn fk_satisfied_by_parent_staged_in_same_txn() {
        let (db, _guard) = bound_db(1);

        db.transaction(|txn| {
            let customer = txn.insert("customers", name("Ada"))?;
            let mut data = BTreeMap::new();
            data.insert("total".to_string(), Value::Integer(100));
            data.insert("customer_id".to_string(), Value::from(customer));
            txn.insert("orders", data)?;
            Ok(())
        })
        .unwrap();

        assert_eq!(db.changelog_len(), 2);
    }

    #[test]
    fn meaningful_update_bumps_version_and_logs() {
        let (db, _guard) = bound_db(1);
        let id = db
            .transaction(|txn| txn.insert("customers", name("Ada")))
            .unwrap();

        db.transaction(|txn| txn.update("customers", id, name("Grace")))
            .unwrap();

        let row = db.get("customers", id).unwrap().unwrap();
        assert_eq!(row.version, 2);
        assert_eq!(row.get("name"), &Value::from("Grace"));

        let changes = db.changes_since(0, 10);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[1].op, ChangeOp::Update);
        assert_eq!(changes[1].version, 2);
    }

    #[test]
    fn reassigning_identical_value_is_suppressed() {
        let (db, _guard) = bound_db(1);
        let id = db
            .transaction(|txn| txn.insert("customers", name("Ada")))
            .unwrap();
        let before = db.get("customers", id).unwrap().unwrap();

        db.transaction(|txn| txn.update("customers", id, name("Ada")))
            .unwrap();

        let after = db.get("customers", id).unwrap().unwrap();
        assert_eq!(after.version, 1);
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(db.changelog_len(), 1);
    }

    #[test]
    fn system_column_assignment_is_not_meaningful() {
        let (db, _guard) = bound_db(1);
        let id = db
            .transaction(|txn| txn.insert("customers", name("Ada")))
            .unwrap();

        let mut changes = BTreeMap::new();
        changes.insert(
            "updated_at".to_string(),
            Value::from_timestamp(Utc::now()),
        );
        changes.insert("version".to_string(), Value::Integer(99));
        db.transaction(|txn| txn.update("customers", id, changes))
            .unwrap();

        let row = db.get("customers", id).unwrap().unwrap();
        assert_eq!(row.version, 1);
        assert_eq!(db.changelog_len(), 1);
    }

    #[test]
    fn soft_delete_logs_system_only_payload() {
        let (db, _guard) = bound_db(1);
        let id = db
            .transaction(|txn| txn.insert("customers", name("Ada")))
            .unwrap();

        db.transaction(|txn| txn.soft_delete("customers", id))
            .unwrap();

        let row = db.get("customers", id).unwrap().unwrap();
        assert!(row.deleted_at.is_some());
        assert_eq!(row.version, 2);
        // Domain data survives a soft delete.
        assert_eq!(row.get("name"), &Value::from("Ada"));

        let changes = db.changes_since(0, 10);
        assert_eq!(changes[1].op, ChangeOp::Delete);
        let payload = changes[1].payload.as_ref().unwrap();
        assert!(!payload.contains_key("name"));
        assert!(payload.get("deleted_at").unwrap().as_timestamp().is_some());
    }

    #[test]
    fn soft_delete_is_idempotent() {
        let (db, _guard) = bound_db(1);
        let id = db
            .transaction(|txn| txn.insert("customers", name("Ada")))
            .unwrap();

        db.transaction(|txn| txn.soft_delete("customers", id))
            .unwrap();
        db.transaction(|txn| txn.soft_delete("customers", id))
            .unwrap();

        let row = db.get("customers", id).unwrap().unwrap();
        assert_eq!(row.version, 2);
        assert_eq!(db.changelog_len(), 2);
    }

    #[test]
    fn aborted_transaction_leaves_no_trace() {
        let (db, _guard) = bound_db(1);

        let result: CoreResult<()> = db.transaction(|txn| {
            txn.insert("customers", name("Ada"))?;
            Err(CoreError::serialization("forced abort"))
        });

        assert!(result.is_err());
        assert_eq!(db.row_count("customers").unwrap(), 0);
        assert_eq!(db.changelog_len(), 0);
    }

    #[test]
    fn apply_sync_captures_nothing() {
        let (db, _guard) = bound_db(1);
        let id = RowId::from_raw(500);
        let mut row = Row::new(id, name("Remote"), Utc::now());
        row.version = 3;

        let entry = ChangeEntry {
            change_id: 9,
            table: "customers".to_string(),
            row_id: id,
            op: ChangeOp::Insert,
            payload: Some(row.full_payload()),
            version: 3,
            updated_at: row.updated_at,
            origin_node_id: "2".to_string(),
            captured_at: Utc::now(),
        };

        db.transaction(|txn| txn.apply_sync(&entry)).unwrap();

        let applied = db.get("customers", id).unwrap().unwrap();
        assert_eq!(applied.version, 3);
        assert_eq!(applied.get("name"), &Value::from("Remote"));
        assert_eq!(db.changelog_len(), 0);
    }

    #[test]
    fn apply_sync_merges_delete_over_existing_data() {
        let (db, _guard) = bound_db(1);
        let id = db
            .transaction(|txn| txn.insert("customers", name("Ada")))
            .unwrap();

        let deleted_at = Utc::now();
        let mut tombstone = db.get("customers", id).unwrap().unwrap();
        tombstone.version = 2;
        tombstone.updated_at = deleted_at;
        tombstone.deleted_at = Some(deleted_at);

        let entry = ChangeEntry {
            change_id: 1,
            table: "customers".to_string(),
            row_id: id,
            op: ChangeOp::Delete,
            payload: Some(tombstone.system_payload()),
            version: 2,
            updated_at: deleted_at,
            origin_node_id: "2".to_string(),
            captured_at: Utc::now(),
        };

        db.transaction(|txn| txn.apply_sync(&entry)).unwrap();

        let row = db.get("customers", id).unwrap().unwrap();
        assert!(row.deleted_at.is_some());
        assert_eq!(row.version, 2);
        assert_eq!(row.get("name"), &Value::from("Ada"));
    }

    #[test]
    fn append_foreign_preserves_origin() {
        let (db, _guard) = bound_db(1);

        let entry = ChangeEntry {
            change_id: 77,
            table: "customers".to_string(),
            row_id: RowId::from_raw(10),
            op: ChangeOp::Insert,
            payload: Some(BTreeMap::new()),
            version: 1,
            updated_at: Utc::now(),
            origin_node_id: "9".to_string(),
            captured_at: Utc::now(),
        };

        db.transaction(|txn| {
            txn.append_foreign(entry);
            Ok(())
        })
        .unwrap();

        let changes = db.changes_since(0, 10);
        assert_eq!(changes.len(), 1);
        // Fresh local change id, origin preserved.
        assert_eq!(changes[0].change_id, 1);
        assert_eq!(changes[0].origin_node_id, "9");

        // Not a push candidate for this node.
        assert!(db.authored_changes_since(0, 10).is_empty());
    }

    #[test]
    fn sync_state_watermarks_commit_with_txn() {
        let (db, _guard) = bound_db(1);
        assert_eq!(db.sync_state("server").last_pulled_change_id, 0);

        db.transaction(|txn| {
            txn.advance_pulled("server", 12);
            txn.advance_pushed("server", 4);
            Ok(())
        })
        .unwrap();

        let state = db.sync_state("server");
        assert_eq!(state.last_pulled_change_id, 12);
        assert_eq!(state.last_pushed_change_id, 4);

        // Monotonic across transactions.
        db.transaction(|txn| {
            txn.advance_pulled("server", 3);
            Ok(())
        })
        .unwrap();
        assert_eq!(db.sync_state("server").last_pulled_change_id, 12);
    }

    #[test]
    fn multiple_writes_in_one_txn_log_in_order() {
        let (db, _guard) = bound_db(1);

        let id = db
            .transaction(|txn| {
                let id = txn.insert("customers", name("Ada"))?;
                txn.update("customers", id, name("Grace"))?;
                Ok(id)
            })
            .unwrap();

        let changes = db.changes_since(0, 10);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].op, ChangeOp::Insert);
        assert_eq!(changes[0].version, 1);
        assert_eq!(changes[1].op, ChangeOp::Update);
        assert_eq!(changes[1].version, 2);
        assert_eq!(db.get("customers", id).unwrap().unwrap().version, 2);
    }
}
