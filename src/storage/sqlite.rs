//! SQLite storage implementation.
//!
//! This module provides the storage backend for fplsync. Writes go through
//! IMMEDIATE transactions so a concurrent run blocks at `BEGIN` instead of
//! failing halfway through a table.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::runs::{self, RunTotals, SyncRun};
use super::schema::{self, apply_schema, CreateMode};
use super::SchemaCatalog;
use crate::error::{Error, Result};
use crate::model::{quote_identifier, validate_identifier, TableSpec};

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Presence and size of one synchronized table.
#[derive(Debug, Clone, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub exists: bool,
    pub rows: i64,
    pub append_only: bool,
    pub key_column: String,
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies the bookkeeping schema if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        debug!(path = %path.display(), "Opened database");
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Begin an IMMEDIATE transaction.
    ///
    /// Dropping the returned transaction without committing rolls it back.
    ///
    /// # Errors
    ///
    /// Returns an error if the write lock cannot be taken.
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }

    /// Run `f` inside an IMMEDIATE transaction and commit if it succeeds.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or a commit failure. The transaction is
    /// rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction) -> Result<R>,
    {
        let tx = self.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        debug!(op, "Committed mutation");
        Ok(result)
    }

    /// Create, recreate or leave alone the tables for `specs`.
    ///
    /// # Errors
    ///
    /// Returns an error if a spec is invalid or DDL fails.
    pub fn provision(&mut self, specs: &[TableSpec], mode: CreateMode) -> Result<Vec<String>> {
        self.mutate("provision", |tx| schema::provision(tx, specs, mode))
    }

    /// Number of rows currently in `table`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a bad name, or a database error if the
    /// table does not exist.
    pub fn row_count(&self, table: &str) -> Result<i64> {
        validate_identifier(table)?;
        let sql = format!("SELECT COUNT(*) FROM {}", quote_identifier(table));
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    /// Presence and row count for each spec's table.
    ///
    /// # Errors
    ///
    /// Returns an error if a catalog query fails.
    pub fn table_info(&self, specs: &[TableSpec]) -> Result<Vec<TableInfo>> {
        specs
            .iter()
            .map(|spec| {
                let exists = self.table_exists(&spec.name)?;
                let rows = if exists { self.row_count(&spec.name)? } else { 0 };
                Ok(TableInfo {
                    name: spec.name.clone(),
                    exists,
                    rows,
                    append_only: spec.append_only,
                    key_column: spec.key_column.clone(),
                })
            })
            .collect()
    }

    // ==================
    // Run ledger
    // ==================

    /// Record the start of a pipeline run.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn begin_run(&self, id: &str, mode: &str, kinds: &str, dry_run: bool, started_at: i64) -> Result<()> {
        runs::insert_run(&self.conn, id, mode, kinds, dry_run, started_at)?;
        Ok(())
    }

    /// Record the outcome of a pipeline run. `failure` is the error, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub fn finish_run(
        &self,
        id: &str,
        totals: RunTotals,
        failure: Option<&Error>,
        finished_at: i64,
    ) -> Result<()> {
        let message = failure.map(ToString::to_string);
        let failure = failure
            .zip(message.as_deref())
            .map(|(e, msg)| (e.error_code().as_str(), msg));
        runs::finish_run(&self.conn, id, totals, failure, finished_at)?;
        Ok(())
    }

    /// Most recent runs first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn recent_runs(&self, limit: Option<u32>) -> Result<Vec<SyncRun>> {
        Ok(runs::recent_runs(&self.conn, limit)?)
    }

    /// Look up one run by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_run(&self, id: &str) -> Result<Option<SyncRun>> {
        Ok(runs::get_run(&self.conn, id)?)
    }
}

impl SchemaCatalog for Connection {
    fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?
            .exists([name])?)
    }

    fn columns(&self, name: &str) -> Result<Vec<String>> {
        let mut stmt = self.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
        let names = stmt
            .query_map([name], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }
}

impl SchemaCatalog for SqliteStorage {
    fn table_exists(&self, name: &str) -> Result<bool> {
        self.conn.table_exists(name)
    }

    fn columns(&self, name: &str) -> Result<Vec<String>> {
        self.conn.columns(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;

    #[test]
    fn test_open_memory() {
        let storage = SqliteStorage::open_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("fpl.db");
        SqliteStorage::open(&db_path).unwrap();
        assert!(db_path.exists());
    }

    #[test]
    fn test_catalog_queries() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        assert!(!storage.table_exists("positions").unwrap());

        storage
            .provision(&[TableSpec::for_kind(EntityKind::Positions)], CreateMode::Auto)
            .unwrap();
        assert!(storage.table_exists("positions").unwrap());
        assert_eq!(
            storage.columns("positions").unwrap(),
            [
                "pos_id",
                "plural_name",
                "singular_name",
                "position_name",
                "element_count",
                "row_hash",
                "row_version"
            ]
        );
        assert!(storage.columns("nope").unwrap().is_empty());
    }

    #[test]
    fn test_mutate_rolls_back_on_error() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        storage
            .provision(&[TableSpec::for_kind(EntityKind::Positions)], CreateMode::Auto)
            .unwrap();

        let result: Result<()> = storage.mutate("test", |tx| {
            tx.execute(
                "INSERT INTO positions VALUES (1, 'Goalkeepers', 'Goalkeeper', 'GKP', 5, 'h', 1)",
                [],
            )?;
            Err(Error::Other("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(storage.row_count("positions").unwrap(), 0);
    }

    #[test]
    fn test_table_info() {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let specs = vec![
            TableSpec::for_kind(EntityKind::Teams),
            TableSpec::for_kind(EntityKind::History),
        ];
        storage.provision(&specs[..1], CreateMode::Auto).unwrap();

        let info = storage.table_info(&specs).unwrap();
        assert!(info[0].exists);
        assert_eq!(info[0].rows, 0);
        assert!(!info[1].exists);
        assert!(info[1].append_only);
    }

    #[test]
    fn test_row_count_rejects_bad_identifier() {
        let storage = SqliteStorage::open_memory().unwrap();
        assert!(matches!(
            storage.row_count("teams; DROP TABLE sync_runs"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_finish_run_records_error_code() {
        let storage = SqliteStorage::open_memory().unwrap();
        storage.begin_run("r1", "full", "teams", false, 10).unwrap();
        let err = Error::TableMissing {
            table: "teams".into(),
        };
        storage
            .finish_run("r1", RunTotals::default(), Some(&err), 20)
            .unwrap();
        let run = storage.get_run("r1").unwrap().unwrap();
        assert_eq!(run.error_code.as_deref(), Some("TABLE_MISSING"));
        assert_eq!(run.error_message.as_deref(), Some("Table not found: teams"));
    }
}
