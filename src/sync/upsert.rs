//! Change-aware upsert of materialized rows into one table.
//!
//! Every incoming row is classified as inserted, updated or unchanged by a
//! single conditional statement:
//!
//! ```sql
//! INSERT INTO t (k, a, b, row_hash, row_version) VALUES (?, ?, ?, ?, 1)
//! ON CONFLICT (k) DO UPDATE SET a = excluded.a, b = excluded.b,
//!     row_hash = excluded.row_hash, row_version = t.row_version + 1
//! WHERE t.row_hash IS NOT excluded.row_hash
//! RETURNING row_version
//! ```
//!
//! No returned row means the stored fingerprint matched (unchanged), a
//! version of 1 means a fresh insert and anything higher an applied update.
//! The decision and the write cannot be separated by another writer.
//!
//! A failing row is recorded and skipped; SQLite aborts only that statement,
//! so the surrounding transaction keeps every other row's write. The caller
//! owns the transaction and decides whether to commit.

use std::collections::HashMap;

use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, warn};

use super::hash::fingerprint;
use crate::error::{Error, Result};
use crate::model::{quote_identifier, TableRow, TableSpec, Value, ROW_HASH_COLUMN, ROW_VERSION_COLUMN};
use crate::storage::verify_table;

/// A row that could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// Canonical text of the row's key, or `<missing>`.
    pub key: String,
    pub cause: String,
}

/// Outcome of reconciling one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub table: String,
    /// Rows written that were not present before.
    pub inserted: usize,
    /// Rows whose fingerprint differed and were rewritten.
    pub updated: usize,
    /// Rows whose fingerprint matched; nothing written.
    pub unchanged: usize,
    /// Incoming rows dropped because a later row had the same key.
    pub duplicates: usize,
    /// Rows deleted before reloading an append-only table.
    pub cleared: usize,
    pub errors: Vec<RowError>,
}

impl ReconcileReport {
    #[must_use]
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Self::default()
        }
    }

    /// Rows that reached a decision (written, skipped or failed).
    #[must_use]
    pub fn processed(&self) -> usize {
        self.inserted + self.updated + self.unchanged + self.errors.len()
    }

    /// Rows that caused a write.
    #[must_use]
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Reconcile `rows` into the table described by `spec`.
///
/// Reconciled tables are upserted row by row with fingerprint comparison.
/// Append-only tables are cleared and reloaded. Cells are bound by the
/// spec's column names; extra cells on a row are ignored.
///
/// # Errors
///
/// Table-level failures only: an invalid spec, a missing table, a schema
/// mismatch, or a statement that cannot be prepared. Per-row failures are
/// returned in [`ReconcileReport::errors`].
pub fn reconcile(conn: &Connection, spec: &TableSpec, rows: &[TableRow]) -> Result<ReconcileReport> {
    spec.validate()?;
    verify_table(conn, spec)?;

    let report = if spec.append_only {
        reload(conn, spec, rows)?
    } else {
        upsert(conn, spec, rows)?
    };

    debug!(
        table = %report.table,
        inserted = report.inserted,
        updated = report.updated,
        unchanged = report.unchanged,
        cleared = report.cleared,
        errors = report.errors.len(),
        "Reconciled table"
    );
    Ok(report)
}

fn upsert(conn: &Connection, spec: &TableSpec, rows: &[TableRow]) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::new(&spec.name);
    let (rows, duplicates) = collapse_duplicates(rows, &spec.key_column);
    report.duplicates = duplicates;
    if duplicates > 0 {
        warn!(table = %spec.name, duplicates, "Collapsed rows with repeated keys, last one wins");
    }

    let mut stmt = conn
        .prepare(&upsert_sql(spec))
        .map_err(|source| table_error(spec, source))?;

    for row in rows {
        let key = row_key(row, &spec.key_column);
        let outcome = bind_values(spec, row).and_then(|values| {
            let hash = fingerprint(row, &spec.change_columns)?;
            let mut params: Vec<&dyn ToSql> = values.iter().map(|v| *v as &dyn ToSql).collect();
            params.push(&hash);
            Ok(stmt
                .query_row(params.as_slice(), |r| r.get::<_, i64>(0))
                .optional()?)
        });

        match outcome {
            Ok(None) => report.unchanged += 1,
            Ok(Some(1)) => report.inserted += 1,
            Ok(Some(_)) => report.updated += 1,
            Err(e) => record_error(&mut report, key, &e),
        }
    }

    Ok(report)
}

fn reload(conn: &Connection, spec: &TableSpec, rows: &[TableRow]) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::new(&spec.name);
    report.cleared = conn
        .execute(&format!("DELETE FROM {}", quote_identifier(&spec.name)), [])
        .map_err(|source| table_error(spec, source))?;

    let mut stmt = conn
        .prepare(&insert_sql(spec))
        .map_err(|source| table_error(spec, source))?;

    for row in rows {
        let outcome = bind_values(spec, row).and_then(|values| {
            let params: Vec<&dyn ToSql> = values.iter().map(|v| *v as &dyn ToSql).collect();
            Ok(stmt.execute(params.as_slice())?)
        });
        match outcome {
            Ok(_) => report.inserted += 1,
            Err(e) => record_error(&mut report, row_key(row, &spec.key_column), &e),
        }
    }

    Ok(report)
}

/// Values for the table's columns in declared order.
fn bind_values<'r>(spec: &TableSpec, row: &'r TableRow) -> Result<Vec<&'r Value>> {
    spec.column_names()
        .map(|name| {
            row.get(name).ok_or_else(|| Error::MissingField {
                column: name.to_string(),
            })
        })
        .collect()
}

/// Keep the last occurrence of each key at the position of its first.
fn collapse_duplicates<'r>(rows: &'r [TableRow], key_column: &str) -> (Vec<&'r TableRow>, usize) {
    let mut out: Vec<&TableRow> = Vec::with_capacity(rows.len());
    let mut index: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    let mut duplicates = 0;

    for row in rows {
        let Some(key) = row.get(key_column).map(Value::canonical) else {
            // Keyless rows fail individually later.
            out.push(row);
            continue;
        };
        if let Some(&slot) = index.get(&key) {
            out[slot] = row;
            duplicates += 1;
        } else {
            index.insert(key, out.len());
            out.push(row);
        }
    }

    (out, duplicates)
}

fn row_key(row: &TableRow, key_column: &str) -> String {
    row.get(key_column)
        .map_or_else(|| "<missing>".to_string(), Value::canonical)
}

fn record_error(report: &mut ReconcileReport, key: String, error: &Error) {
    warn!(table = %report.table, key = %key, error = %error, "Row failed, continuing");
    report.errors.push(RowError {
        key,
        cause: error.to_string(),
    });
}

fn table_error(spec: &TableSpec, source: rusqlite::Error) -> Error {
    Error::Transaction {
        table: spec.name.clone(),
        source,
    }
}

/// Conditional upsert statement for a reconciled table.
pub(crate) fn upsert_sql(spec: &TableSpec) -> String {
    let table = quote_identifier(&spec.name);
    let key = quote_identifier(&spec.key_column);
    let hash = quote_identifier(ROW_HASH_COLUMN);
    let version = quote_identifier(ROW_VERSION_COLUMN);

    let columns: Vec<String> = spec.column_names().map(quote_identifier).collect();
    let placeholders: Vec<String> = (1..=columns.len() + 1).map(|i| format!("?{i}")).collect();

    let mut assignments: Vec<String> = spec
        .column_names()
        .filter(|c| *c != spec.key_column)
        .map(|c| {
            let c = quote_identifier(c);
            format!("{c} = excluded.{c}")
        })
        .collect();
    assignments.push(format!("{hash} = excluded.{hash}"));
    assignments.push(format!("{version} = {table}.{version} + 1"));

    format!(
        "INSERT INTO {table} ({cols}, {hash}, {version}) VALUES ({vals}, 1) \
         ON CONFLICT ({key}) DO UPDATE SET {sets} \
         WHERE {table}.{hash} IS NOT excluded.{hash} \
         RETURNING {version}",
        cols = columns.join(", "),
        vals = placeholders.join(", "),
        sets = assignments.join(", "),
    )
}

/// Plain insert for an append-only table.
pub(crate) fn insert_sql(spec: &TableSpec) -> String {
    let columns: Vec<String> = spec.column_names().map(quote_identifier).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(&spec.name),
        columns.join(", "),
        placeholders.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;
    use crate::storage::{CreateMode, SqliteStorage};

    fn setup(kinds: &[EntityKind]) -> SqliteStorage {
        let mut storage = SqliteStorage::open_memory().unwrap();
        let specs: Vec<TableSpec> = kinds.iter().map(|k| TableSpec::for_kind(*k)).collect();
        storage.provision(&specs, CreateMode::Auto).unwrap();
        storage
    }

    fn position(id: i64, short: &str, count: i64) -> TableRow {
        TableRow::new()
            .with("pos_id", id)
            .with("plural_name", format!("{short}s"))
            .with("singular_name", short)
            .with("position_name", short)
            .with("element_count", count)
    }

    fn positions() -> Vec<TableRow> {
        vec![
            position(1, "GKP", 80),
            position(2, "DEF", 250),
            position(3, "MID", 300),
            position(4, "FWD", 90),
        ]
    }

    fn stored_version(storage: &SqliteStorage, id: i64) -> i64 {
        storage
            .conn()
            .query_row("SELECT row_version FROM positions WHERE pos_id = ?1", [id], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_first_run_inserts_everything() {
        let storage = setup(&[EntityKind::Positions]);
        let spec = TableSpec::for_kind(EntityKind::Positions);

        let report = reconcile(storage.conn(), &spec, &positions()).unwrap();
        assert_eq!(report.inserted, 4);
        assert_eq!(report.updated, 0);
        assert_eq!(report.unchanged, 0);
        assert!(report.is_clean());
        assert_eq!(storage.row_count("positions").unwrap(), 4);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let storage = setup(&[EntityKind::Positions]);
        let spec = TableSpec::for_kind(EntityKind::Positions);

        reconcile(storage.conn(), &spec, &positions()).unwrap();
        let second = reconcile(storage.conn(), &spec, &positions()).unwrap();

        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, 0);
        assert_eq!(second.unchanged, 4);
        assert_eq!(stored_version(&storage, 1), 1);
    }

    #[test]
    fn test_single_change_column_mutation_updates_one_row() {
        let storage = setup(&[EntityKind::Positions]);
        let spec = TableSpec::for_kind(EntityKind::Positions);
        reconcile(storage.conn(), &spec, &positions()).unwrap();

        let mut rows = positions();
        rows[2].set("element_count", 301);
        let report = reconcile(storage.conn(), &spec, &rows).unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(report.unchanged, 3);
        assert_eq!(report.inserted, 0);
        assert_eq!(stored_version(&storage, 3), 2);
        let count: i64 = storage
            .conn()
            .query_row("SELECT element_count FROM positions WHERE pos_id = 3", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 301);
    }

    #[test]
    fn test_non_change_column_does_not_trigger_update() {
        let storage = setup(&[EntityKind::Positions]);
        let spec = TableSpec::for_kind(EntityKind::Positions);
        reconcile(storage.conn(), &spec, &positions()).unwrap();

        let mut rows = positions();
        rows[0].set("plural_name", "Keepers");
        let report = reconcile(storage.conn(), &spec, &rows).unwrap();
        assert_eq!(report.unchanged, 4);

        let plural: String = storage
            .conn()
            .query_row("SELECT plural_name FROM positions WHERE pos_id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(plural, "GKPs");
    }

    #[test]
    fn test_custom_change_columns() {
        let storage = setup(&[EntityKind::Positions]);
        let spec = TableSpec::for_kind(EntityKind::Positions).with_change_columns(["plural_name"]);
        reconcile(storage.conn(), &spec, &positions()).unwrap();

        let mut rows = positions();
        rows[0].set("plural_name", "Keepers");
        rows[1].set("element_count", 1);
        let report = reconcile(storage.conn(), &spec, &rows).unwrap();
        assert_eq!(report.updated, 1);
        assert_eq!(report.unchanged, 3);
    }

    #[test]
    fn test_new_key_inserted_alongside_existing() {
        let storage = setup(&[EntityKind::Positions]);
        let spec = TableSpec::for_kind(EntityKind::Positions);
        reconcile(storage.conn(), &spec, &positions()[..2]).unwrap();

        let report = reconcile(storage.conn(), &spec, &positions()).unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.unchanged, 2);
    }

    #[test]
    fn test_row_failure_is_isolated() {
        let storage = setup(&[EntityKind::Positions]);
        let spec = TableSpec::for_kind(EntityKind::Positions);

        let mut rows = positions();
        // STRICT INTEGER column rejects text that is not an integer.
        rows[1].set("element_count", "many");
        let report = reconcile(storage.conn(), &spec, &rows).unwrap();

        assert_eq!(report.inserted, 3);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].key, "2");
        assert_eq!(report.processed(), 4);
        assert_eq!(storage.row_count("positions").unwrap(), 3);
    }

    #[test]
    fn test_missing_change_column_is_row_error() {
        let storage = setup(&[EntityKind::Positions]);
        let spec = TableSpec::for_kind(EntityKind::Positions);

        let mut rows = positions();
        rows[3].remove("element_count");
        let report = reconcile(storage.conn(), &spec, &rows).unwrap();

        assert_eq!(report.inserted, 3);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].key, "4");
        assert!(report.errors[0].cause.contains("element_count"));
    }

    #[test]
    fn test_duplicate_keys_last_write_wins() {
        let storage = setup(&[EntityKind::Positions]);
        let spec = TableSpec::for_kind(EntityKind::Positions);

        let rows = vec![position(1, "GKP", 80), position(2, "DEF", 250), position(1, "GKP", 81)];
        let report = reconcile(storage.conn(), &spec, &rows).unwrap();

        assert_eq!(report.duplicates, 1);
        assert_eq!(report.inserted, 2);
        let count: i64 = storage
            .conn()
            .query_row("SELECT element_count FROM positions WHERE pos_id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 81);
    }

    #[test]
    fn test_collapse_keeps_first_position() {
        let rows = vec![position(1, "A", 1), position(2, "B", 1), position(1, "C", 1)];
        let (out, dups) = collapse_duplicates(&rows, "pos_id");
        assert_eq!(dups, 1);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get("singular_name"), Some(&Value::from("C")));
        assert_eq!(out[1].get("singular_name"), Some(&Value::from("B")));
    }

    #[test]
    fn test_missing_table_fails_before_writing() {
        let storage = SqliteStorage::open_memory().unwrap();
        let spec = TableSpec::for_kind(EntityKind::Positions);
        let err = reconcile(storage.conn(), &spec, &positions()).unwrap_err();
        assert!(matches!(err, Error::TableMissing { .. }));
    }

    fn history_row(player: i64, fixture: i64) -> TableRow {
        let spec = TableSpec::for_kind(EntityKind::History);
        let mut row = TableRow::new();
        for col in &spec.columns {
            row.push(col.target, crate::materialize::default_for(col.ty));
        }
        row.set("player_id", player);
        row.set("fixture_id", fixture);
        row
    }

    #[test]
    fn test_append_only_reload_replaces_contents() {
        let storage = setup(&[EntityKind::History]);
        let spec = TableSpec::for_kind(EntityKind::History);
        let rows: Vec<TableRow> = (1..=5).map(|f| history_row(7, f)).collect();

        let first = reconcile(storage.conn(), &spec, &rows).unwrap();
        assert_eq!(first.inserted, 5);
        assert_eq!(first.cleared, 0);

        let second = reconcile(storage.conn(), &spec, &rows).unwrap();
        assert_eq!(second.inserted, 5);
        assert_eq!(second.cleared, 5);
        assert_eq!(storage.row_count("history").unwrap(), 5);
    }

    #[test]
    fn test_append_only_keeps_repeated_keys() {
        let storage = setup(&[EntityKind::History]);
        let spec = TableSpec::for_kind(EntityKind::History);
        let rows = vec![history_row(7, 1), history_row(7, 1)];

        let report = reconcile(storage.conn(), &spec, &rows).unwrap();
        assert_eq!(report.inserted, 2);
        assert_eq!(report.duplicates, 0);
    }

    #[test]
    fn test_upsert_sql_shape() {
        let sql = upsert_sql(&TableSpec::for_kind(EntityKind::Positions));
        assert!(sql.starts_with("INSERT INTO \"positions\" (\"pos_id\""));
        assert!(sql.contains("ON CONFLICT (\"pos_id\") DO UPDATE SET \"plural_name\" = excluded.\"plural_name\""));
        assert!(!sql.contains("\"pos_id\" = excluded"));
        assert!(sql.ends_with("RETURNING \"row_version\""));
    }
}
