//! Database schema: bookkeeping tables plus DDL generated from table specs.
//!
//! The ledger tables are fixed SQL. Synchronized tables are created from
//! their [`TableSpec`] so the declared column layout is the single source of
//! truth for both materialization and storage.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::SchemaCatalog;
use crate::error::{Error, Result};
use crate::model::{
    quote_identifier, validate_identifier, TableSpec, ROW_HASH_COLUMN, ROW_VERSION_COLUMN,
};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Fixed bookkeeping schema.
///
/// Timestamps are stored as INTEGER (Unix milliseconds).
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- One row per pipeline invocation
CREATE TABLE IF NOT EXISTS sync_runs (
    id TEXT PRIMARY KEY,
    mode TEXT NOT NULL,
    kinds TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'running'
        CHECK (status IN ('running', 'succeeded', 'failed')),
    dry_run INTEGER NOT NULL DEFAULT 0,
    inserted INTEGER NOT NULL DEFAULT 0,
    updated INTEGER NOT NULL DEFAULT 0,
    unchanged INTEGER NOT NULL DEFAULT 0,
    row_errors INTEGER NOT NULL DEFAULT 0,
    error_code TEXT,
    error_message TEXT,
    started_at INTEGER NOT NULL,
    finished_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_sync_runs_started ON sync_runs(started_at);
";

/// Apply pragmas and the bookkeeping schema.
///
/// Safe to call on every open.
///
/// # Errors
///
/// Returns an error if a pragma or DDL statement fails.
pub fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "cache_size", "-64000")?; // 64MB cache
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}

/// How the pipeline treats target tables before reconciling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateMode {
    /// Create missing tables, keep existing ones.
    #[default]
    Auto,
    /// Drop and recreate every designated table.
    Force,
    /// Never touch DDL; tables must already exist.
    Skip,
}

impl CreateMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Force => "force",
            Self::Skip => "skip",
        }
    }
}

impl std::str::FromStr for CreateMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "auto" => Ok(Self::Auto),
            "force" => Ok(Self::Force),
            "skip" => Ok(Self::Skip),
            other => Err(Error::InvalidArgument(format!(
                "create mode must be auto, force or skip, got '{other}'"
            ))),
        }
    }
}

/// `CREATE TABLE` statement for a spec.
///
/// Tables are STRICT, so a value that cannot be stored losslessly in its
/// declared column type fails the statement. Reconciled tables get a primary
/// key on the key column plus the fingerprint and version columns.
///
/// # Errors
///
/// Returns `InvalidArgument` if the table layout fails validation.
pub fn create_table_sql(spec: &TableSpec) -> Result<String> {
    spec.validate()?;

    let mut defs: Vec<String> = spec
        .columns
        .iter()
        .map(|col| {
            let mut def = format!("{} {} NOT NULL", quote_identifier(col.target), col.ty.sql_type());
            if !spec.append_only && col.target == spec.key_column {
                def.push_str(" PRIMARY KEY");
            }
            def
        })
        .collect();

    if !spec.append_only {
        defs.push(format!("{} TEXT NOT NULL", quote_identifier(ROW_HASH_COLUMN)));
        defs.push(format!(
            "{} INTEGER NOT NULL DEFAULT 1",
            quote_identifier(ROW_VERSION_COLUMN)
        ));
    }

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n) STRICT",
        quote_identifier(&spec.name),
        defs.join(",\n    ")
    ))
}

/// Bring the tables for `specs` into the state `mode` asks for.
///
/// Returns the names of tables that were created.
///
/// # Errors
///
/// Returns an error if a spec is invalid or a DDL statement fails.
pub fn provision(conn: &Connection, specs: &[TableSpec], mode: CreateMode) -> Result<Vec<String>> {
    let mut created = Vec::new();
    if mode == CreateMode::Skip {
        return Ok(created);
    }

    for spec in specs {
        let ddl = create_table_sql(spec)?;
        if mode == CreateMode::Force {
            conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote_identifier(&spec.name)))?;
            debug!(table = %spec.name, "Dropped table");
        } else if conn.table_exists(&spec.name)? {
            continue;
        }
        conn.execute_batch(&ddl)?;
        info!(table = %spec.name, append_only = spec.append_only, "Created table");
        created.push(spec.name.clone());
    }

    Ok(created)
}

/// Check that the table for `spec` exists and has every persisted column.
///
/// # Errors
///
/// Returns `TableMissing` or `SchemaMismatch`.
pub fn verify_table(catalog: &impl SchemaCatalog, spec: &TableSpec) -> Result<()> {
    validate_identifier(&spec.name)?;
    if !catalog.table_exists(&spec.name)? {
        return Err(Error::TableMissing {
            table: spec.name.clone(),
        });
    }

    let existing = catalog.columns(&spec.name)?;
    let missing: Vec<String> = spec
        .persisted_columns()
        .into_iter()
        .filter(|c| !existing.iter().any(|e| e == c))
        .map(str::to_string)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::SchemaMismatch {
            table: spec.name.clone(),
            missing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_schema_applies() {
        let conn = conn();
        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='sync_runs'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = conn();
        apply_schema(&conn).expect("Second apply failed");
    }

    #[test]
    fn test_create_table_sql_reconciled() {
        let sql = create_table_sql(&TableSpec::for_kind(EntityKind::Positions)).unwrap();
        assert!(sql.contains("\"pos_id\" INTEGER NOT NULL PRIMARY KEY"));
        assert!(sql.contains("\"row_hash\" TEXT NOT NULL"));
        assert!(sql.trim_end().ends_with("STRICT"));
    }

    #[test]
    fn test_create_table_sql_append_only() {
        let sql = create_table_sql(&TableSpec::for_kind(EntityKind::History)).unwrap();
        assert!(!sql.contains("PRIMARY KEY"));
        assert!(!sql.contains("row_hash"));
    }

    #[test]
    fn test_provision_auto_then_verify() {
        let conn = conn();
        let specs = TableSpec::all();
        let created = provision(&conn, &specs, CreateMode::Auto).unwrap();
        assert_eq!(created.len(), specs.len());

        // Second pass creates nothing
        assert!(provision(&conn, &specs, CreateMode::Auto).unwrap().is_empty());

        for spec in &specs {
            verify_table(&conn, spec).unwrap();
        }
    }

    #[test]
    fn test_provision_force_recreates() {
        let conn = conn();
        let specs = vec![TableSpec::for_kind(EntityKind::Teams)];
        provision(&conn, &specs, CreateMode::Auto).unwrap();
        conn.execute(
            "INSERT INTO teams (team_id, code, team_name, team_short_name, win, draw, loss, played, points, position, strength,
             strength_overall_home, strength_overall_away, strength_attack_home, strength_attack_away,
             strength_defence_home, strength_defence_away, row_hash)
             VALUES (1, 3, 'Arsenal', 'ARS', 0, 0, 0, 0, 0, 1, 4, 0, 0, 0, 0, 0, 0, 'h')",
            [],
        )
        .unwrap();

        let created = provision(&conn, &specs, CreateMode::Force).unwrap();
        assert_eq!(created, ["teams"]);
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM teams", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_provision_skip_creates_nothing() {
        let conn = conn();
        let spec = TableSpec::for_kind(EntityKind::Players);
        provision(&conn, std::slice::from_ref(&spec), CreateMode::Skip).unwrap();
        assert!(matches!(
            verify_table(&conn, &spec),
            Err(Error::TableMissing { ref table }) if table == "players"
        ));
    }

    #[test]
    fn test_verify_reports_missing_columns() {
        let conn = conn();
        conn.execute_batch("CREATE TABLE positions (pos_id INTEGER PRIMARY KEY, plural_name TEXT)")
            .unwrap();
        let err = verify_table(&conn, &TableSpec::for_kind(EntityKind::Positions)).unwrap_err();
        match err {
            Error::SchemaMismatch { table, missing } => {
                assert_eq!(table, "positions");
                assert!(missing.contains(&"row_hash".to_string()));
                assert!(missing.contains(&"element_count".to_string()));
                assert!(!missing.contains(&"pos_id".to_string()));
            }
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_create_mode_parse() {
        assert_eq!("force".parse::<CreateMode>().unwrap(), CreateMode::Force);
        assert!("sometimes".parse::<CreateMode>().is_err());
    }
}
