//! Run ledger storage and retrieval.
//!
//! Every pipeline invocation writes one `sync_runs` row when it starts and
//! completes it when it finishes, successfully or not.

use rusqlite::{Connection, OptionalExtension, Result};
use serde::Serialize;

/// Lifecycle state of a recorded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            _ => Self::Running,
        }
    }
}

/// A recorded pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncRun {
    pub id: String,
    pub mode: String,
    /// Comma-separated kind names.
    pub kinds: String,
    pub status: RunStatus,
    pub dry_run: bool,
    pub inserted: i64,
    pub updated: i64,
    pub unchanged: i64,
    pub row_errors: i64,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub started_at: i64,
    pub finished_at: Option<i64>,
}

/// Totals written when a run completes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunTotals {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub row_errors: usize,
}

/// Record the start of a run.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_run(
    conn: &Connection,
    id: &str,
    mode: &str,
    kinds: &str,
    dry_run: bool,
    started_at: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO sync_runs (id, mode, kinds, status, dry_run, started_at)
         VALUES (?1, ?2, ?3, 'running', ?4, ?5)",
        rusqlite::params![id, mode, kinds, dry_run, started_at],
    )?;
    Ok(())
}

/// Mark a run as finished.
///
/// `failure` carries the error code and message of a failed run.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn finish_run(
    conn: &Connection,
    id: &str,
    totals: RunTotals,
    failure: Option<(&str, &str)>,
    finished_at: i64,
) -> Result<()> {
    let status = if failure.is_some() {
        RunStatus::Failed
    } else {
        RunStatus::Succeeded
    };
    conn.execute(
        "UPDATE sync_runs
         SET status = ?2, inserted = ?3, updated = ?4, unchanged = ?5, row_errors = ?6,
             error_code = ?7, error_message = ?8, finished_at = ?9
         WHERE id = ?1",
        rusqlite::params![
            id,
            status.as_str(),
            totals.inserted,
            totals.updated,
            totals.unchanged,
            totals.row_errors,
            failure.map(|(code, _)| code),
            failure.map(|(_, msg)| msg),
            finished_at,
        ],
    )?;
    Ok(())
}

const RUN_COLUMNS: &str = "id, mode, kinds, status, dry_run, inserted, updated, unchanged, row_errors,
     error_code, error_message, started_at, finished_at";

fn map_run(row: &rusqlite::Row<'_>) -> Result<SyncRun> {
    Ok(SyncRun {
        id: row.get(0)?,
        mode: row.get(1)?,
        kinds: row.get(2)?,
        status: RunStatus::parse(row.get::<_, String>(3)?.as_str()),
        dry_run: row.get(4)?,
        inserted: row.get(5)?,
        updated: row.get(6)?,
        unchanged: row.get(7)?,
        row_errors: row.get(8)?,
        error_code: row.get(9)?,
        error_message: row.get(10)?,
        started_at: row.get(11)?,
        finished_at: row.get(12)?,
    })
}

/// Most recent runs first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn recent_runs(conn: &Connection, limit: Option<u32>) -> Result<Vec<SyncRun>> {
    let limit = limit.unwrap_or(20);
    let mut stmt = conn.prepare(&format!(
        "SELECT {RUN_COLUMNS} FROM sync_runs ORDER BY started_at DESC, rowid DESC LIMIT ?1"
    ))?;
    let rows = stmt.query_map([limit], map_run)?;
    rows.collect()
}

/// Look up one run by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_run(conn: &Connection, id: &str) -> Result<Option<SyncRun>> {
    conn.query_row(
        &format!("SELECT {RUN_COLUMNS} FROM sync_runs WHERE id = ?1"),
        [id],
        map_run,
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::apply_schema;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_run_lifecycle() {
        let conn = conn();
        insert_run(&conn, "run-1", "full", "players,teams", false, 1000).unwrap();

        let run = get_run(&conn, "run-1").unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.finished_at.is_none());

        let totals = RunTotals {
            inserted: 3,
            updated: 1,
            unchanged: 7,
            row_errors: 0,
        };
        finish_run(&conn, "run-1", totals, None, 2000).unwrap();

        let run = get_run(&conn, "run-1").unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Succeeded);
        assert_eq!(run.inserted, 3);
        assert_eq!(run.unchanged, 7);
        assert_eq!(run.finished_at, Some(2000));
    }

    #[test]
    fn test_failed_run_keeps_error() {
        let conn = conn();
        insert_run(&conn, "run-2", "key_entities_only", "teams", true, 1000).unwrap();
        finish_run(
            &conn,
            "run-2",
            RunTotals::default(),
            Some(("FETCH_FAILED", "bootstrap-static returned 503")),
            1500,
        )
        .unwrap();

        let run = get_run(&conn, "run-2").unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.dry_run);
        assert_eq!(run.error_code.as_deref(), Some("FETCH_FAILED"));
    }

    #[test]
    fn test_recent_runs_newest_first() {
        let conn = conn();
        insert_run(&conn, "a", "full", "teams", false, 1).unwrap();
        insert_run(&conn, "b", "full", "teams", false, 2).unwrap();
        let runs = recent_runs(&conn, Some(10)).unwrap();
        assert_eq!(runs.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), ["b", "a"]);
        assert!(get_run(&conn, "missing").unwrap().is_none());
    }
}
