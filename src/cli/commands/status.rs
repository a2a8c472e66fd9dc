//! Status command implementation.

use chrono::{DateTime, Local, Utc};
use colored::Colorize;

use crate::config::{load_settings, resolve_db_path};
use crate::error::{Error, Result};
use crate::storage::{RunStatus, SqliteStorage, SyncRun, TableInfo};
use serde::Serialize;
use std::path::PathBuf;

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    database: PathBuf,
    tables: Vec<TableInfo>,
    recent_runs: Vec<SyncRun>,
}

/// Execute status command.
///
/// # Errors
///
/// Returns `NotInitialized` if the database does not exist.
pub fn execute(db_path: Option<&PathBuf>, limit: u32, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path)).ok_or(Error::NotInitialized)?;

    if !db_path.exists() {
        return Err(Error::NotInitialized);
    }

    let specs = load_settings()?.table_specs()?;
    let storage = SqliteStorage::open(&db_path)?;
    let tables = storage.table_info(&specs)?;
    let recent_runs = storage.recent_runs(Some(limit))?;

    if json {
        let output = StatusOutput {
            database: db_path,
            tables,
            recent_runs,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{} {}", "Database:".bold(), db_path.display());
    println!();
    println!("  {:<14} {:>8}  {:<10} {}", "table", "rows", "key", "loading");
    for t in &tables {
        let loading = if t.append_only { "replace" } else { "upsert" };
        if t.exists {
            println!("  {:<14} {:>8}  {:<10} {loading}", t.name, t.rows, t.key_column);
        } else {
            println!("  {:<14} {:>8}  {:<10} {loading}", t.name, "missing".red(), t.key_column);
        }
    }

    println!();
    if recent_runs.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }
    println!("{}", "Recent runs:".bold());
    for run in &recent_runs {
        print_run(run);
    }

    Ok(())
}

fn print_run(run: &SyncRun) {
    let status = match run.status {
        RunStatus::Succeeded => run.status.as_str().green(),
        RunStatus::Failed => run.status.as_str().red(),
        RunStatus::Running => run.status.as_str().yellow(),
    };
    let dry = if run.dry_run { " (dry run)" } else { "" };
    println!(
        "  {} {} {:<9} {}{dry}",
        format_timestamp(run.started_at),
        &run.id[..8.min(run.id.len())],
        status,
        run.mode
    );
    println!(
        "      {} inserted, {} updated, {} unchanged, {} row errors",
        run.inserted, run.updated, run.unchanged, run.row_errors
    );
    if let Some(message) = &run.error_message {
        println!("      {}", message.red());
    }
}

fn format_timestamp(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis).map_or_else(
        || millis.to_string(),
        |dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
    )
}
