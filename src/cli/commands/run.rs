//! Run command: fetch from the FPL API and synchronize tables.

use colored::Colorize;

use crate::cli::RunArgs;
use crate::config::{load_settings, resolve_db_path};
use crate::error::{Error, Result};
use crate::model::EntityKind;
use crate::source::HttpSource;
use crate::storage::{CreateMode, SqliteStorage};
use crate::sync::{PipelineReport, RunOptions, SyncPipeline};
use std::path::PathBuf;

/// Row errors printed per table before truncating.
const MAX_ERRORS_SHOWN: usize = 10;

/// Execute the run command.
///
/// # Errors
///
/// Returns an error if arguments are invalid, the database cannot be
/// opened, or the pipeline fails.
pub fn execute(args: &RunArgs, db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let kinds = args
        .kinds
        .iter()
        .map(|k| k.parse::<EntityKind>())
        .collect::<Result<Vec<_>>>()?;
    let create_mode = CreateMode::from(args.create_mode);

    let db_path = resolve_db_path(db_path.map(PathBuf::as_path)).ok_or(Error::NotInitialized)?;
    if create_mode == CreateMode::Skip && !db_path.exists() {
        return Err(Error::NotInitialized);
    }

    let settings = load_settings()?;
    let specs = settings.table_specs()?;
    let mut storage = SqliteStorage::open(&db_path)?;
    let source = HttpSource::new(&settings)?;

    let options = RunOptions {
        all_or_nothing: args.atomic,
        strict: args.strict,
        dry_run: args.dry_run,
        create_mode,
    };
    let report = SyncPipeline::new(source, &mut storage, options)
        .with_specs(specs)
        .run(&kinds, args.mode.into())?;

    if json {
        println!("{}", serde_json::to_string(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &PipelineReport) {
    let header = format!("Run {} ({})", report.run_id, report.mode.as_str());
    if report.dry_run {
        println!("{} {}", header.bold(), "[dry run, rolled back]".yellow());
    } else {
        println!("{}", header.bold());
    }
    println!();
    println!(
        "  {:<14} {:>9} {:>8} {:>10} {:>7} {:>7}",
        "table", "inserted", "updated", "unchanged", "dupes", "errors"
    );

    for t in &report.tables {
        let errors = t.errors.len().to_string();
        let errors = if t.errors.is_empty() {
            errors.normal()
        } else {
            errors.red()
        };
        println!(
            "  {:<14} {:>9} {:>8} {:>10} {:>7} {:>7}",
            t.table, t.inserted, t.updated, t.unchanged, t.duplicates, errors
        );
    }

    for t in report.tables.iter().filter(|t| !t.is_clean()) {
        println!();
        println!("{}", format!("Row errors in {}:", t.table).yellow());
        for e in t.errors.iter().take(MAX_ERRORS_SHOWN) {
            println!("  key {}: {}", e.key, e.cause);
        }
        if t.errors.len() > MAX_ERRORS_SHOWN {
            println!("  ... and {} more", t.errors.len() - MAX_ERRORS_SHOWN);
        }
    }

    if report.players_skipped > 0 {
        println!();
        println!(
            "{}",
            format!("{} players had no detail record", report.players_skipped).yellow()
        );
    }

    let totals = report.totals();
    println!();
    let summary = format!(
        "{} inserted, {} updated, {} unchanged",
        totals.inserted, totals.updated, totals.unchanged
    );
    if report.is_clean() {
        println!("{}", summary.green());
    } else {
        println!("{} ({} row errors)", summary.yellow(), totals.row_errors);
    }
}
