//! Initialize the fplsync database.
//!
//! Creates the database file (and its directory), applies the bookkeeping
//! schema and creates every synchronized table from its declared layout.
//! A default `~/.fplsync/config.json` is written if none exists.

use crate::config::{config_path, load_settings, resolve_db_path, save_settings, Settings};
use crate::error::{Error, Result};
use crate::storage::{CreateMode, SchemaCatalog, SqliteStorage};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    tables_created: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    config_written: Option<PathBuf>,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns `AlreadyInitialized` if every table already exists and `force`
/// is not set, or an error if the database or config cannot be written.
pub fn execute(db_path: Option<&PathBuf>, force: bool, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path))
        .ok_or_else(|| Error::Config("Could not determine database location".to_string()))?;

    let settings = load_settings()?;
    let specs = settings.table_specs()?;

    let existed = db_path.exists();
    let mut storage = SqliteStorage::open(&db_path)?;

    if existed && !force {
        let mut complete = true;
        for spec in &specs {
            complete &= storage.table_exists(&spec.name)?;
        }
        if complete {
            return Err(Error::AlreadyInitialized { path: db_path });
        }
    }

    let mode = if force { CreateMode::Force } else { CreateMode::Auto };
    let tables_created = storage.provision(&specs, mode)?;

    let config_written = match config_path() {
        Ok(path) if !path.exists() => {
            save_settings(&path, &Settings::default())?;
            Some(path)
        }
        _ => None,
    };

    if json {
        let output = InitOutput {
            database: db_path,
            tables_created,
            config_written,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("Initialized fplsync database");
        println!("  Database: {}", db_path.display());
        if tables_created.is_empty() {
            println!("  Tables:   all present");
        } else {
            println!("  Tables:   {}", tables_created.join(", "));
        }
        if let Some(path) = config_written {
            println!("  Config:   {}", path.display());
        }
        println!();
        println!("Next: Run 'fplsync run' to fetch and synchronize.");
    }

    Ok(())
}
