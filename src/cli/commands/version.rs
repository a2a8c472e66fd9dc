//! Version command implementation.

use crate::config::{load_settings, resolve_db_path};
use crate::error::Result;
use crate::source::DEFAULT_API_BASE;
use crate::storage::schema::CURRENT_SCHEMA_VERSION;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct VersionOutput {
    version: &'static str,
    build: &'static str,
    schema: i32,
    api_base: String,
    database: Option<PathBuf>,
}

/// Execute the version command.
///
/// Reports the API base and database this invocation would use. An
/// unreadable config falls back to the public API root.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(db_path: Option<&PathBuf>, json: bool) -> Result<()> {
    let build = if cfg!(debug_assertions) { "dev" } else { "release" };
    let output = VersionOutput {
        version: env!("CARGO_PKG_VERSION"),
        build,
        schema: CURRENT_SCHEMA_VERSION,
        api_base: load_settings()
            .map_or_else(|_| DEFAULT_API_BASE.to_string(), |s| s.api_base_url),
        database: resolve_db_path(db_path.map(PathBuf::as_path)),
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!(
        "fplsync {} ({}, schema v{})",
        output.version, output.build, output.schema
    );
    println!("  API:      {}", output.api_base);
    match &output.database {
        Some(path) => println!("  Database: {}", path.display()),
        None => println!("  Database: (no home directory)"),
    }
    Ok(())
}
