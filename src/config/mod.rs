//! Configuration management.
//!
//! This module resolves where fplsync keeps its files and loads settings.
//!
//! # Layout
//!
//! - **Database**: `~/.fplsync/data/fplsync.db` unless overridden
//! - **Settings**: `~/.fplsync/config.json` (optional, defaults apply)

mod settings;

pub use settings::{config_path, load_settings, load_settings_from, save_settings, Settings};

use std::path::{Path, PathBuf};

/// Environment variable naming an explicit database file.
pub const DB_ENV: &str = "FPL_DB";

/// Environment variable enabling the isolated test database.
pub const TEST_DB_ENV: &str = "FPL_TEST_DB";

/// Get the global fplsync directory location (`~/.fplsync/`).
#[must_use]
pub fn global_fplsync_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".fplsync"))
}

/// Check if test mode is enabled.
///
/// Test mode is enabled by setting `FPL_TEST_DB=1` (or any non-empty value).
/// This redirects all database operations to an isolated test database.
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var(TEST_DB_ENV)
        .map(|v| !v.is_empty() && v != "0" && v.to_lowercase() != "false")
        .unwrap_or(false)
}

/// Get the test database path: `~/.fplsync/test/fplsync.db`.
#[must_use]
pub fn test_db_path() -> Option<PathBuf> {
    global_fplsync_dir().map(|dir| dir.join("test").join("fplsync.db"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `FPL_DB` environment variable
/// 3. `FPL_TEST_DB` environment variable → uses test database
/// 4. Global location: `~/.fplsync/data/fplsync.db`
///
/// # Returns
///
/// Returns the path to the database file, or `None` if no location found.
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(db_path) = std::env::var(DB_ENV) {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    if is_test_mode() {
        return test_db_path();
    }

    global_fplsync_dir().map(|dir| dir.join("data").join("fplsync.db"))
}
