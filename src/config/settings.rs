//! Settings file handling.
//!
//! Loads and saves `~/.fplsync/config.json`. Every field is optional in the
//! file; missing fields take their defaults.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{EntityKind, TableSpec};
use crate::source::DEFAULT_API_BASE;

/// Environment variable overriding the API base URL.
pub const API_BASE_ENV: &str = "FPL_API_BASE";

/// Runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root of the FPL web API, e.g. `https://fantasy.premierleague.com/api/`.
    pub api_base_url: String,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
    /// Maximum player detail requests in flight.
    pub detail_concurrency: usize,
    /// Change-sensitive column overrides, keyed by kind name.
    pub change_columns: BTreeMap<String, Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE.to_string(),
            request_timeout_secs: 30,
            detail_concurrency: 4,
            change_columns: BTreeMap::new(),
        }
    }
}

impl Settings {
    /// Apply environment overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(base) = std::env::var(API_BASE_ENV) {
            if !base.trim().is_empty() {
                self.api_base_url = base;
            }
        }
        self
    }

    /// Table specs for every kind with change-column overrides applied.
    ///
    /// # Errors
    ///
    /// Returns `Config` if an override names an unknown kind, targets an
    /// append-only kind, or lists an undeclared column.
    pub fn table_specs(&self) -> Result<Vec<TableSpec>> {
        let mut specs = TableSpec::all();
        for (name, columns) in &self.change_columns {
            let kind: EntityKind = name
                .parse()
                .map_err(|_| Error::Config(format!("change_columns: unknown kind '{name}'")))?;
            let spec = specs
                .iter_mut()
                .find(|s| s.kind == kind)
                .ok_or_else(|| Error::Config(format!("change_columns: no table for '{name}'")))?;
            if spec.append_only {
                return Err(Error::Config(format!(
                    "change_columns: '{name}' is reloaded wholesale and has no change columns"
                )));
            }
            if columns.is_empty() {
                return Err(Error::Config(format!(
                    "change_columns: '{name}' needs at least one column"
                )));
            }
            *spec = spec.clone().with_change_columns(columns.iter().cloned());
            spec.validate()
                .map_err(|e| Error::Config(format!("change_columns: {e}")))?;
        }
        Ok(specs)
    }
}

/// Get the config file path.
///
/// # Errors
///
/// Returns `Config` if the home directory cannot be determined.
pub fn config_path() -> Result<PathBuf> {
    super::global_fplsync_dir()
        .map(|dir| dir.join("config.json"))
        .ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Load settings from the global config file plus environment overrides.
///
/// # Errors
///
/// Returns `Config` if the file exists but cannot be read or parsed.
pub fn load_settings() -> Result<Settings> {
    let path = config_path()?;
    Ok(load_settings_from(&path)?.with_env_overrides())
}

/// Load settings from `path`; defaults if the file does not exist.
///
/// # Errors
///
/// Returns `Config` if the file cannot be read or parsed.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        debug!(path = %path.display(), "No config file, using defaults");
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
}

/// Write settings to `path`, creating parent directories.
///
/// # Errors
///
/// Returns `Config` if the directory or file cannot be written.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
    }

    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

    fs::write(path, content)
        .map_err(|e| Error::Config(format!("Failed to write config file: {e}")))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.detail_concurrency, 4);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"detail_concurrency": 8}"#).unwrap();

        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.detail_concurrency, 8);
        assert_eq!(settings.api_base_url, DEFAULT_API_BASE);
    }

    #[test]
    fn test_bad_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_settings_from(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut settings = Settings::default();
        settings.request_timeout_secs = 5;
        save_settings(&path, &settings).unwrap();
        assert_eq!(load_settings_from(&path).unwrap(), settings);
    }

    #[test]
    fn test_change_column_override() {
        let mut settings = Settings::default();
        settings
            .change_columns
            .insert("players".into(), vec!["total_points".into(), "form".into()]);
        let specs = settings.table_specs().unwrap();
        let players = specs.iter().find(|s| s.kind == EntityKind::Players).unwrap();
        assert_eq!(players.change_columns, ["total_points", "form"]);
    }

    #[test]
    fn test_change_column_override_rejections() {
        for (kind, cols) in [
            ("managers", vec!["x".to_string()]),
            ("history", vec!["total_points".to_string()]),
            ("players", vec!["nickname".to_string()]),
            ("teams", vec![]),
        ] {
            let mut settings = Settings::default();
            settings.change_columns.insert(kind.into(), cols);
            assert!(matches!(settings.table_specs(), Err(Error::Config(_))), "{kind}");
        }
    }
}
