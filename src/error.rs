//! Error types for fplsync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 4=data shape, 6=fetch, etc.)
//! - Retryability flags for workflow-level retry wrappers
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers
//!
//! Per-row write failures are not errors at this level: the upsert engine
//! records them as [`crate::sync::RowError`] values inside its report.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for fplsync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    AlreadyInitialized,
    DatabaseError,
    TransactionFailed,
    TableMissing,
    SchemaMismatch,
    RowErrors,

    // Data shape (exit 4)
    MissingField,
    UnknownKind,
    MalformedRecord,
    InvalidArgument,

    // Fetch (exit 6)
    FetchFailed,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::TransactionFailed => "TRANSACTION_FAILED",
            Self::TableMissing => "TABLE_MISSING",
            Self::SchemaMismatch => "SCHEMA_MISMATCH",
            Self::RowErrors => "ROW_ERRORS",
            Self::MissingField => "MISSING_FIELD",
            Self::UnknownKind => "UNKNOWN_KIND",
            Self::MalformedRecord => "MALFORMED_RECORD",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::FetchFailed => "FETCH_FAILED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized
            | Self::AlreadyInitialized
            | Self::DatabaseError
            | Self::TransactionFailed
            | Self::TableMissing
            | Self::SchemaMismatch
            | Self::RowErrors => 2,
            Self::MissingField
            | Self::UnknownKind
            | Self::MalformedRecord
            | Self::InvalidArgument => 4,
            Self::FetchFailed => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether a workflow-level wrapper should retry the whole run.
    ///
    /// True for transient stage failures (fetch, transaction, database
    /// busy). Data-shape errors are never retryable: the same payload
    /// would fail the same way.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::FetchFailed | Self::TransactionFailed | Self::DatabaseError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in fplsync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Not initialized: run `fplsync init` first")]
    NotInitialized,

    #[error("Already initialized at {path}")]
    AlreadyInitialized { path: PathBuf },

    #[error("Missing field: {column}")]
    MissingField { column: String },

    #[error("Unknown entity kind: {0}")]
    UnknownKind(String),

    #[error("Malformed {kind} record: field '{field}' {reason}")]
    MalformedRecord {
        kind: String,
        field: String,
        reason: String,
    },

    #[error("Fetch failed for {what}: {message}")]
    Fetch { what: String, message: String },

    #[error("Transaction failed on table {table}: {source}")]
    Transaction {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Table not found: {table}")]
    TableMissing { table: String },

    #[error("Table {table} is missing columns: {}", missing.join(", "))]
    SchemaMismatch { table: String, missing: Vec<String> },

    #[error("Table {table} recorded {count} row errors")]
    RowErrors { table: String, count: usize },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a malformed-record error.
    pub fn malformed(kind: impl Into<String>, field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            kind: kind.into(),
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized => ErrorCode::NotInitialized,
            Self::AlreadyInitialized { .. } => ErrorCode::AlreadyInitialized,
            Self::MissingField { .. } => ErrorCode::MissingField,
            Self::UnknownKind(_) => ErrorCode::UnknownKind,
            Self::MalformedRecord { .. } => ErrorCode::MalformedRecord,
            Self::Fetch { .. } | Self::Http(_) => ErrorCode::FetchFailed,
            Self::Transaction { .. } => ErrorCode::TransactionFailed,
            Self::TableMissing { .. } => ErrorCode::TableMissing,
            Self::SchemaMismatch { .. } => ErrorCode::SchemaMismatch,
            Self::RowErrors { .. } => ErrorCode::RowErrors,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized => {
                Some("Run `fplsync init` to create the database and tables".to_string())
            }

            Self::AlreadyInitialized { path } => Some(format!(
                "Database already exists at {}. Use `--force` to reinitialize.",
                path.display()
            )),

            Self::UnknownKind(_) => Some(
                "Valid kinds: players, teams, positions, gameweeks, fixtures, history, history_past"
                    .to_string(),
            ),

            Self::TableMissing { table } => Some(format!(
                "Table '{table}' does not exist. Run with `--create auto` or `fplsync init`."
            )),

            Self::SchemaMismatch { table, .. } => Some(format!(
                "Table '{table}' predates the current column layout. Recreate it with `--create force`."
            )),

            Self::RowErrors { .. } => Some(
                "The table was rolled back. Re-run without `--strict` to keep the good rows."
                    .to_string(),
            ),

            Self::Fetch { .. } | Self::Http(_) => Some(
                "The FPL API may be rate limiting or down. Retry the run later.".to_string(),
            ),

            Self::MissingField { .. }
            | Self::MalformedRecord { .. }
            | Self::Transaction { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
