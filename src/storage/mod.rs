//! SQLite storage layer for fplsync.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode for concurrent reads
//! - IMMEDIATE transactions for table writes
//! - DDL generated from declared table specs (STRICT tables)
//! - A run ledger recording every pipeline invocation
//!
//! # Submodules
//!
//! - [`runs`] - Run ledger storage
//! - [`schema`] - Bookkeeping schema, table DDL and verification
//! - [`sqlite`] - Main SQLite storage implementation

pub mod runs;
pub mod schema;
pub mod sqlite;

pub use runs::{RunStatus, RunTotals, SyncRun};
pub use schema::{verify_table, CreateMode};
pub use sqlite::{SqliteStorage, TableInfo};

use crate::error::Result;

/// Read-only view of what tables and columns exist.
///
/// The upsert engine checks the target table through this before writing.
pub trait SchemaCatalog {
    /// Whether a table named `name` exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be queried.
    fn table_exists(&self, name: &str) -> Result<bool>;

    /// Column names of `name` in declared order; empty if the table is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog cannot be queried.
    fn columns(&self, name: &str) -> Result<Vec<String>>;
}
