//! Data models for fplsync.
//!
//! This module contains the domain models shared by every stage:
//! - EntityKind / RunMode
//! - EntityRecord (decoded source payload)
//! - Value / TableRow (flattened output)
//! - TableSpec / ColumnDef (declared table layout)

pub mod catalog;
pub mod kind;
pub mod row;
pub mod table;

pub use kind::{EntityKind, RunMode};
pub use row::{EntityRecord, TableRow, Value};
pub use table::{
    quote_identifier, validate_identifier, ColumnDef, ColumnSource, ColumnType, TableSpec,
    ROW_HASH_COLUMN, ROW_VERSION_COLUMN,
};
