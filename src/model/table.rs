//! Table layouts: the declared shape of every synchronized table.
//!
//! Each table carries an explicit key column rather than relying on column
//! position, plus the change-sensitive columns that feed its fingerprint.

use serde::Serialize;

use super::catalog;
use super::kind::EntityKind;
use crate::error::{Error, Result};

/// Stored fingerprint column on reconciled tables.
pub const ROW_HASH_COLUMN: &str = "row_hash";

/// Write counter on reconciled tables: 1 on insert, +1 per applied update.
pub const ROW_VERSION_COLUMN: &str = "row_version";

/// Declared column type. Drives coercion and DDL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    Real,
    Text,
    Bool,
    /// RFC 3339 in the source, `YYYY-MM-DD hh:mm AM/PM` in the table.
    Timestamp,
    /// Lists or objects flattened to compact JSON text.
    Json,
}

impl ColumnType {
    /// STRICT-table storage type.
    #[must_use]
    pub const fn sql_type(&self) -> &'static str {
        match self {
            Self::Integer | Self::Bool => "INTEGER",
            Self::Real => "REAL",
            Self::Text | Self::Timestamp | Self::Json => "TEXT",
        }
    }
}

/// Where a column's value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnSource {
    /// A field on the record (or sub-collection element) itself.
    Field(&'static str),
    /// The `id` of the parent detail record.
    ParentId,
}

/// One selected, renamed, typed column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    pub source: ColumnSource,
    pub target: &'static str,
    pub ty: ColumnType,
}

impl ColumnDef {
    /// Column read from `source` and stored as `target`.
    #[must_use]
    pub const fn renamed(source: &'static str, target: &'static str, ty: ColumnType) -> Self {
        Self {
            source: ColumnSource::Field(source),
            target,
            ty,
        }
    }

    /// Column stored under its source name.
    #[must_use]
    pub const fn same(name: &'static str, ty: ColumnType) -> Self {
        Self::renamed(name, name, ty)
    }

    /// Column filled from the parent record's `id`.
    #[must_use]
    pub const fn parent(target: &'static str) -> Self {
        Self {
            source: ColumnSource::ParentId,
            target,
            ty: ColumnType::Integer,
        }
    }
}

/// Declared layout of one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSpec {
    pub kind: EntityKind,
    pub name: String,
    pub key_column: String,
    pub columns: Vec<ColumnDef>,
    pub change_columns: Vec<String>,
    pub append_only: bool,
}

impl TableSpec {
    /// The built-in spec for `kind`.
    #[must_use]
    pub fn for_kind(kind: EntityKind) -> Self {
        let columns = catalog::columns(kind);
        let key_column = columns.first().map(|c| c.target).unwrap_or_default();
        Self {
            kind,
            name: kind.as_str().to_string(),
            key_column: key_column.to_string(),
            change_columns: catalog::change_columns(kind)
                .iter()
                .map(|c| (*c).to_string())
                .collect(),
            append_only: kind.is_fact(),
            columns,
        }
    }

    /// Built-in specs for every kind, in processing order.
    #[must_use]
    pub fn all() -> Vec<Self> {
        EntityKind::ALL.into_iter().map(Self::for_kind).collect()
    }

    /// Replace the change-sensitive columns.
    #[must_use]
    pub fn with_change_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.change_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Target column names in declared order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.target)
    }

    /// Every column the table must physically have, bookkeeping included.
    #[must_use]
    pub fn persisted_columns(&self) -> Vec<&str> {
        let mut cols: Vec<&str> = self.column_names().collect();
        if !self.append_only {
            cols.push(ROW_HASH_COLUMN);
            cols.push(ROW_VERSION_COLUMN);
        }
        cols
    }

    #[must_use]
    pub fn column(&self, target: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.target == target)
    }

    /// Check the invariants the upsert engine relies on.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a bad identifier, a key column that is
    /// not first, duplicate targets, or a change column that is not declared.
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.name)?;
        for col in &self.columns {
            validate_identifier(col.target)?;
        }

        if self.columns.first().map(|c| c.target) != Some(self.key_column.as_str()) {
            return Err(Error::InvalidArgument(format!(
                "table {}: key column '{}' must be the first declared column",
                self.name, self.key_column
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for name in self.column_names() {
            if !seen.insert(name) || name == ROW_HASH_COLUMN || name == ROW_VERSION_COLUMN {
                return Err(Error::InvalidArgument(format!(
                    "table {}: column '{name}' is declared twice or reserved",
                    self.name
                )));
            }
        }

        if let Some(bad) = self
            .change_columns
            .iter()
            .find(|c| self.column(c).is_none())
        {
            return Err(Error::InvalidArgument(format!(
                "table {}: change column '{bad}' is not a declared column",
                self.name
            )));
        }

        Ok(())
    }
}

/// Accept `[A-Za-z_][A-Za-z0-9_]*` only. Table and column names are spliced
/// into SQL text, so nothing else gets through.
///
/// # Errors
///
/// Returns `InvalidArgument` if the name does not match.
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if head_ok && chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!("invalid identifier: '{name}'")))
    }
}

/// Double-quote an identifier that already passed [`validate_identifier`].
#[must_use]
pub fn quote_identifier(name: &str) -> String {
    format!("\"{name}\"")
}
