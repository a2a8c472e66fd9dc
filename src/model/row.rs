//! Flat tabular rows produced by the materializer.

use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue};
use serde::Serialize;

/// A decoded source record: field name to JSON value.
pub type EntityRecord = serde_json::Map<String, serde_json::Value>;

/// A scalar cell value.
///
/// There is no null variant: the materializer fills every declared column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
}

impl Value {
    /// Canonical text used for fingerprinting.
    ///
    /// Integral reals render like integers so that `1` and `1.0` agree.
    #[must_use]
    pub fn canonical(&self) -> String {
        match self {
            Self::Integer(i) => i.to_string(),
            Self::Real(r) => canonical_real(*r),
            Self::Text(s) => s.clone(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

/// Largest magnitude at which every integer is exactly representable in an f64.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

#[allow(clippy::cast_possible_truncation)]
fn canonical_real(r: f64) -> String {
    if r.is_finite() && r.fract() == 0.0 && r.abs() <= MAX_EXACT_INT {
        // -0.0 also lands here and renders as "0".
        (r as i64).to_string()
    } else {
        r.to_string()
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Self::Real(r) => ToSqlOutput::Owned(SqlValue::Real(*r)),
            Self::Text(s) => ToSqlOutput::Borrowed(rusqlite::types::ValueRef::Text(s.as_bytes())),
            Self::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
        })
    }
}

/// One flattened row: ordered `(column, value)` cells.
///
/// The first cell is the table's key column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableRow {
    cells: Vec<(String, Value)>,
}

impl TableRow {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: Vec::with_capacity(capacity),
        }
    }

    /// Append a cell. Column order is insertion order.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.cells.push((column.into(), value.into()));
    }

    /// Builder form of [`TableRow::push`].
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, value);
        self
    }

    /// Replace the value of an existing column, or append it.
    pub fn set(&mut self, column: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.cells.iter_mut().find(|(c, _)| c == column) {
            Some(cell) => cell.1 = value,
            None => self.cells.push((column.to_string(), value)),
        }
    }

    /// Drop a column if present.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let idx = self.cells.iter().position(|(c, _)| c == column)?;
        Some(self.cells.remove(idx).1)
    }

    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.cells.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    /// The key cell (first column).
    #[must_use]
    pub fn key(&self) -> Option<&Value> {
        self.cells.first().map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cells.iter().map(|(c, v)| (c.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_numbers() {
        assert_eq!(Value::Integer(1).canonical(), "1");
        assert_eq!(Value::Real(1.0).canonical(), "1");
        assert_eq!(Value::Real(-0.0).canonical(), "0");
        assert_eq!(Value::Real(5.2).canonical(), "5.2");
        assert_eq!(Value::Real(0.1).canonical(), "0.1");
        assert_eq!(Value::Bool(true).canonical(), "true");
    }

    #[test]
    fn test_row_key_is_first_cell() {
        let row = TableRow::new()
            .with("player_id", 7)
            .with("web_name", "Saka");
        assert_eq!(row.key(), Some(&Value::Integer(7)));
        assert_eq!(row.columns().collect::<Vec<_>>(), ["player_id", "web_name"]);
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut row = TableRow::new().with("a", 1).with("b", 2);
        row.set("a", 10);
        row.set("c", 3);
        assert_eq!(row.get("a"), Some(&Value::Integer(10)));
        assert_eq!(row.columns().collect::<Vec<_>>(), ["a", "b", "c"]);
        assert_eq!(row.remove("b"), Some(Value::Integer(2)));
        assert_eq!(row.len(), 2);
    }
}
