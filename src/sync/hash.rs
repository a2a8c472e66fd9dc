//! Content fingerprinting for change detection.
//!
//! A row's fingerprint is the SHA256 of its change-sensitive column values,
//! rendered canonically and joined in declared order. Comparing fingerprints
//! tells the upsert engine whether a row changed without comparing every
//! column.

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::model::TableRow;

/// Separator between canonical values (ASCII unit separator), so that
/// `("1", "23")` and `("12", "3")` hash differently.
const FIELD_SEPARATOR: char = '\u{1f}';

/// Compute the fingerprint of `row` over `change_columns`.
///
/// Values are canonicalized first (see [`crate::model::Value::canonical`]),
/// so `1` and `1.0` agree. Column order is part of the contract.
///
/// # Errors
///
/// Returns `MissingField` naming the first change column absent from the row.
///
/// # Example
///
/// ```ignore
/// let row = TableRow::new().with("player_id", 1).with("total_points", 10);
/// let hash = fingerprint(&row, &["total_points"])?;
/// // hash is 64 lowercase hex chars
/// ```
pub fn fingerprint<S: AsRef<str>>(row: &TableRow, change_columns: &[S]) -> Result<String> {
    let mut canonical = String::new();
    for (i, column) in change_columns.iter().enumerate() {
        let column = column.as_ref();
        let value = row.get(column).ok_or_else(|| Error::MissingField {
            column: column.to_string(),
        })?;
        if i > 0 {
            canonical.push(FIELD_SEPARATOR);
        }
        canonical.push_str(&value.canonical());
    }

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;

    fn player() -> TableRow {
        TableRow::new()
            .with("player_id", 1)
            .with("web_name", "Salah")
            .with("total_points", 10)
            .with("status", "a")
            .with("form", 5.2)
            .with("finished", true)
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let row = player();
        let cols = ["total_points", "status"];
        let hash1 = fingerprint(&row, &cols).unwrap();
        let hash2 = fingerprint(&row, &cols).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64); // SHA256 produces 64 hex chars
    }

    #[test]
    fn test_fingerprint_changes_with_each_change_column() {
        let cols = ["total_points", "status", "form", "finished"];
        let base = fingerprint(&player(), &cols).unwrap();

        let mutations: [(&str, Value); 4] = [
            ("total_points", Value::Integer(11)),
            ("status", Value::from("i")),
            ("form", Value::Real(5.3)),
            ("finished", Value::Bool(false)),
        ];
        for (column, value) in mutations {
            let mut row = player();
            row.set(column, value);
            assert_ne!(fingerprint(&row, &cols).unwrap(), base, "mutating {column}");
        }
    }

    #[test]
    fn test_fingerprint_ignores_other_columns() {
        let mut row = player();
        let before = fingerprint(&row, &["total_points"]).unwrap();
        row.set("web_name", "M. Salah");
        assert_eq!(fingerprint(&row, &["total_points"]).unwrap(), before);
    }

    #[test]
    fn test_fingerprint_integral_real_matches_integer() {
        let a = TableRow::new().with("k", 1).with("pts", 1);
        let b = TableRow::new().with("k", 1).with("pts", 1.0);
        assert_eq!(fingerprint(&a, &["pts"]).unwrap(), fingerprint(&b, &["pts"]).unwrap());
    }

    #[test]
    fn test_fingerprint_order_matters() {
        let row = TableRow::new().with("a", "x").with("b", "y");
        assert_ne!(
            fingerprint(&row, &["a", "b"]).unwrap(),
            fingerprint(&row, &["b", "a"]).unwrap()
        );
    }

    #[test]
    fn test_fingerprint_separator_prevents_merging() {
        let a = TableRow::new().with("x", "1").with("y", "23");
        let b = TableRow::new().with("x", "12").with("y", "3");
        assert_ne!(
            fingerprint(&a, &["x", "y"]).unwrap(),
            fingerprint(&b, &["x", "y"]).unwrap()
        );
    }

    #[test]
    fn test_fingerprint_missing_field() {
        let err = fingerprint(&player(), &["total_points", "bonus"]).unwrap_err();
        assert!(matches!(err, Error::MissingField { ref column } if column == "bonus"));
    }
}
