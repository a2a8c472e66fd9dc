//! Record materialization: decoded API records to flat table rows.
//!
//! Each kind has a fixed allowlist of source fields (see
//! [`crate::model::catalog`]). Selected fields are renamed, coerced to their
//! declared type and defaulted when absent, so every row of a kind carries
//! exactly the same columns in the same order.
//!
//! Reference kinds yield one row per record. Fact kinds take a player detail
//! record and yield one row per element of the named sub-collection.

use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use tracing::trace;

use crate::error::{Error, Result};
use crate::model::catalog;
use crate::model::{ColumnDef, ColumnSource, ColumnType, EntityKind, EntityRecord, TableRow, Value};

/// Output format for normalized timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %I:%M %p";

/// Materialize one record of `kind` into table rows.
///
/// For reference kinds the result has exactly one row. For fact kinds
/// `record` is a player detail record and the result has one row per
/// element of its sub-collection (possibly none).
///
/// # Errors
///
/// Returns `MalformedRecord` if the key field (or the parent `id` for fact
/// kinds) is absent or null, or if a selected value cannot be coerced to
/// its declared type.
pub fn materialize(record: &EntityRecord, kind: EntityKind) -> Result<Vec<TableRow>> {
    materialize_with(record, kind, &catalog::columns(kind))
}

/// Materialize a record whose kind is given by name.
///
/// # Errors
///
/// Returns `UnknownKind` for an unrecognized name, otherwise as
/// [`materialize`].
pub fn materialize_named(record: &EntityRecord, kind: &str) -> Result<Vec<TableRow>> {
    materialize(record, kind.parse()?)
}

/// Materialize every record of a collection, concatenating rows in input order.
///
/// # Errors
///
/// Fails on the first record that fails to materialize.
pub fn materialize_collection(records: &[EntityRecord], kind: EntityKind) -> Result<Vec<TableRow>> {
    let columns = catalog::columns(kind);
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        rows.extend(materialize_with(record, kind, &columns)?);
    }
    trace!(kind = %kind, records = records.len(), rows = rows.len(), "Materialized collection");
    Ok(rows)
}

/// Materialize against an explicit column list.
///
/// The first column is the key column and must resolve to a present value.
///
/// # Errors
///
/// As [`materialize`].
pub fn materialize_with(
    record: &EntityRecord,
    kind: EntityKind,
    columns: &[ColumnDef],
) -> Result<Vec<TableRow>> {
    if !kind.is_fact() {
        return Ok(vec![build_row(record, None, kind, columns)?]);
    }

    let parent_id = match record.get("id") {
        None | Some(Json::Null) => {
            return Err(Error::malformed(kind.as_str(), "id", "is missing from the detail record"));
        }
        Some(v) => coerce_integer(v).ok_or_else(|| {
            Error::malformed(kind.as_str(), "id", format!("is not an integer: {v}"))
        })?,
    };

    let elements = match record.get(kind.source_key()) {
        None | Some(Json::Null) => return Ok(Vec::new()),
        Some(Json::Array(items)) => items,
        Some(other) => {
            return Err(Error::malformed(
                kind.as_str(),
                kind.source_key(),
                format!("is not a list: {other}"),
            ));
        }
    };

    elements
        .iter()
        .map(|element| match element {
            Json::Object(fields) => build_row(fields, Some(parent_id), kind, columns),
            other => Err(Error::malformed(
                kind.as_str(),
                kind.source_key(),
                format!("contains a non-object element: {other}"),
            )),
        })
        .collect()
}

fn build_row(
    fields: &EntityRecord,
    parent_id: Option<i64>,
    kind: EntityKind,
    columns: &[ColumnDef],
) -> Result<TableRow> {
    let mut row = TableRow::with_capacity(columns.len());

    for (i, col) in columns.iter().enumerate() {
        let value = match col.source {
            ColumnSource::ParentId => match parent_id {
                Some(id) => Value::Integer(id),
                None => {
                    return Err(Error::malformed(kind.as_str(), "id", "has no parent record"));
                }
            },
            ColumnSource::Field(name) => {
                let raw = fields.get(name).filter(|v| !v.is_null());
                if i == 0 && raw.is_none() {
                    return Err(Error::malformed(kind.as_str(), name, "is missing"));
                }
                match raw {
                    Some(v) => coerce(v, col.ty).map_err(|reason| {
                        Error::malformed(kind.as_str(), name, reason)
                    })?,
                    None => default_for(col.ty),
                }
            }
        };
        row.push(col.target, value);
    }

    if kind == EntityKind::HistoryPast {
        if let Some(Value::Text(season)) = row.get("season_name") {
            let season = season.replace('/', "-");
            row.set("season_name", season);
        }
    }

    Ok(row)
}

/// Fill value for an absent or null field.
#[must_use]
pub fn default_for(ty: ColumnType) -> Value {
    match ty {
        ColumnType::Integer => Value::Integer(0),
        ColumnType::Real => Value::Real(0.0),
        ColumnType::Bool => Value::Bool(false),
        ColumnType::Text | ColumnType::Timestamp | ColumnType::Json => Value::Text(String::new()),
    }
}

/// Coerce a present, non-null JSON value to `ty`. The error is a reason
/// phrase for `MalformedRecord`.
fn coerce(value: &Json, ty: ColumnType) -> std::result::Result<Value, String> {
    match ty {
        ColumnType::Integer => coerce_integer(value)
            .map(Value::Integer)
            .ok_or_else(|| format!("is not an integer: {value}")),
        ColumnType::Real => coerce_real(value)
            .map(Value::Real)
            .ok_or_else(|| format!("is not a number: {value}")),
        ColumnType::Bool => coerce_bool(value)
            .map(Value::Bool)
            .ok_or_else(|| format!("is not a boolean: {value}")),
        ColumnType::Text => match value {
            Json::String(s) => Ok(Value::Text(s.clone())),
            Json::Number(n) => Ok(Value::Text(n.to_string())),
            Json::Bool(b) => Ok(Value::Text(b.to_string())),
            _ => Err(format!("is not a scalar: {value}")),
        },
        ColumnType::Timestamp => match value {
            Json::String(s) if s.is_empty() => Ok(Value::Text(String::new())),
            Json::String(s) => normalize_timestamp(s).map(Value::Text),
            _ => Err(format!("is not a timestamp: {value}")),
        },
        ColumnType::Json => Ok(Value::Text(flatten_json(value))),
    }
}

fn coerce_integer(value: &Json) -> Option<i64> {
    match value {
        Json::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Json::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        Json::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() < 9.0e15).then_some(f as i64)
}

fn coerce_real(value: &Json) -> Option<f64> {
    match value {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn coerce_bool(value: &Json) -> Option<bool> {
    match value {
        Json::Bool(b) => Some(*b),
        Json::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Json::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Compact JSON text for list/object columns; empty containers become "".
fn flatten_json(value: &Json) -> String {
    match value {
        Json::Null => String::new(),
        Json::Array(a) if a.is_empty() => String::new(),
        Json::Object(o) if o.is_empty() => String::new(),
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse an RFC 3339 timestamp and render it as `YYYY-MM-DD hh:mm AM/PM` UTC.
///
/// # Errors
///
/// Returns a reason phrase if the text is not RFC 3339.
pub fn normalize_timestamp(text: &str) -> std::result::Result<String, String> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|dt| dt.with_timezone(&Utc).format(TIMESTAMP_FORMAT).to_string())
        .map_err(|e| format!("is not an RFC 3339 timestamp ({e}): {text}"))
}
