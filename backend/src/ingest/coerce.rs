//! Raw cell text to typed values.
//!
//! Coercion never fails. Anything that does not fit the column type becomes
//! `SqlValue::Null`.

use crate::ingest::parse::Record;
use common::model::column::{ColumnType, ColumnTypeMap};
use indexmap::IndexMap;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static LEADING_INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+").expect("static regex"));
static LEADING_FLOAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?").expect("static regex")
});

/// A cell ready to be written. Serializes to the plain JSON scalar.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
}

/// One row ready to be written, column name to value.
pub type CoercedRecord = IndexMap<String, SqlValue>;

fn leading_integer(value: &str) -> Option<i64> {
    LEADING_INTEGER
        .find(value.trim_start())
        .and_then(|m| m.as_str().parse().ok())
}

fn leading_float(value: &str) -> Option<f64> {
    LEADING_FLOAT
        .find(value.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
}

fn boolean(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Some(true),
        "false" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Converts one raw cell. `None` and `""` are NULL for every type.
pub fn coerce_value(raw: Option<&str>, column_type: ColumnType) -> SqlValue {
    let raw = match raw {
        Some(value) if !value.is_empty() => value,
        _ => return SqlValue::Null,
    };
    let value = match column_type {
        ColumnType::Integer => leading_integer(raw).map(SqlValue::Integer),
        ColumnType::Decimal => leading_float(raw).map(SqlValue::Decimal),
        ColumnType::Boolean => boolean(raw).map(SqlValue::Boolean),
        ColumnType::Text => Some(SqlValue::Text(raw.to_string())),
    };
    value.unwrap_or(SqlValue::Null)
}

/// Converts every field of a record. Columns missing from `types` are kept as text.
pub fn coerce_record(record: &Record, types: &ColumnTypeMap) -> CoercedRecord {
    record
        .iter()
        .map(|(column, raw)| {
            let column_type = types.get(column).copied().unwrap_or(ColumnType::Text);
            (column.clone(), coerce_value(Some(raw), column_type))
        })
        .collect()
}
