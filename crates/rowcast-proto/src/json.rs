//! Canonical JSON rendering of change records.
//!
//! The document pushed to subscribers has this shape:
//!
//! ```text
//! { "table": "T", "operations": ["INSERT", "DELETE"], "time": 1700000000000,
//!   "rows": { "rows": [ { "attributes": { "name": "Alice", "age": "30" },
//!                         "rowId": "(0,1)", "operations": ["INSERT"] } ] } }
//! ```
//!
//! The row-key pseudo-column is never part of `attributes`, and `NULL`
//! values are rendered as `null`.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde_json::{json, Map, Value};

use crate::error::Error;
use crate::operation::ChangeOperation;
use crate::record::ChangeRecord;
use crate::row::{ChangedRowSet, ROW_KEY_COLUMN};

/// How string values are escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Escaping {
    /// `"` becomes `''` and tabs become spaces before JSON encoding.
    ///
    /// Lossy, kept for subscribers that expect the historical format.
    #[default]
    Legacy,
    /// Plain JSON string escaping.
    Standard,
}

impl Escaping {
    fn apply(&self, value: &str) -> String {
        match self {
            Escaping::Legacy => value.replace('"', "''").replace('\t', " "),
            Escaping::Standard => value.to_string(),
        }
    }
}

impl fmt::Display for Escaping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Escaping::Legacy => f.write_str("legacy"),
            Escaping::Standard => f.write_str("standard"),
        }
    }
}

impl FromStr for Escaping {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(Escaping::Legacy),
            "standard" => Ok(Escaping::Standard),
            _ => Err(Error::UnknownEscaping(s.to_string())),
        }
    }
}

/// Serialize a record with the default (legacy) escaping.
pub fn serialize(record: &ChangeRecord) -> String {
    serialize_with(record, Escaping::default())
}

/// Serialize a record with the given escaping.
pub fn serialize_with(record: &ChangeRecord, escaping: Escaping) -> String {
    to_value(record, escaping).to_string()
}

/// Build the JSON document for a record.
pub fn to_value(record: &ChangeRecord, escaping: Escaping) -> Value {
    json!({
        "table": escaping.apply(record.table()),
        "operations": operations_to_json(record.operations()),
        "time": record.time_millis(),
        "rows": { "rows": rows_to_json(record.rows(), escaping) },
    })
}

fn operations_to_json(operations: &BTreeSet<ChangeOperation>) -> Value {
    Value::Array(
        operations
            .iter()
            .map(|op| Value::String(op.as_str().to_string()))
            .collect(),
    )
}

fn rows_to_json(rows: &ChangedRowSet, escaping: Escaping) -> Vec<Value> {
    rows.rows()
        .map(|(key, values)| {
            let mut attributes = Map::new();
            for (column, value) in rows.columns().iter().zip(values) {
                if column.eq_ignore_ascii_case(ROW_KEY_COLUMN) {
                    continue;
                }
                let value = match value {
                    Some(text) => Value::String(escaping.apply(text)),
                    None => Value::Null,
                };
                attributes.insert(column.clone(), value);
            }

            let operations = rows
                .operations(key)
                .map(operations_to_json)
                .unwrap_or_else(|| Value::Array(Vec::new()));

            json!({
                "attributes": attributes,
                "rowId": escaping.apply(key.as_str()),
                "operations": operations,
            })
        })
        .collect()
}
