//! PostgreSQL row fetcher.
//!
//! Rows are addressed by `ctid`. The query runs over the simple query
//! protocol, which returns every column in text form regardless of its type,
//! so values keep their exact textual representation.

use async_trait::async_trait;
use rowcast_proto::{ChangedRowSet, RowKey, RowOperations, ROW_KEY_COLUMN};
use sqlx::postgres::PgRow;
use sqlx::{Column, PgPool, Row};
use tracing::debug;

use super::{assemble_row_set, validate_table_name, RowFetcher};
use crate::error::{Error, Result};

/// Fetches changed rows from PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgRowFetcher {
    pool: PgPool,
}

impl PgRowFetcher {
    /// Create a fetcher on a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RowFetcher for PgRowFetcher {
    async fn fetch(&self, table: &str, rows: &RowOperations) -> Result<ChangedRowSet> {
        if rows.is_empty() {
            return Ok(ChangedRowSet::empty());
        }

        let query = build_changes_query(table, rows.keys())?;
        debug!(table, rows = rows.len(), %query, "fetching changed rows");

        let result = sqlx::raw_sql(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Query(format!("{}: {}", table, e)))?;

        let columns: Vec<String> = match result.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            None => Vec::new(),
        };

        let fetched = result
            .iter()
            .map(|row| decode_row(table, row))
            .collect::<Result<Vec<_>>>()?;

        assemble_row_set(table, columns, fetched, rows)
    }
}

fn decode_row(table: &str, row: &PgRow) -> Result<(RowKey, Vec<Option<String>>)> {
    let mut values = Vec::with_capacity(row.len());
    for index in 0..row.len() {
        let value: Option<String> = row
            .try_get_unchecked(index)
            .map_err(|e| Error::Query(format!("{}: column {}: {}", table, index, e)))?;
        values.push(value);
    }
    keyed_row(table, values)
}

/// Pair a fetched row with its key, taken from the leading row-key column.
///
/// Values are kept as fetched, so `NULL` stays `None` and an empty string
/// stays `Some("")`.
fn keyed_row(table: &str, values: Vec<Option<String>>) -> Result<(RowKey, Vec<Option<String>>)> {
    let key = values
        .first()
        .and_then(|key| key.as_deref())
        .map(RowKey::new)
        .ok_or_else(|| Error::Query(format!("{}: row without {}", table, ROW_KEY_COLUMN)))?;
    Ok((key, values))
}

/// Build the query selecting the given rows of `table`.
///
/// The row-key pseudo-column comes first, followed by every table column.
pub fn build_changes_query<'a>(
    table: &str,
    keys: impl IntoIterator<Item = &'a RowKey>,
) -> Result<String> {
    validate_table_name(table)?;

    let mut locators = Vec::new();
    for key in keys {
        let (block, offset) = parse_ctid(key)?;
        locators.push(format!("'({},{})'", block, offset));
    }
    if locators.is_empty() {
        return Err(Error::Query(format!("{}: no rows requested", table)));
    }

    Ok(format!(
        "SELECT t.ctid::text AS {}, t.* FROM {} AS t WHERE t.ctid IN ({})",
        ROW_KEY_COLUMN,
        table,
        locators.join(", ")
    ))
}

/// Parse a `ctid` of the form `(block,offset)`.
pub fn parse_ctid(key: &RowKey) -> Result<(u32, u16)> {
    let malformed = || Error::Query(format!("malformed row key: {:?}", key.as_str()));

    let inner = key
        .as_str()
        .trim()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(malformed)?;
    let (block, offset) = inner.split_once(',').ok_or_else(malformed)?;
    let block = block.trim().parse::<u32>().map_err(|_| malformed())?;
    let offset = offset.trim().parse::<u16>().map_err(|_| malformed())?;
    Ok((block, offset))
}
