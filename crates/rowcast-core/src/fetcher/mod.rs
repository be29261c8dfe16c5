//! Retrieval of the current contents of changed rows.

mod postgres;

pub use postgres::{build_changes_query, parse_ctid, PgRowFetcher};

use std::collections::BTreeMap;

use async_trait::async_trait;
use rowcast_proto::{ChangedRowSet, RowKey, RowOperations};
use tracing::debug;

use crate::config::is_identifier;
use crate::error::{Error, Result};

/// Source of current row contents.
#[async_trait]
pub trait RowFetcher: Send + Sync {
    /// Fetch the rows named by the keys of `rows`.
    ///
    /// The returned set carries the operations of every key that still
    /// resolves to a row. Keys without a row are dropped.
    async fn fetch(&self, table: &str, rows: &RowOperations) -> Result<ChangedRowSet>;
}

/// Check that `table` is a plain or schema-qualified identifier.
pub fn validate_table_name(table: &str) -> Result<()> {
    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|part| is_identifier(part)) {
        return Err(Error::Query(format!("malformed table name: {:?}", table)));
    }
    Ok(())
}

/// Assemble a [`ChangedRowSet`] from fetched rows.
///
/// Rows that were not requested are ignored; requested keys that came back
/// without a row are dropped from the operations map.
pub fn assemble_row_set(
    table: &str,
    columns: Vec<String>,
    fetched: Vec<(RowKey, Vec<Option<String>>)>,
    requested: &RowOperations,
) -> Result<ChangedRowSet> {
    let mut values = BTreeMap::new();
    let mut operations = RowOperations::new();

    for (key, row) in fetched {
        if let Some(ops) = requested.get(&key) {
            operations.insert(key.clone(), ops.clone());
            values.insert(key, row);
        }
    }

    let missing = requested.len() - operations.len();
    if missing > 0 {
        debug!(table, missing, "changed rows no longer present");
    }

    Ok(ChangedRowSet::new(columns, values, operations)?)
}
