//! Row keys and fetched row sets.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::operation::ChangeOperation;

/// Name of the row-key pseudo-column carried through fetched rows.
///
/// Matched case-insensitively; it is never emitted as a row attribute.
pub const ROW_KEY_COLUMN: &str = "rowid";

/// Physical locator of one row version.
///
/// A row key identifies a row only for as long as that version of the row
/// exists; it is not a primary key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowKey(String);

impl RowKey {
    /// Create a row key from its textual form.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Textual form of the key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for RowKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Operations observed per row key within one batch.
pub type RowOperations = BTreeMap<RowKey, BTreeSet<ChangeOperation>>;

/// Current contents of the rows changed by one batch on one table.
///
/// Values are aligned positionally with [`ChangedRowSet::columns`] and kept
/// as text; `None` is SQL `NULL`. Every key in the operations map has a
/// values entry of the same width as the column list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChangedRowSet {
    columns: Vec<String>,
    values: BTreeMap<RowKey, Vec<Option<String>>>,
    operations: RowOperations,
}

impl ChangedRowSet {
    /// Build a row set, checking the alignment invariant.
    pub fn new(
        columns: Vec<String>,
        values: BTreeMap<RowKey, Vec<Option<String>>>,
        operations: RowOperations,
    ) -> Result<Self> {
        for (key, row) in &values {
            if row.len() != columns.len() {
                return Err(Error::InvalidRowSet(format!(
                    "row {} has {} values for {} columns",
                    key,
                    row.len(),
                    columns.len()
                )));
            }
        }

        for (key, ops) in &operations {
            if ops.is_empty() {
                return Err(Error::InvalidRowSet(format!("row {} has no operations", key)));
            }
            if !values.contains_key(key) {
                return Err(Error::InvalidRowSet(format!("row {} has no values", key)));
            }
        }

        Ok(Self {
            columns,
            values,
            operations,
        })
    }

    /// An empty row set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Column names shared by all rows.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.values.len()
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Whether the set holds no rows.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values of one row.
    pub fn values(&self, key: &RowKey) -> Option<&[Option<String>]> {
        self.values.get(key).map(Vec::as_slice)
    }

    /// Operations observed for one row.
    pub fn operations(&self, key: &RowKey) -> Option<&BTreeSet<ChangeOperation>> {
        self.operations.get(key)
    }

    /// Column name and value of one cell.
    pub fn cell(&self, key: &RowKey, column: usize) -> Option<(&str, Option<&str>)> {
        let name = self.columns.get(column)?;
        let value = self.values.get(key)?.get(column)?;
        Some((name.as_str(), value.as_deref()))
    }

    /// Iterate rows in key order.
    pub fn rows(&self) -> impl Iterator<Item = (&RowKey, &[Option<String>])> {
        self.values.iter().map(|(key, row)| (key, row.as_slice()))
    }
}
