//! Normalized per-table change records.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::operation::ChangeOperation;
use crate::row::ChangedRowSet;

/// Changes of one table within one notification batch.
///
/// Built once per batch and table, serialized, dispatched and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    table: String,
    operations: BTreeSet<ChangeOperation>,
    timestamp: DateTime<Utc>,
    rows: ChangedRowSet,
}

impl ChangeRecord {
    /// Create a change record.
    pub fn new(
        table: impl Into<String>,
        operations: BTreeSet<ChangeOperation>,
        timestamp: DateTime<Utc>,
        rows: ChangedRowSet,
    ) -> Self {
        Self {
            table: table.into(),
            operations,
            timestamp,
            rows,
        }
    }

    /// Name of the changed table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Table-level operation kinds present in the batch.
    pub fn operations(&self) -> &BTreeSet<ChangeOperation> {
        &self.operations
    }

    /// Time the batch was processed.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Milliseconds since the Unix epoch of [`ChangeRecord::timestamp`].
    pub fn time_millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// Current contents of the inserted and updated rows.
    pub fn rows(&self) -> &ChangedRowSet {
        &self.rows
    }
}
