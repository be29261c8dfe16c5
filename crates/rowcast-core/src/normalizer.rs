//! Normalization of raw notification batches into change records.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rowcast_proto::{
    ChangeOperation, ChangeRecord, RawChangeEvent, RowChange, RowKey, RowOperations, TableChange,
};
use tracing::{debug, error};

use crate::error::Result;
use crate::fetcher::RowFetcher;

/// Row keys of one table change, partitioned by what must happen to them.
///
/// Inserted and updated keys are collected for re-fetching together with
/// every operation seen on them. Deleted keys are excluded from re-fetching
/// even when the same batch also inserted or updated them: the row no longer
/// exists in its notified version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowChangeSet {
    refetch: RowOperations,
    deleted: BTreeSet<RowKey>,
}

impl RowChangeSet {
    /// Partition row changes.
    pub fn from_rows(rows: &[RowChange]) -> Self {
        let mut set = Self::default();

        for row in rows {
            if row.operation.needs_refetch() {
                set.refetch
                    .entry(row.row_key.clone())
                    .or_default()
                    .insert(row.operation);
            } else {
                set.deleted.insert(row.row_key.clone());
            }
        }

        set.refetch.retain(|key, _| !set.deleted.contains(key));
        set
    }

    /// Keys to re-fetch with their observed operations.
    pub fn refetch(&self) -> &RowOperations {
        &self.refetch
    }

    /// Deleted keys.
    pub fn deleted(&self) -> &BTreeSet<RowKey> {
        &self.deleted
    }
}

/// Turns raw notification batches into [`ChangeRecord`]s.
pub struct ChangeNormalizer {
    fetcher: Arc<dyn RowFetcher>,
}

impl ChangeNormalizer {
    /// Create a normalizer backed by a row fetcher.
    pub fn new(fetcher: Arc<dyn RowFetcher>) -> Self {
        Self { fetcher }
    }

    /// Normalize every table of a batch.
    ///
    /// All records share `timestamp`. A table whose rows cannot be fetched
    /// is logged and skipped; the remaining tables are still returned.
    pub async fn normalize(
        &self,
        event: &RawChangeEvent,
        timestamp: DateTime<Utc>,
    ) -> Vec<ChangeRecord> {
        let mut records = Vec::with_capacity(event.tables.len());

        for table in &event.tables {
            match self.normalize_table(table, timestamp).await {
                Ok(record) => records.push(record),
                Err(e) => {
                    error!(
                        registration_id = event.registration_id,
                        table = %table.table_name,
                        error = %e,
                        "dropping table changes"
                    );
                }
            }
        }

        records
    }

    /// Normalize the changes of a single table.
    pub async fn normalize_table(
        &self,
        table: &TableChange,
        timestamp: DateTime<Utc>,
    ) -> Result<ChangeRecord> {
        let partition = RowChangeSet::from_rows(&table.rows);

        debug!(
            table = %table.table_name,
            refetch = partition.refetch().len(),
            deleted = partition.deleted().len(),
            "normalizing table changes"
        );

        let rows = self
            .fetcher
            .fetch(&table.table_name, partition.refetch())
            .await?;

        Ok(ChangeRecord::new(
            table.table_name.clone(),
            table_operations(table),
            timestamp,
            rows,
        ))
    }
}

/// Operation kinds reported for the table plus those seen on its rows.
fn table_operations(table: &TableChange) -> BTreeSet<ChangeOperation> {
    table
        .operations
        .iter()
        .copied()
        .chain(table.rows.iter().map(|row| row.operation))
        .collect()
}
