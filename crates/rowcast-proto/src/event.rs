//! Raw change events as delivered by the notification source.

use serde::{Deserialize, Serialize};

use crate::operation::{ChangeOperation, EventType};
use crate::row::RowKey;

/// One notification batch from the change-notification source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawChangeEvent {
    /// Identifier of the registration this event was raised for.
    pub registration_id: u64,
    /// Kind of event.
    #[serde(default)]
    pub event_type: EventType,
    /// Changes per table.
    #[serde(default)]
    pub tables: Vec<TableChange>,
}

impl RawChangeEvent {
    /// Create an object-change event.
    pub fn new(registration_id: u64, tables: Vec<TableChange>) -> Self {
        Self {
            registration_id,
            event_type: EventType::ObjectChange,
            tables,
        }
    }

    /// Create a lifecycle event without table changes.
    pub fn notice(registration_id: u64, event_type: EventType) -> Self {
        Self {
            registration_id,
            event_type,
            tables: Vec::new(),
        }
    }

    /// Total number of row changes across all tables.
    pub fn row_count(&self) -> usize {
        self.tables.iter().map(|t| t.rows.len()).sum()
    }
}

/// Changes reported for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableChange {
    /// Table name as reported by the source.
    pub table_name: String,
    /// Table-level operation kinds reported by the source.
    #[serde(default)]
    pub operations: Vec<ChangeOperation>,
    /// Row-level changes.
    #[serde(default)]
    pub rows: Vec<RowChange>,
}

impl TableChange {
    /// Create an empty table change.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            operations: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Add a row change.
    pub fn with_row(mut self, row_key: impl Into<RowKey>, operation: ChangeOperation) -> Self {
        self.push_row(row_key, operation);
        self
    }

    /// Record a row change, keeping the table-level operations in sync.
    pub fn push_row(&mut self, row_key: impl Into<RowKey>, operation: ChangeOperation) {
        if !self.operations.contains(&operation) {
            self.operations.push(operation);
        }
        self.rows.push(RowChange {
            row_key: row_key.into(),
            operation,
        });
    }
}

/// Change of a single row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowChange {
    /// Locator of the changed row.
    pub row_key: RowKey,
    /// Kind of change.
    pub operation: ChangeOperation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_row_tracks_table_operations() {
        let table = TableChange::new("T")
            .with_row("(0,1)", ChangeOperation::Insert)
            .with_row("(0,2)", ChangeOperation::Insert)
            .with_row("(0,3)", ChangeOperation::Delete);

        assert_eq!(table.rows.len(), 3);
        assert_eq!(
            table.operations,
            vec![ChangeOperation::Insert, ChangeOperation::Delete]
        );
    }

    #[test]
    fn test_decode_minimal_event() {
        let event: RawChangeEvent = serde_json::from_str(r#"{"registration_id": 7}"#).unwrap();
        assert_eq!(event.registration_id, 7);
        assert_eq!(event.event_type, EventType::ObjectChange);
        assert!(event.tables.is_empty());
        assert_eq!(event.row_count(), 0);
    }
}
