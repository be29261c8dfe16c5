//! Coalescing of per-row notifications into raw change batches.

use rowcast_proto::{ChangeOperation, RawChangeEvent, RowKey, TableChange};
use serde::Deserialize;

use crate::error::Result;

/// Payload published by the change trigger for one row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RowNotification {
    /// Registration that installed the trigger.
    pub registration_id: u64,
    /// Table as named at registration time.
    pub table: String,
    /// Kind of change.
    pub operation: ChangeOperation,
    /// Locator of the changed row.
    pub row_key: RowKey,
}

impl RowNotification {
    /// Decode a notification payload.
    pub fn parse(payload: &str) -> Result<Self> {
        serde_json::from_str(payload)
            .map_err(|e| rowcast_proto::Error::InvalidEvent(format!("{}: {}", e, payload)).into())
    }
}

/// Accumulates row notifications into one [`RawChangeEvent`] per
/// registration, with tables in first-seen order.
#[derive(Debug, Default)]
pub struct NotificationBatcher {
    events: Vec<RawChangeEvent>,
    rows: usize,
}

impl NotificationBatcher {
    /// Create an empty batcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one row notification.
    pub fn push(&mut self, notification: RowNotification) {
        let index = match self
            .events
            .iter()
            .position(|e| e.registration_id == notification.registration_id)
        {
            Some(index) => index,
            None => {
                self.events
                    .push(RawChangeEvent::new(notification.registration_id, Vec::new()));
                self.events.len() - 1
            }
        };
        let event = &mut self.events[index];

        let index = match event
            .tables
            .iter()
            .position(|t| t.table_name == notification.table)
        {
            Some(index) => index,
            None => {
                event.tables.push(TableChange::new(notification.table));
                event.tables.len() - 1
            }
        };

        event.tables[index].push_row(notification.row_key, notification.operation);
        self.rows += 1;
    }

    /// Number of row notifications buffered.
    pub fn len(&self) -> usize {
        self.rows
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Take the buffered batches, leaving the batcher empty.
    pub fn take(&mut self) -> Vec<RawChangeEvent> {
        self.rows = 0;
        std::mem::take(&mut self.events)
    }
}
