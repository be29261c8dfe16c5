//! rowcast protocol types and wire format.
//!
//! This crate defines the data model shared by the rowcast service and its
//! clients: the raw change events delivered by the notification source, the
//! normalized change records built from them, the JSON wire format pushed to
//! subscribers, and the request/response bodies of the subscription API.
//!
//! # Modules
//!
//! - [`operation`] - Row operation kinds and event types
//! - [`row`] - Row keys and fetched row sets
//! - [`record`] - Normalized per-table change records
//! - [`event`] - Raw change events as delivered by the notification source
//! - [`json`] - Canonical JSON rendering of change records
//! - [`api`] - Subscription API bodies
//! - [`error`] - Protocol error types

pub mod api;
pub mod error;
pub mod event;
pub mod json;
pub mod operation;
pub mod record;
pub mod row;

pub use error::Error;

// Re-export commonly used types at crate root
pub use api::{ApiResult, CreateSubscription, SubscriptionDetails, SubscriptionInfo};
pub use event::{RawChangeEvent, RowChange, TableChange};
pub use json::Escaping;
pub use operation::{ChangeOperation, EventType};
pub use record::ChangeRecord;
pub use row::{ChangedRowSet, RowKey, RowOperations, ROW_KEY_COLUMN};
