//! rowcast core library.
//!
//! This crate provides the change-event pipeline: registration with the
//! change-notification source, normalization of raw batches into change
//! records, re-fetching of changed rows, and fan-out of the serialized
//! records to subscribers and static push targets.
//!
//! # Modules
//!
//! - [`config`] - Store, notification and push settings
//! - [`registration`] - Registration lifecycle and the PostgreSQL change source
//! - [`normalizer`] - Grouping of row changes into change records
//! - [`fetcher`] - Retrieval of current row contents
//! - [`registry`] - In-memory subscription registry
//! - [`dispatch`] - Concurrent delivery to subscribers and push targets
//! - [`pipeline`] - Glue from raw batches to dispatched records

pub mod config;
pub mod dispatch;
pub mod error;
pub mod fetcher;
pub mod normalizer;
pub mod pipeline;
pub mod registration;
pub mod registry;

pub use config::{NotificationConfig, PipelineConfig, PushConfig, StoreConfig};
pub use dispatch::{DispatchHandle, Dispatcher};
pub use error::{Error, Result};
pub use fetcher::{PgRowFetcher, RowFetcher};
pub use normalizer::{ChangeNormalizer, RowChangeSet};
pub use pipeline::ChangePipeline;
pub use registration::{
    ChangeEventHandler, ChangeSource, PgChangeSource, RawEventReceiver, RawEventSender,
    Registration, RegistrationManager,
};
pub use registry::{SharedRegistry, Subscription, SubscriptionRegistry};
