//! Change-notification registration lifecycle.
//!
//! A [`ChangeSource`] creates and drops the standing interest declaration on
//! the backing store and pushes raw batches into a channel. The
//! [`RegistrationManager`] owns the single active registration, drains that
//! channel and hands every valid batch to a [`ChangeEventHandler`]. Batches
//! carrying a registration id it does not own are orphans left behind by an
//! earlier process; they are dropped and their registration is removed.

mod batcher;
mod postgres;

pub use batcher::{NotificationBatcher, RowNotification};
pub use postgres::{registration_sql, unregistration_sql, PgChangeSource};

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rowcast_proto::{EventType, RawChangeEvent};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Receives validated change batches.
#[async_trait]
pub trait ChangeEventHandler: Send + Sync {
    /// Handle one batch raised for the active registration.
    async fn on_change_notification(&self, event: &RawChangeEvent);
}

/// Creates and drops change-notification registrations on the backing store.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Register interest in inserts, updates and deletes on `tables`.
    async fn register(&self, tables: &[String]) -> Result<Registration>;

    /// Drop a registration. Dropping an unknown registration succeeds.
    async fn unregister(&self, registration_id: u64) -> Result<()>;
}

/// An active change-notification registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Identifier assigned by the backing store.
    pub id: u64,
    /// Tables covered.
    pub tables: Vec<String>,
    /// Channel the notifications are published on.
    pub channel: String,
}

/// Sender half of the raw event channel.
pub type RawEventSender = mpsc::Sender<RawChangeEvent>;

/// Receiver half of the raw event channel.
pub type RawEventReceiver = mpsc::Receiver<RawChangeEvent>;

/// Create a raw event channel with the given buffer size.
pub fn channel(buffer_size: usize) -> (RawEventSender, RawEventReceiver) {
    mpsc::channel(buffer_size)
}

/// Owns the process-wide registration and routes raw events.
pub struct RegistrationManager {
    source: Arc<dyn ChangeSource>,
    handler: Arc<dyn ChangeEventHandler>,
    /// Currently active registration.
    active: Mutex<Option<Registration>>,
    /// Serializes register and unregister against each other.
    lifecycle: tokio::sync::Mutex<()>,
}

impl RegistrationManager {
    /// Create a manager without an active registration.
    pub fn new(source: Arc<dyn ChangeSource>, handler: Arc<dyn ChangeEventHandler>) -> Self {
        Self {
            source,
            handler,
            active: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    /// The active registration, if any.
    pub fn active(&self) -> Option<Registration> {
        self.active.lock().clone()
    }

    fn active_id(&self) -> Option<u64> {
        self.active.lock().as_ref().map(|r| r.id)
    }

    /// Register for changes on `tables`.
    ///
    /// Fails with [`Error::AlreadyRegistered`] while a registration is
    /// active; the active registration is left untouched.
    pub async fn register(&self, tables: &[String]) -> Result<Registration> {
        let _guard = self.lifecycle.lock().await;

        if let Some(id) = self.active_id() {
            return Err(Error::AlreadyRegistered(id));
        }

        let registration = self.source.register(tables).await?;
        info!(
            registration_id = registration.id,
            tables = ?registration.tables,
            channel = %registration.channel,
            "change notification registered"
        );

        *self.active.lock() = Some(registration.clone());
        Ok(registration)
    }

    /// Drop a registration.
    ///
    /// Never fails: backing-store errors are logged. Clears the active
    /// registration when `registration_id` is the active one.
    pub async fn unregister(&self, registration_id: u64) {
        let _guard = self.lifecycle.lock().await;

        match self.source.unregister(registration_id).await {
            Ok(()) => info!(registration_id, "change notification unregistered"),
            Err(e) => warn!(
                registration_id,
                error = %e,
                "failed to unregister change notification"
            ),
        }

        let mut active = self.active.lock();
        if active.as_ref().map(|r| r.id) == Some(registration_id) {
            *active = None;
        }
    }

    /// Drop the active registration, if any.
    pub async fn shutdown(&self) {
        match self.active_id() {
            Some(id) => self.unregister(id).await,
            None => debug!("no active registration to drop"),
        }
    }

    /// Validate and route one raw event.
    pub async fn on_raw_event(&self, event: &RawChangeEvent) {
        if self.active_id() != Some(event.registration_id) {
            warn!(
                registration_id = event.registration_id,
                active = ?self.active_id(),
                "event for orphaned registration, unregistering it"
            );
            self.unregister(event.registration_id).await;
            return;
        }

        if event.event_type != EventType::ObjectChange {
            debug!(
                registration_id = event.registration_id,
                event_type = ?event.event_type,
                "ignoring non object-change event"
            );
            return;
        }

        debug!(
            registration_id = event.registration_id,
            tables = event.tables.len(),
            rows = event.row_count(),
            "processing change event"
        );
        self.handler.on_change_notification(event).await;
    }

    /// Process raw events until the channel is closed.
    pub async fn run(&self, mut events: RawEventReceiver) {
        info!("registration manager started");

        while let Some(event) = events.recv().await {
            self.on_raw_event(&event).await;
        }

        info!("registration manager stopped (channel closed)");
    }
}
