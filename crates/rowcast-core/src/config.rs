//! Pipeline configuration.

use std::time::Duration;

use rowcast_proto::Escaping;

use crate::error::{Error, Result};

/// Default PostgreSQL connection URL.
pub const DEFAULT_DATABASE_URL: &str = "postgres://postgres@127.0.0.1:5432/postgres";

/// Default maximum number of pooled store connections.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default store connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default notification channel.
pub const DEFAULT_CHANNEL: &str = "rowcast_changes";

/// Default window (ms) for coalescing row notifications into one batch.
pub const DEFAULT_BATCH_WINDOW_MS: u64 = 50;

/// Default maximum number of row notifications per batch.
pub const DEFAULT_MAX_BATCH_ROWS: usize = 1000;

/// Default capacity of the raw event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 64;

/// Backing store connection settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Connection URL.
    pub database_url: String,
    /// Maximum pooled connections.
    pub max_connections: u32,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
}

impl StoreConfig {
    /// Create store settings for the given URL.
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    /// Set the maximum pool size.
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASE_URL)
    }
}

/// Which tables to watch and how raw notifications are batched.
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    /// Tables to register for change notification.
    pub tables: Vec<String>,
    /// Notification channel the triggers publish on.
    pub channel: String,
    /// Row notifications arriving within this window form one batch.
    pub batch_window: Duration,
    /// Upper bound on row notifications per batch.
    pub max_batch_rows: usize,
    /// Capacity of the raw event channel.
    pub event_buffer: usize,
}

impl NotificationConfig {
    /// Create settings watching the given tables.
    pub fn new<I, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tables: tables.into_iter().map(Into::into).collect(),
            channel: DEFAULT_CHANNEL.to_string(),
            batch_window: Duration::from_millis(DEFAULT_BATCH_WINDOW_MS),
            max_batch_rows: DEFAULT_MAX_BATCH_ROWS,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }

    /// Set the notification channel.
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Set the batching window.
    pub fn with_batch_window(mut self, window: Duration) -> Self {
        self.batch_window = window;
        self
    }

    /// Set the maximum batch size.
    pub fn with_max_batch_rows(mut self, rows: usize) -> Self {
        self.max_batch_rows = rows.max(1);
        self
    }

    /// Set the raw event channel capacity.
    pub fn with_event_buffer(mut self, buffer: usize) -> Self {
        self.event_buffer = buffer.max(1);
        self
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

/// Statically configured push targets.
#[derive(Debug, Clone, Default)]
pub struct PushConfig {
    /// Whether push delivery is enabled at all.
    pub enabled: bool,
    /// Endpoint URLs receiving every change record.
    pub endpoints: Vec<String>,
    /// Per-delivery timeout for push targets.
    pub timeout: Option<Duration>,
}

impl PushConfig {
    /// Enabled push delivery to the given endpoints.
    pub fn enabled<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: true,
            endpoints: endpoints.into_iter().map(Into::into).collect(),
            timeout: None,
        }
    }

    /// Disabled push delivery.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Set the per-delivery timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Endpoints to deliver to; empty when disabled.
    pub fn active_endpoints(&self) -> &[String] {
        if self.enabled {
            &self.endpoints
        } else {
            &[]
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Backing store settings.
    pub store: StoreConfig,
    /// Notification settings.
    pub notification: NotificationConfig,
    /// Push targets.
    pub push: PushConfig,
    /// String escaping of the wire format.
    pub escaping: Escaping,
}

impl PipelineConfig {
    /// Check the settings that would otherwise fail late at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.notification.tables.is_empty() {
            return Err(Error::Config("at least one table must be watched".into()));
        }
        for table in &self.notification.tables {
            crate::fetcher::validate_table_name(table)
                .map_err(|e| Error::Config(e.to_string()))?;
        }
        if !is_identifier(&self.notification.channel) {
            return Err(Error::Config(format!(
                "invalid notification channel: {}",
                self.notification.channel
            )));
        }
        if self.push.enabled && self.push.endpoints.is_empty() {
            tracing::warn!("push delivery is enabled but no endpoints are configured");
        }
        Ok(())
    }
}

/// Whether `name` is a plain SQL identifier.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.store.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.notification.channel, DEFAULT_CHANNEL);
        assert_eq!(
            config.notification.batch_window,
            Duration::from_millis(DEFAULT_BATCH_WINDOW_MS)
        );
        assert!(!config.push.enabled);
        assert_eq!(config.escaping, Escaping::Legacy);
    }

    #[test]
    fn test_config_builder() {
        let store = StoreConfig::new("postgres://db/app")
            .with_max_connections(0)
            .with_connect_timeout(Duration::from_secs(3));
        assert_eq!(store.max_connections, 1);
        assert_eq!(store.connect_timeout, Duration::from_secs(3));

        let notification = NotificationConfig::new(["public.orders", "customers"])
            .with_channel("orders_feed")
            .with_batch_window(Duration::from_millis(5))
            .with_max_batch_rows(10);
        assert_eq!(notification.tables, vec!["public.orders", "customers"]);
        assert_eq!(notification.channel, "orders_feed");
        assert_eq!(notification.max_batch_rows, 10);
    }

    #[test]
    fn test_disabled_push_has_no_endpoints() {
        let mut push = PushConfig::enabled(["http://a/hook", "http://b/hook"]);
        assert_eq!(push.active_endpoints().len(), 2);

        push.enabled = false;
        assert!(push.active_endpoints().is_empty());
    }

    #[test]
    fn test_validate() {
        let mut config = PipelineConfig::default();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.notification = NotificationConfig::new(["public.orders"]);
        assert!(config.validate().is_ok());

        config.notification = NotificationConfig::new(["orders; drop table x"]);
        assert!(config.validate().is_err());

        config.notification = NotificationConfig::new(["orders"]).with_channel("bad-channel");
        assert!(config.validate().is_err());
    }
}
