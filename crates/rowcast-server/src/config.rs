//! Service configuration.

use std::time::Duration;

use clap::Parser;
use rowcast_core::config::{
    DEFAULT_BATCH_WINDOW_MS, DEFAULT_CHANNEL, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_DATABASE_URL,
    DEFAULT_EVENT_BUFFER, DEFAULT_MAX_BATCH_ROWS, DEFAULT_MAX_CONNECTIONS,
};
use rowcast_core::{NotificationConfig, PipelineConfig, PushConfig, StoreConfig};
use rowcast_proto::Escaping;

/// Default HTTP listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// rowcast service command line arguments.
#[derive(Debug, Parser)]
#[command(name = "rowcast-server")]
#[command(about = "Fans out row changes to HTTP subscribers")]
#[command(version)]
pub struct Args {
    /// Address to listen on for HTTP requests.
    #[arg(short, long, default_value = DEFAULT_LISTEN_ADDR)]
    pub listen: String,

    /// PostgreSQL connection URL.
    #[arg(long, default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    /// Maximum number of pooled database connections.
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,

    /// Timeout (s) for establishing a database connection.
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_secs: u64,

    /// Table to watch, optionally schema-qualified. Repeatable or comma separated.
    #[arg(short, long = "table", value_delimiter = ',')]
    pub tables: Vec<String>,

    /// Notification channel used by the change triggers.
    #[arg(long, default_value = DEFAULT_CHANNEL)]
    pub channel: String,

    /// Window (ms) for coalescing row notifications into one batch.
    #[arg(long, default_value_t = DEFAULT_BATCH_WINDOW_MS)]
    pub batch_window_ms: u64,

    /// Maximum row notifications per batch.
    #[arg(long, default_value_t = DEFAULT_MAX_BATCH_ROWS)]
    pub max_batch_rows: usize,

    /// Capacity of the raw event channel.
    #[arg(long, default_value_t = DEFAULT_EVENT_BUFFER)]
    pub event_buffer: usize,

    /// Push every change record to the static push endpoints.
    #[arg(long, default_value_t = false)]
    pub push_enabled: bool,

    /// Static push endpoint URL. Repeatable or comma separated.
    #[arg(long = "push-endpoint", value_delimiter = ',')]
    pub push_endpoints: Vec<String>,

    /// Timeout (s) for each push delivery. No timeout when unset.
    #[arg(long)]
    pub push_timeout_secs: Option<u64>,

    /// String escaping of pushed records (legacy, standard).
    #[arg(long, default_value = "legacy")]
    pub escaping: Escaping,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on for HTTP requests.
    pub listen_addr: String,
    /// Change pipeline settings.
    pub pipeline: PipelineConfig,
}

impl From<&Args> for ServerConfig {
    fn from(args: &Args) -> Self {
        let store = StoreConfig::new(&args.database_url)
            .with_max_connections(args.max_connections)
            .with_connect_timeout(Duration::from_secs(args.connect_timeout_secs));

        let tables = args
            .tables
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty());
        let notification = NotificationConfig::new(tables)
            .with_channel(&args.channel)
            .with_batch_window(Duration::from_millis(args.batch_window_ms))
            .with_max_batch_rows(args.max_batch_rows)
            .with_event_buffer(args.event_buffer);

        let mut push = PushConfig::enabled(&args.push_endpoints);
        push.enabled = args.push_enabled;
        if let Some(secs) = args.push_timeout_secs {
            push = push.with_timeout(Duration::from_secs(secs));
        }

        Self {
            listen_addr: args.listen.clone(),
            pipeline: PipelineConfig {
                store,
                notification,
                push,
                escaping: args.escaping,
            },
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter(level: &str) -> String {
    format!("rowcast_server={0},rowcast_core={0},tower_http=info", level)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ServerConfig {
        let args =
            Args::try_parse_from(std::iter::once("rowcast-server").chain(args.iter().copied()))
                .unwrap();
        ServerConfig::from(&args)
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR);
        assert_eq!(config.pipeline.store.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.pipeline.notification.channel, DEFAULT_CHANNEL);
        assert!(config.pipeline.notification.tables.is_empty());
        assert!(!config.pipeline.push.enabled);
        assert_eq!(config.pipeline.push.timeout, None);
        assert_eq!(config.pipeline.escaping, Escaping::Legacy);
    }

    #[test]
    fn test_tables_repeatable_and_comma_separated() {
        let config = parse(&["--table", "public.orders,customers", "-t", "invoices"]);
        assert_eq!(
            config.pipeline.notification.tables,
            vec!["public.orders", "customers", "invoices"]
        );
    }

    #[test]
    fn test_push_settings() {
        let config = parse(&[
            "--push-enabled",
            "--push-endpoint",
            "http://a/hook",
            "--push-endpoint",
            "http://b/hook",
            "--push-timeout-secs",
            "7",
        ]);
        let push = &config.pipeline.push;
        assert!(push.enabled);
        assert_eq!(push.active_endpoints(), ["http://a/hook", "http://b/hook"]);
        assert_eq!(push.timeout, Some(Duration::from_secs(7)));

        // Endpoints without the flag stay inactive
        let config = parse(&["--push-endpoint", "http://a/hook"]);
        assert!(config.pipeline.push.active_endpoints().is_empty());
    }

    #[test]
    fn test_escaping_and_batching() {
        let config = parse(&[
            "--escaping",
            "standard",
            "--batch-window-ms",
            "250",
            "--max-batch-rows",
            "10",
        ]);
        assert_eq!(config.pipeline.escaping, Escaping::Standard);
        assert_eq!(
            config.pipeline.notification.batch_window,
            Duration::from_millis(250)
        );
        assert_eq!(config.pipeline.notification.max_batch_rows, 10);

        assert!(Args::try_parse_from(["rowcast-server", "--escaping", "fancy"]).is_err());
    }

    #[test]
    fn test_default_log_filter() {
        assert_eq!(
            default_log_filter("debug"),
            "rowcast_server=debug,rowcast_core=debug,tower_http=info"
        );
    }
}
