//! PostgreSQL change source built on triggers and `LISTEN`/`NOTIFY`.
//!
//! Each registration gets a row in `rowcast_registration`, which assigns its
//! id, and a trigger function `rowcast_notify_<id>()` attached to every
//! watched table. The function publishes one JSON payload per changed row on
//! the configured channel. Dropping the function with `CASCADE` removes all
//! of its triggers at once.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgListener, PgPoolOptions};
use sqlx::{Executor, PgPool};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};

use super::batcher::{NotificationBatcher, RowNotification};
use super::{ChangeSource, RawEventSender, Registration};
use crate::config::{is_identifier, NotificationConfig, StoreConfig};
use crate::error::{Error, Result};
use crate::fetcher::validate_table_name;

const ENSURE_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS rowcast_registration (
    id BIGSERIAL PRIMARY KEY,
    channel TEXT NOT NULL,
    tables TEXT[] NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
)";

const INSERT_REGISTRATION: &str =
    "INSERT INTO rowcast_registration (channel, tables) VALUES ($1, $2) RETURNING id";

/// Change source backed by a PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PgChangeSource {
    pool: PgPool,
    notification: NotificationConfig,
}

impl PgChangeSource {
    /// Open a connection pool to the backing store.
    pub async fn connect(store: &StoreConfig, notification: NotificationConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(store.max_connections)
            .acquire_timeout(store.connect_timeout)
            .connect(&store.database_url)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        info!(
            max_connections = store.max_connections,
            "connected to backing store"
        );
        Ok(Self::from_pool(pool, notification))
    }

    /// Create a source on an existing pool.
    pub fn from_pool(pool: PgPool, notification: NotificationConfig) -> Self {
        Self { pool, notification }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Start listening on the notification channel.
    ///
    /// Row notifications are coalesced into raw batches and sent to
    /// `events`. The task ends when `events` is closed or the listener
    /// connection fails for good.
    pub async fn listen(&self, events: RawEventSender) -> Result<JoinHandle<()>> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        listener
            .listen(&self.notification.channel)
            .await
            .map_err(|e| {
                Error::Registration(format!("listen {}: {}", self.notification.channel, e))
            })?;

        info!(channel = %self.notification.channel, "listening for change notifications");

        let window = self.notification.batch_window;
        let max_rows = self.notification.max_batch_rows;
        Ok(tokio::spawn(async move {
            listen_loop(listener, events, window, max_rows).await;
        }))
    }
}

#[async_trait]
impl ChangeSource for PgChangeSource {
    async fn register(&self, tables: &[String]) -> Result<Registration> {
        let channel = &self.notification.channel;
        let failed = |e: sqlx::Error| Error::Registration(e.to_string());

        let mut tx = self.pool.begin().await.map_err(failed)?;
        (&mut *tx)
            .execute(sqlx::raw_sql(ENSURE_SCHEMA))
            .await
            .map_err(failed)?;

        let id: i64 = sqlx::query_scalar(INSERT_REGISTRATION)
            .bind(channel.as_str())
            .bind(tables.to_vec())
            .fetch_one(&mut *tx)
            .await
            .map_err(failed)?;
        let id = u64::try_from(id)
            .map_err(|_| Error::Registration(format!("invalid registration id {}", id)))?;

        let ddl = registration_sql(id, channel, tables)?;
        (&mut *tx)
            .execute(sqlx::raw_sql(&ddl))
            .await
            .map_err(failed)?;
        tx.commit().await.map_err(failed)?;

        Ok(Registration {
            id,
            tables: tables.to_vec(),
            channel: channel.clone(),
        })
    }

    async fn unregister(&self, registration_id: u64) -> Result<()> {
        let sql = unregistration_sql(registration_id);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        (&mut *tx)
            .execute(sqlx::raw_sql(&sql))
            .await
            .map_err(|e| Error::Registration(e.to_string()))?;
        tx.commit()
            .await
            .map_err(|e| Error::Registration(e.to_string()))?;
        Ok(())
    }
}

/// Statements creating the trigger function and triggers of a registration.
///
/// Table names and the channel are validated before being inlined.
pub fn registration_sql(
    registration_id: u64,
    channel: &str,
    tables: &[String],
) -> Result<String> {
    if tables.is_empty() {
        return Err(Error::Registration("no tables to register".into()));
    }
    if !is_identifier(channel) {
        return Err(Error::Registration(format!("invalid channel: {}", channel)));
    }
    for table in tables {
        validate_table_name(table).map_err(|e| Error::Registration(e.to_string()))?;
    }

    let function = function_name(registration_id);
    let mut sql = format!(
        "CREATE OR REPLACE FUNCTION {function}() RETURNS trigger LANGUAGE plpgsql AS $rowcast$
BEGIN
    PERFORM pg_notify('{channel}', json_build_object(
        'registration_id', {registration_id},
        'table', TG_ARGV[0],
        'operation', TG_OP,
        'row_key', (CASE WHEN TG_OP = 'DELETE' THEN OLD.ctid ELSE NEW.ctid END)::text
    )::text);
    RETURN NULL;
END;
$rowcast$;
"
    );

    for table in tables {
        sql.push_str(&format!(
            "CREATE TRIGGER {function} AFTER INSERT OR UPDATE OR DELETE ON {table} \
             FOR EACH ROW EXECUTE FUNCTION {function}('{table}');\n"
        ));
    }

    Ok(sql)
}

/// Statements dropping a registration. Safe to run for unknown ids.
pub fn unregistration_sql(registration_id: u64) -> String {
    format!(
        "{ENSURE_SCHEMA};\n\
         DROP FUNCTION IF EXISTS {}() CASCADE;\n\
         DELETE FROM rowcast_registration WHERE id = {registration_id};\n",
        function_name(registration_id)
    )
}

fn function_name(registration_id: u64) -> String {
    format!("rowcast_notify_{}", registration_id)
}

async fn listen_loop(
    mut listener: PgListener,
    events: RawEventSender,
    window: Duration,
    max_rows: usize,
) {
    let mut batcher = NotificationBatcher::new();

    loop {
        let first = match listener.recv().await {
            Ok(notification) => notification,
            Err(e) => {
                error!(error = %e, "notification listener failed");
                return;
            }
        };
        accept(&mut batcher, first.payload());

        let deadline = Instant::now() + window;
        let mut failure = None;
        while batcher.len() < max_rows {
            match timeout_at(deadline, listener.recv()).await {
                Ok(Ok(notification)) => accept(&mut batcher, notification.payload()),
                Ok(Err(e)) => {
                    failure = Some(e);
                    break;
                }
                Err(_) => break,
            }
        }

        for event in batcher.take() {
            debug!(
                registration_id = event.registration_id,
                rows = event.row_count(),
                "raw change batch ready"
            );
            if events.send(event).await.is_err() {
                info!("raw event receiver closed, stopping listener");
                return;
            }
        }

        if let Some(e) = failure {
            error!(error = %e, "notification listener failed");
            return;
        }
    }
}

fn accept(batcher: &mut NotificationBatcher, payload: &str) {
    match RowNotification::parse(payload) {
        Ok(notification) => batcher.push(notification),
        Err(e) => warn!(error = %e, "skipping malformed change notification"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn tables(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_registration_sql() {
        let sql = registration_sql(
            42,
            "rowcast_changes",
            &tables(&["public.orders", "customers"]),
        )
        .unwrap();

        assert!(sql.contains("CREATE OR REPLACE FUNCTION rowcast_notify_42()"));
        assert!(sql.contains("pg_notify('rowcast_changes'"));
        assert!(sql.contains("'registration_id', 42"));
        assert!(sql.contains(
            "CREATE TRIGGER rowcast_notify_42 AFTER INSERT OR UPDATE OR DELETE ON public.orders"
        ));
        assert!(sql.contains("EXECUTE FUNCTION rowcast_notify_42('customers')"));
        assert_eq!(sql.matches("CREATE TRIGGER").count(), 2);
    }

    #[test]
    fn test_registration_sql_rejects_unsafe_names() {
        assert!(matches!(
            registration_sql(1, "rowcast_changes", &tables(&["orders'; drop table x; --"])),
            Err(Error::Registration(_))
        ));
        assert!(matches!(
            registration_sql(1, "bad channel", &tables(&["orders"])),
            Err(Error::Registration(_))
        ));
        assert!(matches!(
            registration_sql(1, "rowcast_changes", &[]),
            Err(Error::Registration(_))
        ));
    }

    #[test]
    fn test_unregistration_sql_is_idempotent() {
        let sql = unregistration_sql(42);
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS rowcast_registration"));
        assert!(sql.contains("DROP FUNCTION IF EXISTS rowcast_notify_42() CASCADE;"));
        assert!(sql.contains("DELETE FROM rowcast_registration WHERE id = 42;"));
    }

    /// A source on a pool that can never connect.
    fn unreachable_source() -> PgChangeSource {
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(200))
            .connect_lazy("postgres://rowcast@127.0.0.1:1/rowcast")
            .unwrap();
        PgChangeSource::from_pool(pool, NotificationConfig::default())
    }

    #[tokio::test]
    async fn test_register_runs_on_spawned_tasks() {
        let source: Arc<dyn ChangeSource> = Arc::new(unreachable_source());

        let registering = tokio::spawn({
            let source = source.clone();
            async move { source.register(&tables(&["orders"])).await }
        });
        let result = registering.await.unwrap();
        assert!(matches!(result, Err(Error::Registration(_))));

        let unregistering = tokio::spawn(async move { source.unregister(7).await });
        let result = unregistering.await.unwrap();
        assert!(matches!(result, Err(Error::Connection(_))));
    }
}
