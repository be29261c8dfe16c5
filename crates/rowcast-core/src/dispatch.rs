//! Fan-out of serialized change records to subscribers and push targets.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::PushConfig;
use crate::error::{Error, Result};
use crate::registry::SharedRegistry;

/// Form field carrying the serialized change record.
pub const MESSAGE_FIELD: &str = "message";

/// Delivers change records to every interested endpoint.
///
/// Each delivery runs as its own task. [`Dispatcher::notify`] returns as soon
/// as the tasks are spawned; a slow or failing target never delays the
/// caller or any other target.
pub struct Dispatcher {
    client: reqwest::Client,
    registry: SharedRegistry,
    push: PushConfig,
}

impl Dispatcher {
    /// Create a dispatcher with a default HTTP client.
    pub fn new(registry: SharedRegistry, push: PushConfig) -> Self {
        Self::with_client(reqwest::Client::new(), registry, push)
    }

    /// Create a dispatcher with a preconfigured HTTP client.
    pub fn with_client(
        client: reqwest::Client,
        registry: SharedRegistry,
        push: PushConfig,
    ) -> Self {
        Self {
            client,
            registry,
            push,
        }
    }

    /// Push configuration in use.
    pub fn push_config(&self) -> &PushConfig {
        &self.push
    }

    /// Send `message` to all subscribers and, when enabled, all push targets.
    ///
    /// Must be called from within a tokio runtime. Dropping the returned
    /// handle detaches the deliveries.
    pub fn notify(&self, message: &str) -> DispatchHandle {
        let message: Arc<str> = Arc::from(message);
        let mut deliveries = Vec::new();

        let subscriptions = self.registry.list_all();
        debug!(subscribers = subscriptions.len(), "notifying subscribers");
        for sub in subscriptions {
            let timeout = sub.delivery_timeout();
            deliveries.push(self.spawn_delivery(sub.url, message.clone(), timeout));
        }

        let endpoints = self.push.active_endpoints();
        if !endpoints.is_empty() {
            debug!(targets = endpoints.len(), "notifying push targets");
        }
        for url in endpoints {
            deliveries.push(self.spawn_delivery(
                url.clone(),
                message.clone(),
                self.push.timeout,
            ));
        }

        DispatchHandle { deliveries }
    }

    fn spawn_delivery(
        &self,
        url: String,
        message: Arc<str>,
        timeout: Option<Duration>,
    ) -> JoinHandle<Result<()>> {
        let client = self.client.clone();
        tokio::spawn(async move {
            let result = deliver(&client, &url, &message, timeout).await;
            match &result {
                Ok(()) => info!(url = %url, "message delivered"),
                Err(e) => warn!(url = %url, error = %e, "message delivery failed"),
            }
            result
        })
    }
}

async fn deliver(
    client: &reqwest::Client,
    url: &str,
    message: &str,
    timeout: Option<Duration>,
) -> Result<()> {
    let failed = |reason: String| Error::Delivery {
        url: url.to_string(),
        reason,
    };

    let mut request = client.post(url).form(&[(MESSAGE_FIELD, message)]);
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }

    let response = request.send().await.map_err(|e| failed(e.to_string()))?;
    response
        .error_for_status()
        .map_err(|e| failed(e.to_string()))?;
    Ok(())
}

/// Spawned deliveries of one [`Dispatcher::notify`] call.
#[derive(Debug)]
pub struct DispatchHandle {
    deliveries: Vec<JoinHandle<Result<()>>>,
}

impl DispatchHandle {
    /// Number of deliveries started.
    pub fn len(&self) -> usize {
        self.deliveries.len()
    }

    /// Whether no delivery was started.
    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty()
    }

    /// Wait for every delivery and collect the outcomes in start order.
    pub async fn wait(self) -> Vec<Result<()>> {
        join_all(self.deliveries)
            .await
            .into_iter()
            .map(|joined| {
                joined.unwrap_or_else(|e| {
                    Err(Error::Delivery {
                        url: String::new(),
                        reason: format!("delivery task failed: {}", e),
                    })
                })
            })
            .collect()
    }
}
