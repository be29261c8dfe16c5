//! The change pipeline: normalize, serialize, dispatch.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rowcast_proto::{json, Escaping, RawChangeEvent};
use tracing::info;

use crate::dispatch::{DispatchHandle, Dispatcher};
use crate::normalizer::ChangeNormalizer;
use crate::registration::ChangeEventHandler;

/// Turns validated raw batches into dispatched change records.
pub struct ChangePipeline {
    normalizer: ChangeNormalizer,
    dispatcher: Arc<Dispatcher>,
    escaping: Escaping,
}

impl ChangePipeline {
    /// Create a pipeline that renders records with `escaping`.
    pub fn new(
        normalizer: ChangeNormalizer,
        dispatcher: Arc<Dispatcher>,
        escaping: Escaping,
    ) -> Self {
        Self {
            normalizer,
            dispatcher,
            escaping,
        }
    }

    /// Process one batch and return the handles of the started deliveries.
    ///
    /// The timestamp is taken once and shared by every record of the batch.
    pub async fn process(&self, event: &RawChangeEvent) -> Vec<DispatchHandle> {
        let timestamp = Utc::now();
        let records = self.normalizer.normalize(event, timestamp).await;

        records
            .iter()
            .map(|record| {
                let payload = json::serialize_with(record, self.escaping);
                let handle = self.dispatcher.notify(&payload);
                info!(
                    table = %record.table(),
                    rows = record.rows().row_count(),
                    targets = handle.len(),
                    "change record dispatched"
                );
                handle
            })
            .collect()
    }
}

#[async_trait]
impl ChangeEventHandler for ChangePipeline {
    async fn on_change_notification(&self, event: &RawChangeEvent) {
        // Deliveries keep running detached
        self.process(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PushConfig;
    use crate::error::Result;
    use crate::fetcher::{assemble_row_set, RowFetcher};
    use crate::registry::SubscriptionRegistry;
    use axum::{extract::State, routing::post, Form, Router};
    use parking_lot::Mutex;
    use rowcast_proto::{ChangeOperation, ChangedRowSet, RowKey, RowOperations, TableChange};
    use serde_json::Value;
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    /// Every requested row resolves to one fixed value.
    struct QuotedFetcher;

    #[async_trait]
    impl RowFetcher for QuotedFetcher {
        async fn fetch(&self, table: &str, rows: &RowOperations) -> Result<ChangedRowSet> {
            let fetched = rows
                .keys()
                .map(|key| (key.clone(), vec![Some("say \"hi\"".to_string())]))
                .collect();
            assemble_row_set(table, vec!["note".into()], fetched, rows)
        }
    }

    async fn receiver() -> (String, Arc<Mutex<Vec<String>>>) {
        let inbox: Arc<Mutex<Vec<String>>> = Arc::default();
        let app = Router::new()
            .route(
                "/hook",
                post(
                    |State(inbox): State<Arc<Mutex<Vec<String>>>>,
                     Form(form): Form<HashMap<String, String>>| async move {
                        inbox.lock().extend(form.get("message").cloned());
                    },
                ),
            )
            .with_state(inbox.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/hook", addr), inbox)
    }

    fn pipeline(url: &str, escaping: Escaping) -> ChangePipeline {
        let registry = Arc::new(SubscriptionRegistry::new());
        registry.create("receiver", url, 5).unwrap();
        ChangePipeline::new(
            ChangeNormalizer::new(Arc::new(QuotedFetcher)),
            Arc::new(Dispatcher::new(registry, PushConfig::disabled())),
            escaping,
        )
    }

    fn event() -> RawChangeEvent {
        RawChangeEvent::new(
            1,
            vec![
                TableChange::new("a").with_row("(0,1)", ChangeOperation::Insert),
                TableChange::new("b").with_row("(0,2)", ChangeOperation::Delete),
            ],
        )
    }

    #[tokio::test]
    async fn test_one_delivery_per_table_record() {
        let (url, inbox) = receiver().await;
        let pipeline = pipeline(&url, Escaping::Legacy);

        let handles = pipeline.process(&event()).await;
        assert_eq!(handles.len(), 2);
        for handle in handles {
            assert!(handle.wait().await.iter().all(|r| r.is_ok()));
        }

        let messages: Vec<Value> = inbox
            .lock()
            .iter()
            .map(|m| serde_json::from_str(m).unwrap())
            .collect();
        assert_eq!(messages.len(), 2);

        let a = messages.iter().find(|m| m["table"] == "a").unwrap();
        let b = messages.iter().find(|m| m["table"] == "b").unwrap();
        assert_eq!(a["time"], b["time"]);
        assert_eq!(a["rows"]["rows"][0]["attributes"]["note"], "say ''hi''");
        assert_eq!(a["rows"]["rows"][0]["rowId"], "(0,1)");
        assert_eq!(b["operations"], serde_json::json!(["DELETE"]));
        assert!(b["rows"]["rows"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_standard_escaping_keeps_quotes() {
        let (url, inbox) = receiver().await;
        let pipeline = pipeline(&url, Escaping::Standard);

        let event = RawChangeEvent::new(
            1,
            vec![TableChange::new("a").with_row(RowKey::new("(0,1)"), ChangeOperation::Update)],
        );
        for handle in pipeline.process(&event).await {
            handle.wait().await;
        }

        let message: Value = serde_json::from_str(&inbox.lock()[0]).unwrap();
        assert_eq!(message["rows"]["rows"][0]["attributes"]["note"], "say \"hi\"");
    }
}
