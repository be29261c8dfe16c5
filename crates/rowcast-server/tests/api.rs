use std::sync::Arc;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use rowcast_core::{
    ChangeEventHandler, ChangeSource, Registration, RegistrationManager, Result,
    SubscriptionRegistry,
};
use rowcast_proto::RawChangeEvent;
use rowcast_server::{create_router, AppState, ServerConfig};
use serde_json::{json, Value};

struct StaticSource;

#[async_trait]
impl ChangeSource for StaticSource {
    async fn register(&self, tables: &[String]) -> Result<Registration> {
        Ok(Registration {
            id: 17,
            tables: tables.to_vec(),
            channel: "rowcast_changes".into(),
        })
    }

    async fn unregister(&self, _registration_id: u64) -> Result<()> {
        Ok(())
    }
}

struct IgnoreChanges;

#[async_trait]
impl ChangeEventHandler for IgnoreChanges {
    async fn on_change_notification(&self, _event: &RawChangeEvent) {}
}

async fn test_server(register: bool) -> TestServer {
    let manager = Arc::new(RegistrationManager::new(
        Arc::new(StaticSource),
        Arc::new(IgnoreChanges),
    ));
    if register {
        manager
            .register(&["public.orders".to_string()])
            .await
            .unwrap();
    }

    let state = AppState::new(
        Arc::new(SubscriptionRegistry::new()),
        manager,
        ServerConfig::default(),
    );
    TestServer::new(create_router(state)).unwrap()
}

async fn create(server: &TestServer, name: &str) -> Value {
    let response = server
        .post("/api/subscription")
        .json(&json!({"name": name, "url": "http://127.0.0.1:9000/hook", "timeout": 30}))
        .await;
    response.assert_status_ok();
    response.json::<Value>()
}

#[tokio::test]
async fn test_health_reports_registration() {
    let server = test_server(true).await;
    create(&server, "one").await;

    let health = server.get("/health").await.json::<Value>();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["registration_id"], 17);
    assert_eq!(health["tables"], json!(["public.orders"]));
    assert_eq!(health["subscribers"], 1);

    let server = test_server(false).await;
    let health = server.get("/health").await.json::<Value>();
    assert_eq!(health["status"], "degraded");
    assert!(health["registration_id"].is_null());
}

#[tokio::test]
async fn test_create_returns_full_subscription() {
    let server = test_server(true).await;
    let body = create(&server, "Billing").await;

    assert!(body["error"].is_null());
    assert!(body["created"].is_string());
    let sub = &body["response"];
    assert_eq!(sub["name"], "Billing");
    assert_eq!(sub["url"], "http://127.0.0.1:9000/hook");
    assert_eq!(sub["timeout"], 30);
    let token = sub["sessionToken"].as_str().unwrap();
    assert_eq!(token.len(), 32);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[tokio::test]
async fn test_create_accepts_form_body() {
    let server = test_server(true).await;
    let response = server
        .post("/api/subscription")
        .form(&[
            ("name", "ConsumerClient1700000000000"),
            ("url", "http://127.0.0.1:9000/consumer/messagereceiver"),
            ("timeout", "900"),
        ])
        .await;

    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body["response"]["timeout"], 900);
}

#[tokio::test]
async fn test_duplicate_name_conflicts() {
    let server = test_server(true).await;
    create(&server, "A").await;

    let response = server
        .post("/api/subscription")
        .json(&json!({"name": "a", "url": "http://127.0.0.1:9001/hook", "timeout": 0}))
        .await;
    response.assert_status(StatusCode::CONFLICT);

    let body = response.json::<Value>();
    assert_eq!(body["error"], "Subscription with name a already exists.");
    assert!(body["response"].is_null());

    let list = server.get("/api/subscription").await.json::<Value>();
    assert_eq!(list["response"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_request_is_bad_request() {
    let server = test_server(true).await;

    let response = server
        .post("/api/subscription")
        .json(&json!({"name": "x", "url": "not a url", "timeout": 0}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.json::<Value>()["error"].is_string());

    let response = server
        .post("/api/subscription")
        .json(&json!({"name": "x"}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_and_list_hide_url_and_token() {
    let server = test_server(true).await;
    let first = create(&server, "first").await;
    create(&server, "second").await;
    let id = first["response"]["id"].as_u64().unwrap();

    let body = server
        .get(&format!("/api/subscription/{}", id))
        .await
        .json::<Value>();
    assert_eq!(body["response"], json!({"id": id, "name": "first"}));

    let list = server.get("/api/subscription").await.json::<Value>();
    let names: Vec<&str> = list["response"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["first", "second"]);
    assert!(list["response"][0].get("sessionToken").is_none());
}

#[tokio::test]
async fn test_get_unknown_id() {
    let server = test_server(true).await;

    let response = server.get("/api/subscription/42").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"], "Subscription not found.");

    let response = server.get("/api/subscription/not-a-number").await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_by_token() {
    let server = test_server(true).await;
    let created = create(&server, "temp").await;
    let id = created["response"]["id"].as_u64().unwrap();
    let token = created["response"]["sessionToken"].as_str().unwrap().to_string();

    let response = server
        .delete(&format!("/api/subscription/{}", token.to_uppercase()))
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.json::<Value>()["response"],
        json!({"id": id, "name": "temp"})
    );

    let response = server.delete(&format!("/api/subscription/{}", token)).await;
    response.assert_status(StatusCode::NOT_FOUND);

    let response = server.get(&format!("/api/subscription/{}", id)).await;
    response.assert_status(StatusCode::NOT_FOUND);
}
