use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, post};
use axum::{Form, Json, Router};
use axum_test::TestServer;
use parking_lot::Mutex;
use rowcast_consumer::{create_router, AppState, ConsumerConfig};
use rowcast_proto::{ApiResult, CreateSubscription, SubscriptionDetails, SubscriptionInfo};
use serde_json::Value;
use tokio::net::TcpListener;

const TOKEN: &str = "0123456789abcdef0123456789abcdef";

#[derive(Clone, Default)]
struct Service {
    created: Arc<Mutex<Vec<CreateSubscription>>>,
    deleted: Arc<Mutex<Vec<String>>>,
}

async fn create(
    State(service): State<Service>,
    Form(request): Form<CreateSubscription>,
) -> Json<ApiResult<SubscriptionDetails>> {
    service.created.lock().push(request.clone());
    Json(ApiResult::ok(SubscriptionDetails {
        id: 1,
        name: request.name,
        url: request.url,
        timeout: request.timeout,
        session_token: TOKEN.to_string(),
    }))
}

async fn remove(
    State(service): State<Service>,
    Path(token): Path<String>,
) -> (StatusCode, Json<ApiResult<SubscriptionInfo>>) {
    if token != TOKEN {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResult::err("Subscription not found.")),
        );
    }
    service.deleted.lock().push(token);
    (
        StatusCode::OK,
        Json(ApiResult::ok(SubscriptionInfo {
            id: 1,
            name: "ConsumerClient".into(),
        })),
    )
}

/// Start a stand-in for the rowcast subscription API.
async fn service() -> (String, Service) {
    let service = Service::default();
    let app = Router::new()
        .route("/api/subscription", post(create))
        .route("/api/subscription/:token", delete(remove))
        .with_state(service.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), service)
}

fn consumer(service_url: &str) -> (TestServer, AppState) {
    let config = ConsumerConfig::default().with_service_url(service_url);
    let state = AppState::new(config);
    let server = TestServer::new(create_router(state.clone())).unwrap();
    (server, state)
}

#[tokio::test]
async fn test_start_subscribes_once() {
    let (url, service) = service().await;
    let (server, state) = consumer(&url);

    let response = server.get("/consumer/start").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["response"], "Subscription ok.");
    assert_eq!(state.token.lock().as_deref(), Some(TOKEN));

    {
        let created = service.created.lock();
        assert_eq!(created.len(), 1);
        assert!(created[0].name.starts_with("ConsumerClient"));
        assert!(created[0].name["ConsumerClient".len()..].parse::<i64>().is_ok());
        assert_eq!(created[0].url, "http://127.0.0.1:8090/consumer/messagereceiver");
        assert_eq!(created[0].timeout, 900);
    }

    server
        .get("/consumer/start")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(service.created.lock().len(), 1);
}

#[tokio::test]
async fn test_stop_uses_stored_token() {
    let (url, service) = service().await;
    let (server, state) = consumer(&url);

    server
        .get("/consumer/stop")
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server.get("/consumer/start").await.assert_status_ok();
    let response = server.get("/consumer/stop").await;
    response.assert_status_ok();

    assert_eq!(*service.deleted.lock(), vec![TOKEN.to_string()]);
    assert!(state.token.lock().is_none());
}

#[tokio::test]
async fn test_rejected_unsubscribe_keeps_token() {
    let (url, _service) = service().await;
    let (server, state) = consumer(&url);
    *state.token.lock() = Some("ffffffffffffffffffffffffffffffff".into());

    let response = server.get("/consumer/stop").await;
    response.assert_status(StatusCode::BAD_GATEWAY);
    assert_eq!(response.json::<Value>()["error"], "Subscription not found.");
    assert!(state.token.lock().is_some());
}

#[tokio::test]
async fn test_unreachable_service() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (server, state) = consumer(&format!("http://{}", addr));
    let response = server.get("/consumer/start").await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    assert!(response.json::<Value>()["error"].is_string());
    assert!(state.token.lock().is_none());
}

#[tokio::test]
async fn test_receive_message() {
    let (server, state) = consumer("http://127.0.0.1:1");

    let response = server
        .post("/consumer/messagereceiver")
        .form(&[("message", r#"{"table":"T","operations":["INSERT"]}"#)])
        .await;
    response.assert_status_ok();

    let body = response.json::<Value>();
    assert!(body["response"]
        .as_str()
        .unwrap()
        .starts_with("message received at "));
    assert_eq!(state.received.load(Ordering::Relaxed), 1);

    server
        .post("/consumer/messagereceiver")
        .form(&[("other", "x")])
        .await
        .assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}
