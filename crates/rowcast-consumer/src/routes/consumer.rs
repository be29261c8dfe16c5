//! Consumer endpoints.

use std::sync::atomic::Ordering;

use axum::{
    extract::State,
    routing::{get, post},
    Form, Json, Router,
};
use chrono::Utc;
use rowcast_proto::{ApiResult, CreateSubscription};
use serde::Deserialize;
use tracing::info;

use crate::config::RECEIVER_PATH;
use crate::error::AppError;
use crate::AppState;

/// Body of a pushed change record.
#[derive(Debug, Deserialize)]
pub struct PushedMessage {
    /// Serialized change record.
    pub message: String,
}

/// Consumer routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/consumer/start", get(start))
        .route("/consumer/stop", get(stop))
        .route(RECEIVER_PATH, post(receive_message))
}

/// Subscribe this consumer with the rowcast service.
async fn start(State(state): State<AppState>) -> Result<Json<ApiResult<String>>, AppError> {
    if state.token.lock().is_some() {
        return Err(AppError::BadRequest("Already subscribed.".into()));
    }

    let request = CreateSubscription {
        name: format!("ConsumerClient{}", Utc::now().timestamp_millis()),
        url: state.config.callback_url(),
        timeout: state.config.subscription_timeout,
    };
    info!(endpoint = %request.url, "subscribing consumer");

    let subscription = state.service.subscribe(&request).await?;
    *state.token.lock() = Some(subscription.session_token);

    info!(id = subscription.id, "subscription sent, waiting for messages");
    Ok(Json(ApiResult::ok("Subscription ok.".to_string())))
}

/// Drop this consumer's subscription.
async fn stop(State(state): State<AppState>) -> Result<Json<ApiResult<String>>, AppError> {
    let token = state
        .token
        .lock()
        .take()
        .ok_or_else(|| AppError::BadRequest("Not subscribed.".into()))?;

    match state.service.unsubscribe(&token).await {
        Ok(removed) => {
            info!(id = removed.id, name = %removed.name, "unsubscribed");
            Ok(Json(ApiResult::ok("Unsubscribed.".to_string())))
        }
        Err(e) => {
            // Keep the token so the call can be repeated
            *state.token.lock() = Some(token);
            Err(e)
        }
    }
}

/// Receive one pushed change record.
async fn receive_message(
    State(state): State<AppState>,
    Form(pushed): Form<PushedMessage>,
) -> Json<ApiResult<String>> {
    let count = state.received.fetch_add(1, Ordering::Relaxed) + 1;
    info!(count, message = %pushed.message, "consumer received a message");

    Json(ApiResult::ok(format!(
        "message received at {}",
        Utc::now().to_rfc2822()
    )))
}
