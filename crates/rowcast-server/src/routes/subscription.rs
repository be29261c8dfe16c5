//! Subscription endpoints.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use rowcast_proto::{ApiResult, CreateSubscription, SubscriptionDetails, SubscriptionInfo};
use tracing::info;

use super::extract::JsonOrForm;
use crate::error::AppError;
use crate::AppState;

/// Subscription routes.
///
/// `GET` on a single subscription takes its id, `DELETE` takes its token.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/subscription",
            get(list_subscriptions).post(create_subscription),
        )
        .route(
            "/api/subscription/:key",
            get(get_subscription).delete(delete_subscription),
        )
}

/// Create a subscription.
async fn create_subscription(
    State(state): State<AppState>,
    JsonOrForm(request): JsonOrForm<CreateSubscription>,
) -> Result<Json<ApiResult<SubscriptionDetails>>, AppError> {
    let subscription = state
        .registry
        .create(&request.name, &request.url, request.timeout)?;
    Ok(Json(ApiResult::ok(subscription.details())))
}

/// List all subscriptions.
async fn list_subscriptions(
    State(state): State<AppState>,
) -> Json<ApiResult<Vec<SubscriptionInfo>>> {
    let all = state
        .registry
        .list_all()
        .iter()
        .map(|sub| sub.info())
        .collect();
    Json(ApiResult::ok(all))
}

/// Get one subscription by id.
async fn get_subscription(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResult<SubscriptionInfo>>, AppError> {
    let id: u64 = id
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid subscription id: {}", id)))?;

    let subscription = state
        .registry
        .find_by_id(id)
        .ok_or(rowcast_core::Error::NotFound)?;
    Ok(Json(ApiResult::ok(subscription.info())))
}

/// Delete the subscription holding a token.
async fn delete_subscription(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ApiResult<SubscriptionInfo>>, AppError> {
    let removed = state.registry.delete(&token)?;
    info!(name = %removed.name, "subscription deleted");
    Ok(Json(ApiResult::ok(removed.info())))
}
