//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` while a registration is active, `degraded` otherwise.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Id of the active change-notification registration.
    pub registration_id: Option<u64>,
    /// Watched tables.
    pub tables: Vec<String>,
    /// Number of active subscriptions.
    pub subscribers: usize,
}

/// Health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let registration = state.manager.active();

    Json(HealthResponse {
        status: if registration.is_some() { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        registration_id: registration.as_ref().map(|r| r.id),
        tables: registration.map(|r| r.tables).unwrap_or_default(),
        subscribers: state.registry.len(),
    })
}
