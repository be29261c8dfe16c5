//! rowcast demo consumer.
//!
//! A minimal subscriber: it registers itself with a rowcast service, logs
//! every change record pushed to it and unsubscribes on request.

pub mod client;
pub mod config;
pub mod error;
pub mod routes;

pub use client::ServiceClient;
pub use config::{Args, ConsumerConfig};
pub use error::AppError;

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use axum::Router;
use parking_lot::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Client for the rowcast service.
    pub service: ServiceClient,
    /// Consumer configuration.
    pub config: ConsumerConfig,
    /// Token of the current subscription.
    pub token: Arc<Mutex<Option<String>>>,
    /// Number of change records received.
    pub received: Arc<AtomicU64>,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: ConsumerConfig) -> Self {
        Self {
            service: ServiceClient::new(&config.service_url),
            config,
            token: Arc::new(Mutex::new(None)),
            received: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::consumer::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
