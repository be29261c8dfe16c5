//! rowcast HTTP service.
//!
//! This crate provides the subscription API of the rowcast service and the
//! wiring of the change pipeline behind it.

pub mod config;
pub mod error;
pub mod routes;

pub use config::{Args, ServerConfig};
pub use error::AppError;

use std::sync::Arc;

use axum::Router;
use rowcast_core::{RegistrationManager, SharedRegistry};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Active subscriptions.
    pub registry: SharedRegistry,
    /// Change-notification registration owner.
    pub manager: Arc<RegistrationManager>,
    /// Service configuration.
    pub config: ServerConfig,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        registry: SharedRegistry,
        manager: Arc<RegistrationManager>,
        config: ServerConfig,
    ) -> Self {
        Self {
            registry,
            manager,
            config,
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
        .merge(routes::health::routes())
        .merge(routes::subscription::routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
