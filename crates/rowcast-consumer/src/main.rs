//! rowcast demo consumer binary.

use clap::Parser;
use rowcast_consumer::{create_router, AppState, Args, ConsumerConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("rowcast_consumer={},tower_http=info", args.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ConsumerConfig::from(&args);
    info!(
        listen = %config.listen_addr,
        service = %config.service_url,
        callback = %config.callback_url(),
        "Starting rowcast consumer"
    );

    let app = create_router(AppState::new(config.clone()));
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Consumer listening on {}", config.listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
