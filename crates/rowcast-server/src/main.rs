//! rowcast service binary.

use std::sync::Arc;

use clap::Parser;
use rowcast_core::registration;
use rowcast_core::{
    ChangeNormalizer, ChangePipeline, Dispatcher, PgChangeSource, PgRowFetcher,
    RegistrationManager, SubscriptionRegistry,
};
use rowcast_server::config::default_log_filter;
use rowcast_server::{create_router, AppState, Args, ServerConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_log_filter(&args.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from(&args);
    config.pipeline.validate()?;

    info!(
        listen = %config.listen_addr,
        tables = ?config.pipeline.notification.tables,
        channel = %config.pipeline.notification.channel,
        push_enabled = config.pipeline.push.enabled,
        escaping = %config.pipeline.escaping,
        "Starting rowcast server"
    );

    // Connect to the backing store
    let source = Arc::new(
        PgChangeSource::connect(
            &config.pipeline.store,
            config.pipeline.notification.clone(),
        )
        .await?,
    );

    // Build the pipeline
    let registry = Arc::new(SubscriptionRegistry::new());
    let dispatcher = Arc::new(Dispatcher::new(
        registry.clone(),
        config.pipeline.push.clone(),
    ));
    let fetcher = Arc::new(PgRowFetcher::new(source.pool().clone()));
    let pipeline = Arc::new(ChangePipeline::new(
        ChangeNormalizer::new(fetcher),
        dispatcher,
        config.pipeline.escaping,
    ));
    let manager = Arc::new(RegistrationManager::new(source.clone(), pipeline));

    // Listen before registering so no change is missed
    let (events_tx, events_rx) = registration::channel(config.pipeline.notification.event_buffer);
    let listener_task = source.listen(events_tx).await?;
    manager
        .register(&config.pipeline.notification.tables)
        .await?;

    let processor = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.run(events_rx).await })
    };

    // Set up graceful shutdown
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl+c");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(());
    });

    // Start HTTP server
    let state = AppState::new(registry, manager.clone(), config.clone());
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("rowcast listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await?;

    // Drop the registration, then stop listening
    manager.shutdown().await;
    listener_task.abort();
    let _ = processor.await;

    info!("server shutdown complete");
    Ok(())
}
