//! ptlevel-sync - PT level sensor poller
//!
//! Polls liquid-level sensors over their LAN endpoint or the vendor cloud,
//! and forwards level changes to an accessory-state sink.

mod api;
mod config;
mod error;
mod models;
mod poller;
mod sink;
mod source;

use std::sync::Arc;

use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::AppState;
use crate::poller::PollerSet;
use crate::source::Sources;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ptlevel_sync=info,tower_http=debug".into()),
        )
        .init();

    tracing::info!("Starting ptlevel-sync...");

    // Load configuration
    let config = config::Config::load()?;
    let devices = config.device_descriptors();
    tracing::info!("Configuration loaded: {} devices", devices.len());

    let sources = Sources::new(&config.poller.cloud_base_url, config.poller.request_timeout())?;
    let sink = sink::from_config(&config.sink)?;
    tracing::info!("Publishing level changes via {} sink", sink.name());

    let pollers = Arc::new(PollerSet::from_devices(
        devices,
        &sources,
        sink,
        config.poller.failure_threshold,
    ));
    if pollers.is_empty() {
        tracing::warn!("No devices configured; only the status API will run");
    }
    pollers.start(config.poller.refresh_interval()).await;

    // Build application router
    let app = api::routes(AppState {
        pollers: pollers.clone(),
    })
    .layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    // Start server
    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pollers.stop_all().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
