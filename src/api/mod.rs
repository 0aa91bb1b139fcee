//! API module - HTTP handlers and routes

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::poller::PollerSet;

/// Shared state for the status API
#[derive(Clone)]
pub struct AppState {
    pub pollers: Arc<PollerSet>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .route("/api/health", get(handlers::health_check))
        // Devices
        .route("/api/devices", get(handlers::list_devices))
        .route("/api/devices/:id", get(handlers::get_device))
        .route("/api/devices/:id/level", get(handlers::get_level))
        .route("/api/devices/:id/refresh", post(handlers::refresh_device))
        .with_state(state)
}
