//! HTTP handlers module

mod devices;

pub use self::devices::*;

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;

use super::AppState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub devices: usize,
    pub running: usize,
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "ptlevel-sync".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        devices: state.pollers.len(),
        running: state.pollers.running().await,
    })
}
