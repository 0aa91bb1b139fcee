//! Device status and refresh handlers

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use crate::api::AppState;
use crate::error::AppError;
use crate::models::{LevelResponse, RefreshResponse, RefreshStatus};
use crate::poller::PollOutcome;

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Device {} not found", id))
}

/// GET /api/devices - Snapshot of every device
pub async fn list_devices(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.pollers.snapshots().await)
}

/// GET /api/devices/:id - Snapshot of one device
pub async fn get_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let reconciler = state.pollers.get(&id).ok_or_else(|| not_found(&id))?;
    Ok(Json(reconciler.snapshot().await))
}

/// GET /api/devices/:id/level - Last published level, no fetch
pub async fn get_level(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let reconciler = state.pollers.get(&id).ok_or_else(|| not_found(&id))?;

    Ok(Json(LevelResponse {
        level: reconciler.get_level().await,
        identifier: id,
    }))
}

/// POST /api/devices/:id/refresh - Poll one device now
pub async fn refresh_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .pollers
        .refresh(&id)
        .await
        .ok_or_else(|| not_found(&id))?;

    let (status, level, error) = match outcome {
        PollOutcome::Published(v) => (RefreshStatus::Published, Some(v), None),
        PollOutcome::Unchanged(v) => (RefreshStatus::Unchanged, Some(v), None),
        PollOutcome::Failed(e) => (RefreshStatus::Failed, None, Some(e.to_string())),
        PollOutcome::Skipped => (RefreshStatus::Skipped, None, None),
    };

    tracing::debug!("[API] Manual refresh for {}: {:?}", id, status);

    Ok(Json(RefreshResponse {
        identifier: id,
        status,
        level,
        error,
    }))
}
