//! Health, inventory counts and reload endpoints.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use super::error::ApiError;
use crate::engine::{stats, InventoryStats};
use crate::AppState;

pub async fn health_check() -> &'static str {
    "OK"
}

/// Counts of the currently served inventory
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<InventoryStats> {
    let inventory = state.inventory.load();
    Json(stats(&inventory))
}

#[derive(Debug, Serialize)]
pub struct ReloadResponse {
    pub reloaded: bool,
    pub stats: InventoryStats,
}

/// Re-read the database and atomically swap the served inventory
pub async fn reload(State(state): State<Arc<AppState>>) -> Result<Json<ReloadResponse>, ApiError> {
    let inventory = state.reload().await?;
    Ok(Json(ReloadResponse {
        reloaded: true,
        stats: stats(&inventory),
    }))
}
