use axum::{extract::State, Json};
use std::sync::Arc;

use super::error::ApiError;
use crate::engine::{key_access_report, KeyAccessReport};
use crate::AppState;

/// Every key with the host logins it grants
pub async fn key_access(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<KeyAccessReport>>, ApiError> {
    let inventory = state.inventory.load();
    Ok(Json(key_access_report(&inventory)?))
}
