//! Key export endpoint consumed by deployment agents.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Form, Json,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::auth::{authorize, header_token};
use super::error::ApiError;
use crate::engine::{export, HostFilter, HostKeys};
use crate::AppState;

/// Parameters of a key export request
#[derive(Debug, Default, Deserialize)]
pub struct KeysRequest {
    #[serde(rename = "API_KEY")]
    pub api_key: Option<String>,
    pub filter_type: Option<String>,
    pub filter_value: Option<String>,
}

/// `POST /api/keys` with form encoded parameters
pub async fn export_keys(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Form(request): Form<KeysRequest>,
) -> Result<Json<BTreeMap<String, HostKeys>>, ApiError> {
    handle_export(&state, &headers, request)
}

/// `GET /api/keys` with the same parameters in the query string
pub async fn export_keys_query(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(request): Query<KeysRequest>,
) -> Result<Json<BTreeMap<String, HostKeys>>, ApiError> {
    handle_export(&state, &headers, request)
}

fn handle_export(
    state: &AppState,
    headers: &HeaderMap,
    request: KeysRequest,
) -> Result<Json<BTreeMap<String, HostKeys>>, ApiError> {
    let token = request
        .api_key
        .filter(|key| !key.trim().is_empty())
        .or_else(|| header_token(headers));
    authorize(state, token.as_deref())?;

    let filter = HostFilter::parse(
        request.filter_type.as_deref(),
        request.filter_value.as_deref(),
    )?;

    let inventory = state.inventory.load();
    let document = export(&inventory, filter.as_ref())?;

    tracing::info!(
        hosts = document.len(),
        filter_type = ?filter.as_ref().map(|f| f.kind),
        "Served key export"
    );
    Ok(Json(document))
}
