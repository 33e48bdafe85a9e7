use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::error::ApiError;
use crate::AppState;

const MISSING_TOKEN: &str = "Please send your access token as parameter API_KEY!";
const UNKNOWN_TOKEN: &str = "API access token not found in configuration";

/// Token from the `Authorization` header (with or without `Bearer `) or `X-API-Key`.
///
/// Empty values are skipped.
pub fn header_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|h| h.strip_prefix("Bearer ").unwrap_or(h).trim());
    let api_key = headers
        .get("X-API-Key")
        .and_then(|h| h.to_str().ok())
        .map(str::trim);

    bearer
        .into_iter()
        .chain(api_key)
        .find(|token| !token.is_empty())
        .map(str::to_string)
}

/// Check `token` against every configured API key in constant time
pub fn token_matches(api_keys: &[String], token: &str) -> bool {
    let provided = token.as_bytes();
    let mut matched = false;
    for key in api_keys.iter().filter(|key| !key.is_empty()) {
        let expected = key.as_bytes();
        // Only compare if lengths match (constant-time check)
        if expected.len() == provided.len() && bool::from(expected.ct_eq(provided)) {
            matched = true;
        }
    }
    matched
}

/// Authorize a request carrying an optional token
pub fn authorize(state: &AppState, token: Option<&str>) -> Result<(), ApiError> {
    let token = token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized(MISSING_TOKEN))?;

    if token_matches(&state.config.auth.api_keys, token) {
        Ok(())
    } else {
        tracing::warn!("Rejected request with unknown API token");
        Err(ApiError::unauthorized(UNKNOWN_TOKEN))
    }
}

/// `token` query parameter, percent-decoded
#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Middleware for routes that take the token from a header or the `token` query parameter
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = header_token(request.headers()).or_else(|| {
        Query::<TokenQuery>::try_from_uri(request.uri())
            .ok()
            .and_then(|Query(query)| query.token)
    });

    authorize(&state, token.as_deref())?;
    Ok(next.run(request).await)
}
