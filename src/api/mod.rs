mod audit;
pub mod auth;
pub mod error;
mod keys;
mod system;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Key export (token in form, query string or header; checked by the handler)
    let key_routes = Router::new().route(
        "/keys",
        post(keys::export_keys).get(keys::export_keys_query),
    );

    // Protected API routes
    let api_routes = Router::new()
        .route("/audit", get(audit::key_access))
        .route("/stats", get(system::get_stats))
        .route("/reload", post(system::reload))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .merge(key_routes);

    Router::new()
        .route("/health", get(system::health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
