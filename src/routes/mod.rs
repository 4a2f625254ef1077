pub mod api;

use axum::{Router, routing::get};
use std::sync::Arc;

use crate::handlers::api::health_check;
use crate::state::AppState;

/// Public routes plus the tenant-scoped API, with state applied.
///
/// Transport layers (CORS, rate limiting, security headers) are added by the
/// binary.
pub fn create_router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check));

    public_routes
        .merge(api::create_api_router(state.clone()))
        .with_state(state)
}
