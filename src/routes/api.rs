use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{plugins, slots, tenant};
use crate::middleware::tenant_middleware;
use crate::state::AppState;
use std::sync::Arc;

/// Tenant-scoped API routes, without tenant middleware.
fn tenant_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/tenant", get(tenant::get_tenant))
        .route("/api/features", get(tenant::get_features))
        .route("/api/admin/menu", get(tenant::get_admin_menu))
        .route("/api/admin/routes", get(tenant::get_admin_routes))
        .route("/api/plugins", get(plugins::list_plugins))
        .route("/api/plugins/{slug}", get(plugins::get_plugin))
        .route("/api/plugins/{slug}/activate", post(plugins::activate_plugin))
        .route(
            "/api/plugins/{slug}/deactivate",
            post(plugins::deactivate_plugin),
        )
        .route(
            "/api/plugins/{slug}/uninstall",
            post(plugins::uninstall_plugin),
        )
        .route("/api/slots/{slot}", get(slots::render_slot))
}

/// Create the API router
///
/// Every route is reachable both host-scoped (`/api/...`) and path-scoped
/// (`/{tenant}/api/...`). Tenant resolution runs only on matched routes.
pub fn create_api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(tenant_routes())
        .nest("/{tenant}", tenant_routes())
        .route_layer(middleware::from_fn_with_state(state, tenant_middleware))
        .layer(TraceLayer::new_for_http())
}
