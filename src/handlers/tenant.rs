//! Tenant-scoped read endpoints
//!
//! - `GET /api/tenant` - the resolved tenant context
//! - `GET /api/features` - features of the tenant's tier
//! - `GET /api/admin/menu` - admin menu filtered by tier access and active plugins
//! - `GET /api/admin/routes` - admin pages of the tenant's active plugins

use axum::{Json, extract::State};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::admin::{AdminRoute, MenuItem, admin_routes, menu_for_tier};
use crate::state::AppState;
use crate::tenant::{TenantContext, is_rtl};
use crate::tier::Tier;

#[derive(Debug, Serialize)]
pub struct TenantResponse {
    #[serde(flatten)]
    pub context: TenantContext,
    pub rtl: bool,
}

#[derive(Debug, Serialize)]
pub struct FeaturesResponse {
    pub tier: Tier,
    pub features: Vec<String>,
}

/// Hook arguments describing the requesting tenant.
pub(crate) fn tenant_args(context: &TenantContext) -> Value {
    json!({
        "tenant_id": context.tenant_id,
        "tenant_slug": context.tenant_slug,
        "tier": context.tier,
        "locale": context.locale,
    })
}

pub async fn get_tenant(context: TenantContext) -> Json<TenantResponse> {
    let rtl = is_rtl(&context.locale);
    Json(TenantResponse { context, rtl })
}

pub async fn get_features(
    State(state): State<Arc<AppState>>,
    context: TenantContext,
) -> Json<FeaturesResponse> {
    let features = state
        .tiers
        .resolve_features(context.tier)
        .iter()
        .cloned()
        .collect();
    Json(FeaturesResponse {
        tier: context.tier,
        features,
    })
}

pub async fn get_admin_menu(
    State(state): State<Arc<AppState>>,
    context: TenantContext,
) -> Json<Vec<MenuItem>> {
    let args = tenant_args(&context);
    Json(menu_for_tier(
        &state.hooks,
        &state.tiers,
        context.tier,
        state.plugins.active_for(&context.tenant_id),
        &args,
    ))
}

pub async fn get_admin_routes(
    State(state): State<Arc<AppState>>,
    context: TenantContext,
) -> Json<Vec<AdminRoute>> {
    let args = tenant_args(&context);
    Json(admin_routes(
        &state.hooks,
        state.plugins.active_for(&context.tenant_id),
        &args,
    ))
}
