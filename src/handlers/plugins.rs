//! Plugin REST Endpoints
//!
//! # Endpoints
//!
//! - `GET /api/plugins` - List loaded plugins with the tenant's activation state
//! - `GET /api/plugins/{slug}` - Get one plugin
//! - `POST /api/plugins/{slug}/activate` - Activate a plugin for the tenant
//! - `POST /api/plugins/{slug}/deactivate` - Deactivate a plugin for the tenant
//! - `POST /api/plugins/{slug}/uninstall` - Remove the plugin's data for the tenant
//!
//! Activation changes require the `extensions` feature on the tenant's tier.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::errors::{AppError, AppResult};
use crate::plugin::{ActivationStatus, PluginError, PluginSummary};
use crate::plugin::provisioning::ProvisionFailure;
use crate::state::AppState;
use crate::tenant::TenantContext;
use crate::tier::EXTENSION_FEATURE;

/// Path parameters for plugin routes.
#[derive(Debug, Deserialize)]
pub struct PluginPath {
    pub slug: String,
}

/// Response for GET /api/plugins
#[derive(Debug, Serialize)]
pub struct PluginListResponse {
    pub plugins: Vec<PluginSummary>,
    pub total_count: usize,
}

/// Response for activation changes
#[derive(Debug, Serialize)]
pub struct ActivationResponse {
    pub plugin: String,
    pub status: ActivationStatus,
    /// Permissions written on activation
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub provisioned: Vec<String>,
    /// Permissions that could not be written
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<ProvisionFailure>,
}

/// Fail with 403 unless the tenant's tier includes `feature`.
pub(crate) fn require_feature(
    state: &AppState,
    context: &TenantContext,
    feature: &str,
) -> AppResult<()> {
    if state.tiers.check_access(context.tier, feature) {
        Ok(())
    } else {
        tracing::debug!(
            tenant_id = %context.tenant_id,
            tier = %context.tier,
            feature = %feature,
            "Feature not available on tier"
        );
        Err(AppError::FeatureForbidden {
            feature: feature.to_string(),
            tier: context.tier.to_string(),
        })
    }
}

/// List every known plugin
pub async fn list_plugins(
    State(state): State<Arc<AppState>>,
    context: TenantContext,
) -> Json<PluginListResponse> {
    let plugins = state.plugins.summaries(Some(&context.tenant_id));
    let total_count = plugins.len();
    Json(PluginListResponse {
        plugins,
        total_count,
    })
}

/// Get one plugin by slug
pub async fn get_plugin(
    State(state): State<Arc<AppState>>,
    context: TenantContext,
    Path(path): Path<PluginPath>,
) -> AppResult<Json<PluginSummary>> {
    state
        .plugins
        .summary(&path.slug, Some(&context.tenant_id))
        .map(Json)
        .ok_or_else(|| PluginError::NotFound(path.slug).into())
}

/// Activate a plugin for the requesting tenant
///
/// Permission provisioning is best effort; failures are listed in the
/// response and the plugin is still activated.
pub async fn activate_plugin(
    State(state): State<Arc<AppState>>,
    context: TenantContext,
    Path(path): Path<PluginPath>,
) -> AppResult<Json<ActivationResponse>> {
    require_feature(&state, &context, EXTENSION_FEATURE)?;

    let report = state
        .plugins
        .activate(&path.slug, &context.tenant_id)
        .await?;

    Ok(Json(ActivationResponse {
        status: state.plugins.activation_status(&path.slug, &context.tenant_id),
        plugin: path.slug,
        provisioned: report.provisioned,
        failures: report.failures,
    }))
}

/// Deactivate a plugin for the requesting tenant
pub async fn deactivate_plugin(
    State(state): State<Arc<AppState>>,
    context: TenantContext,
    Path(path): Path<PluginPath>,
) -> AppResult<Json<ActivationResponse>> {
    require_feature(&state, &context, EXTENSION_FEATURE)?;

    state
        .plugins
        .deactivate(&path.slug, &context.tenant_id)
        .await?;

    Ok(Json(ActivationResponse {
        status: state.plugins.activation_status(&path.slug, &context.tenant_id),
        plugin: path.slug,
        provisioned: Vec::new(),
        failures: Vec::new(),
    }))
}

/// Remove a plugin's data for the requesting tenant
pub async fn uninstall_plugin(
    State(state): State<Arc<AppState>>,
    context: TenantContext,
    Path(path): Path<PluginPath>,
) -> AppResult<Json<ActivationResponse>> {
    require_feature(&state, &context, EXTENSION_FEATURE)?;

    state
        .plugins
        .uninstall(&path.slug, &context.tenant_id)
        .await?;

    Ok(Json(ActivationResponse {
        status: state.plugins.activation_status(&path.slug, &context.tenant_id),
        plugin: path.slug,
        provisioned: Vec::new(),
        failures: Vec::new(),
    }))
}
