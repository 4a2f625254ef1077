use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::plugin::PluginError;
use crate::tenant::TenantError;
use crate::tier::TierError;

/// Errors surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No tenant could be resolved for the request (404)
    #[error("No tenant found for host '{host}'")]
    TenantNotFound { host: String },

    /// Handler ran without a resolved tenant (404)
    #[error("Tenant context missing")]
    TenantContextMissing,

    /// The tenant's tier does not include a required feature (403)
    #[error("Feature '{feature}' is not available on the {tier} tier")]
    FeatureForbidden { feature: String, tier: String },

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Plugin lifecycle error
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// Tier table could not be built
    #[error(transparent)]
    Tier(#[from] TierError),

    /// Startup or configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<TenantError> for AppError {
    fn from(err: TenantError) -> Self {
        AppError::TenantNotFound {
            host: err.host().to_string(),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::TenantNotFound { .. }
            | AppError::TenantContextMissing
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::FeatureForbidden { .. } => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Plugin(err) => match err {
                PluginError::NotFound(_) => StatusCode::NOT_FOUND,
                PluginError::NotLoaded(_) | PluginError::AlreadyLoaded(_) => StatusCode::CONFLICT,
                PluginError::Provision(_) => StatusCode::BAD_GATEWAY,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Tier(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::TenantNotFound { .. } => "tenant_not_found",
            AppError::TenantContextMissing => "tenant_context_missing",
            AppError::FeatureForbidden { .. } => "feature_forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "bad_request",
            AppError::Plugin(PluginError::NotFound(_)) => "plugin_not_found",
            AppError::Plugin(PluginError::NotLoaded(_)) => "plugin_not_loaded",
            AppError::Plugin(_) => "plugin_error",
            AppError::Tier(_) => "tier_error",
            AppError::Config(_) => "config_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}
