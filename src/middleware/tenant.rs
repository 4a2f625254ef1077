use axum::{
    extract::{FromRequestParts, OriginalUri, Request, State},
    http::{HeaderValue, request::Parts},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::errors::AppError;
use crate::state::AppState;
use crate::supabase::TENANT_HEADER;
use crate::tenant::{TenantContext, is_passthrough_path};

/// Tenant resolution middleware
///
/// Resolves the tenant for every request except static and internal paths
/// (`/_*`, `/favicon*`), which pass through without a context.
///
/// On success the [`TenantContext`] is inserted into request extensions and
/// the tenant id replaces any `x-tenant-id` request header. A tenant id that
/// is not a valid header value leaves the header absent. Unresolved
/// tenants end the request with a 404.
pub async fn tenant_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Nested routers see a stripped URI; the tenant slug lives in the original.
    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map(|original| original.0.clone())
        .unwrap_or_else(|| request.uri().clone());

    if is_passthrough_path(uri.path()) {
        tracing::trace!(path = %uri.path(), "Passthrough path, skipping tenant resolution");
        return Ok(next.run(request).await);
    }

    let context = match state.resolver.resolve(&uri, request.headers()).await {
        Ok(context) => context,
        Err(e) => {
            tracing::warn!(
                host = %e.host(),
                path = %uri.path(),
                error = %e,
                "Tenant not resolved"
            );
            return Err(e.into());
        }
    };

    tracing::debug!(
        tenant_id = %context.tenant_id,
        host = %context.host,
        source = ?context.tenant_source,
        tier = %context.tier,
        "Tenant resolved"
    );

    // Never forward a client-supplied tenant header.
    request.headers_mut().remove(TENANT_HEADER);
    match HeaderValue::from_str(context.tenant_id.as_str()) {
        Ok(value) => {
            request.headers_mut().insert(TENANT_HEADER, value);
        }
        Err(_) => {
            tracing::warn!(tenant_id = %context.tenant_id, "Tenant id is not a valid header value");
        }
    }
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

/// Extracts the [`TenantContext`] set by [`tenant_middleware`].
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<TenantContext>()
            .cloned()
            .ok_or(AppError::TenantContextMissing)
    }
}
