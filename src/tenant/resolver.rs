//! Tenant resolution.
//!
//! Provides the [`TenantResolver`] which maps an inbound request to exactly
//! one tenant or fails. Resolution order:
//!
//! 1. First URL path segment looked up by slug (when path resolution is on).
//! 2. Request host looked up through the host RPC.
//! 3. Configured fallback tenant, for hosts listed in `fallback_hosts`.
//!
//! Lookup errors and empty results are equivalent for the caller: both end
//! in [`TenantError`], which the middleware turns into a terminal 404.
//! Nothing is cached; every call performs a fresh lookup.

use http::{HeaderMap, Uri};
use std::sync::Arc;

use super::context::{TenantContext, TenantSource};
use super::host::{host_matches, path_slug, request_host};
use super::locale::{DEFAULT_LOCALE, detect_locale};
use super::lookup::{LookupError, TenantLookup, TenantRecord};
use crate::config::ServerConfig;
use crate::tier::Tier;

/// Resolution failure. Always terminal for the request.
#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("tenant not found for host '{host}'")]
    NotFound { host: String },

    #[error("tenant lookup failed for host '{host}': {source}")]
    Lookup {
        host: String,
        #[source]
        source: LookupError,
    },
}

impl TenantError {
    /// The host that was attempted.
    pub fn host(&self) -> &str {
        match self {
            TenantError::NotFound { host } | TenantError::Lookup { host, .. } => host,
        }
    }
}

/// Resolver behaviour derived from configuration.
#[derive(Debug, Clone)]
pub struct ResolverSettings {
    /// Development mode enables `dev_tenant_host`.
    pub dev_mode: bool,
    /// Host substituted for the request host in development mode.
    pub dev_tenant_host: Option<String>,
    /// Try the first path segment as a tenant slug before the host.
    pub path_resolution: bool,
    /// Slug of the tenant served for `fallback_hosts` when nothing else matches.
    pub fallback_slug: Option<String>,
    pub fallback_hosts: Vec<String>,
    pub default_locale: String,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            dev_mode: false,
            dev_tenant_host: None,
            path_resolution: true,
            fallback_slug: None,
            fallback_hosts: Vec::new(),
            default_locale: DEFAULT_LOCALE.to_string(),
        }
    }
}

impl ResolverSettings {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            dev_mode: config.is_development(),
            dev_tenant_host: config.tenant.dev_tenant_host.clone(),
            path_resolution: config.tenant.path_resolution,
            fallback_slug: config.tenant.fallback_slug.clone(),
            fallback_hosts: config.tenant.fallback_hosts.clone(),
            default_locale: config.tenant.default_locale.clone(),
        }
    }
}

/// Maps requests to tenants through a [`TenantLookup`].
pub struct TenantResolver {
    lookup: Arc<dyn TenantLookup>,
    settings: ResolverSettings,
}

impl TenantResolver {
    pub fn new(lookup: Arc<dyn TenantLookup>, settings: ResolverSettings) -> Self {
        Self { lookup, settings }
    }

    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// The host a request will be looked up under.
    ///
    /// Applies the development override when enabled.
    pub fn lookup_host(&self, headers: &HeaderMap) -> String {
        if self.settings.dev_mode {
            if let Some(dev_host) = self.settings.dev_tenant_host.as_deref() {
                return dev_host.to_ascii_lowercase();
            }
        }
        request_host(headers).unwrap_or_default()
    }

    /// Resolve the tenant owning a request.
    pub async fn resolve(&self, uri: &Uri, headers: &HeaderMap) -> Result<TenantContext, TenantError> {
        let host = self.lookup_host(headers);
        let locale = detect_locale(headers, &self.settings.default_locale);

        if self.settings.path_resolution {
            if let Some(slug) = path_slug(uri.path()) {
                match self.lookup.find_by_slug(slug).await {
                    Ok(Some(record)) => {
                        tracing::debug!(slug = %slug, tenant_id = %record.id, "Tenant resolved from path");
                        return Ok(self.build(record, Some(slug), host, TenantSource::Path, locale));
                    }
                    Ok(None) => {
                        tracing::debug!(slug = %slug, "No tenant for path slug, falling back to host");
                    }
                    Err(e) => {
                        tracing::debug!(slug = %slug, error = %e, "Slug lookup failed, falling back to host");
                    }
                }
            }
        }

        if host.is_empty() {
            return Err(TenantError::NotFound { host });
        }

        let mut last_error = None;
        match self.lookup.find_by_host(&host).await {
            Ok(Some(record)) => {
                tracing::debug!(host = %host, tenant_id = %record.id, "Tenant resolved from host");
                return Ok(self.build(record, None, host, TenantSource::Host, locale));
            }
            Ok(None) => {}
            Err(e) => last_error = Some(e),
        }

        if let Some(fallback_slug) = self.fallback_slug_for(&host) {
            match self.lookup.find_by_slug(fallback_slug).await {
                Ok(Some(record)) => {
                    tracing::info!(host = %host, slug = %fallback_slug, "Serving fallback tenant for host");
                    return Ok(self.build(
                        record,
                        Some(fallback_slug),
                        host,
                        TenantSource::Host,
                        locale,
                    ));
                }
                Ok(None) => {}
                Err(e) => last_error = Some(e),
            }
        }

        Err(match last_error {
            Some(source) => TenantError::Lookup { host, source },
            None => TenantError::NotFound { host },
        })
    }

    fn fallback_slug_for(&self, host: &str) -> Option<&str> {
        let slug = self.settings.fallback_slug.as_deref()?;
        self.settings
            .fallback_hosts
            .iter()
            .any(|domain| host_matches(host, domain))
            .then_some(slug)
    }

    fn build(
        &self,
        record: TenantRecord,
        requested_slug: Option<&str>,
        host: String,
        source: TenantSource,
        locale: String,
    ) -> TenantContext {
        let tier = record
            .tier
            .as_deref()
            .map(Tier::from_name)
            .unwrap_or_default();

        TenantContext {
            tenant_id: record.id,
            tenant_slug: record.slug.or_else(|| requested_slug.map(str::to_string)),
            host,
            tenant_source: source,
            locale,
            tier,
        }
    }
}
