//! Tenant lookup seam.
//!
//! The resolver never talks to the database directly; it goes through
//! [`TenantLookup`]. The production implementation is
//! [`crate::supabase::SupabaseClient`]. [`StaticTenantLookup`] serves a fixed
//! in-memory table and is used when no remote store is configured.

use async_trait::async_trait;
use dashmap::DashMap;

use super::context::TenantId;

/// A row returned by a tenant lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantRecord {
    pub id: TenantId,
    pub slug: Option<String>,
    /// Raw subscription tier name as stored; parsed leniently by the resolver.
    pub tier: Option<String>,
}

impl TenantRecord {
    pub fn new(id: impl Into<TenantId>) -> Self {
        Self {
            id: id.into(),
            slug: None,
            tier: None,
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_tier(mut self, tier: impl Into<String>) -> Self {
        self.tier = Some(tier.into());
        self
    }
}

/// Errors raised by a lookup backend.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("tenant lookup request failed: {0}")]
    Transport(String),

    #[error("tenant lookup returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed tenant lookup response: {0}")]
    Malformed(String),

    #[error("tenant lookup not configured: {0}")]
    NotConfigured(String),
}

/// Remote tenant directory.
///
/// Both methods return `Ok(None)` when no tenant matches; at most one record
/// is ever returned.
#[async_trait]
pub trait TenantLookup: Send + Sync {
    /// Look up a tenant by request host.
    async fn find_by_host(&self, host: &str) -> Result<Option<TenantRecord>, LookupError>;

    /// Look up a tenant by slug (first URL path segment).
    async fn find_by_slug(&self, slug: &str) -> Result<Option<TenantRecord>, LookupError>;
}

/// In-memory tenant table.
#[derive(Debug, Default)]
pub struct StaticTenantLookup {
    by_host: DashMap<String, TenantRecord>,
    by_slug: DashMap<String, TenantRecord>,
}

impl StaticTenantLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a host to a tenant. Hosts are compared lower-cased.
    pub fn with_host(self, host: &str, record: TenantRecord) -> Self {
        if let Some(slug) = &record.slug {
            self.by_slug.insert(slug.clone(), record.clone());
        }
        self.by_host.insert(host.to_ascii_lowercase(), record);
        self
    }

    /// Register a tenant reachable by slug only.
    pub fn with_slug(self, record: TenantRecord) -> Self {
        if let Some(slug) = &record.slug {
            self.by_slug.insert(slug.clone(), record);
        }
        self
    }
}

#[async_trait]
impl TenantLookup for StaticTenantLookup {
    async fn find_by_host(&self, host: &str) -> Result<Option<TenantRecord>, LookupError> {
        Ok(self
            .by_host
            .get(&host.to_ascii_lowercase())
            .map(|entry| entry.value().clone()))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<TenantRecord>, LookupError> {
        Ok(self.by_slug.get(slug).map(|entry| entry.value().clone()))
    }
}
