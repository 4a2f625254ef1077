//! Per-request tenant context.
//!
//! A [`TenantContext`] is built once by the resolver at the start of request
//! handling and stored in the request extensions. It is never cached or
//! shared between requests.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::tier::Tier;

/// Opaque tenant identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Create a new tenant ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the tenant ID as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// How the tenant of a request was identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantSource {
    /// Resolved from the first URL path segment (tenant slug).
    Path,
    /// Resolved from the request host.
    Host,
}

impl TenantSource {
    /// Returns true if the tenant was resolved from the URL path.
    pub fn is_path_based(&self) -> bool {
        matches!(self, TenantSource::Path)
    }
}

impl fmt::Display for TenantSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantSource::Path => write!(f, "path"),
            TenantSource::Host => write!(f, "host"),
        }
    }
}

/// Resolved tenant for a single request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TenantContext {
    pub tenant_id: TenantId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_slug: Option<String>,
    /// Host used for the lookup (forwarded host preferred, port stripped).
    pub host: String,
    pub tenant_source: TenantSource,
    pub locale: String,
    pub tier: Tier,
}

impl TenantContext {
    /// Returns the tenant ID as a string reference.
    pub fn tenant_id_str(&self) -> &str {
        self.tenant_id.as_str()
    }
}
