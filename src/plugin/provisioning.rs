//! Per-tenant provisioning performed when a plugin is activated.
//!
//! Each manifest permission is upserted on its own. A failed upsert is
//! recorded in the [`ActivationReport`] and the remaining permissions are
//! still provisioned.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;

use super::manifest::PluginManifest;
use crate::tenant::TenantId;

/// Errors raised by a provisioning store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProvisionError {
    #[error("provisioning request failed: {0}")]
    Request(String),

    #[error("provisioning returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provisioning store not configured")]
    NotConfigured,
}

/// A permission row written on activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionGrant {
    pub permission_name: String,
    pub description: String,
    pub tenant_id: TenantId,
}

/// Permission table, upserted on `permission_name`.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    async fn upsert_permission(&self, grant: &PermissionGrant) -> Result<(), ProvisionError>;
}

/// Per-tenant key/value settings, upserted on `(tenant_id, key)`.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn get_setting(&self, tenant_id: &TenantId, key: &str) -> Result<Option<Value>, ProvisionError>;

    async fn upsert_setting(&self, tenant_id: &TenantId, key: &str, value: Value) -> Result<(), ProvisionError>;

    /// Delete every setting of `tenant_id` whose key starts with `prefix`.
    async fn delete_settings(&self, tenant_id: &TenantId, prefix: &str) -> Result<(), ProvisionError>;
}

/// A permission that could not be provisioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionFailure {
    pub permission: String,
    pub error: String,
}

/// Outcome of activating a plugin for a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub plugin: String,
    pub tenant_id: TenantId,
    pub provisioned: Vec<String>,
    pub failures: Vec<ProvisionFailure>,
}

impl ActivationReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Upsert every permission declared by `manifest` for `tenant_id`.
pub async fn provision_permissions(
    store: &dyn PermissionStore,
    manifest: &PluginManifest,
    tenant_id: &TenantId,
) -> ActivationReport {
    let mut report = ActivationReport {
        plugin: manifest.slug.clone(),
        tenant_id: tenant_id.clone(),
        provisioned: Vec::new(),
        failures: Vec::new(),
    };

    for permission in &manifest.permissions {
        let grant = PermissionGrant {
            permission_name: permission.clone(),
            description: format!("Permission for {}", manifest.name),
            tenant_id: tenant_id.clone(),
        };

        match store.upsert_permission(&grant).await {
            Ok(()) => report.provisioned.push(permission.clone()),
            Err(e) => {
                tracing::warn!(
                    plugin = %manifest.slug,
                    tenant_id = %tenant_id,
                    permission = %permission,
                    error = %e,
                    "Failed to provision plugin permission"
                );
                report.failures.push(ProvisionFailure {
                    permission: permission.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    report
}

/// In-memory permission and settings store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    permissions: DashMap<String, PermissionGrant>,
    settings: DashMap<(TenantId, String), Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn permission(&self, name: &str) -> Option<PermissionGrant> {
        self.permissions.get(name).map(|p| p.value().clone())
    }

    pub fn permission_count(&self) -> usize {
        self.permissions.len()
    }
}

#[async_trait]
impl PermissionStore for MemoryStore {
    async fn upsert_permission(&self, grant: &PermissionGrant) -> Result<(), ProvisionError> {
        self.permissions
            .insert(grant.permission_name.clone(), grant.clone());
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get_setting(&self, tenant_id: &TenantId, key: &str) -> Result<Option<Value>, ProvisionError> {
        Ok(self
            .settings
            .get(&(tenant_id.clone(), key.to_string()))
            .map(|v| v.value().clone()))
    }

    async fn upsert_setting(&self, tenant_id: &TenantId, key: &str, value: Value) -> Result<(), ProvisionError> {
        self.settings
            .insert((tenant_id.clone(), key.to_string()), value);
        Ok(())
    }

    async fn delete_settings(&self, tenant_id: &TenantId, prefix: &str) -> Result<(), ProvisionError> {
        self.settings
            .retain(|(tenant, key), _| tenant != tenant_id || !key.starts_with(prefix));
        Ok(())
    }
}
