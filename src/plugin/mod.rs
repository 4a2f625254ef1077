//! Plugin system.
//!
//! A plugin is a manifest plus a `register` entry point that adds hooks to
//! the [`HookRegistry`](crate::hooks::HookRegistry), optional slot
//! components, and per-tenant `activate`/`deactivate`/`uninstall` hooks.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ inventory::submit!(PluginConstructor) ──▶ PluginManager::load    │
//! │     register(HookHandle) ─▶ menu/routes filters ─▶ components    │
//! │ plugins_loaded action ──▶ serve ──▶ activate(tenant) per request │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Registering a Built-in Plugin
//!
//! ```ignore
//! use awcms_gateway::plugin::prelude::*;
//!
//! pub struct MyPlugin { manifest: PluginManifest }
//!
//! #[async_trait]
//! impl Plugin for MyPlugin {
//!     fn manifest(&self) -> &PluginManifest { &self.manifest }
//!
//!     fn register(&self, hooks: &mut HookHandle, _config: &Value) -> Result<(), PluginError> {
//!         hooks.add_filter("email_content", "my_plugin", |body: String, _| Ok(body));
//!         Ok(())
//!     }
//! }
//!
//! inventory::submit!(PluginConstructor::new("my-plugin", || Ok(Arc::new(MyPlugin::new()))));
//! ```

pub mod builtin;
pub mod components;
pub mod lifecycle;
pub mod manager;
pub mod manifest;
pub mod provisioning;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::hooks::HookHandle;
use crate::tenant::TenantId;

pub use components::{Component, ComponentRef, ComponentRegistry, RenderedComponent};
pub use lifecycle::{ActivationState, ActivationStatus, LoadState, PluginEntry};
pub use manager::{LoadSummary, PluginManager, PluginSummary};
pub use manifest::{MenuDescriptor, PluginManifest, RouteDescriptor};
pub use provisioning::{
    ActivationReport, MemoryStore, PermissionGrant, PermissionStore, ProvisionError, SettingsStore,
};

/// Plugin-specific error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PluginError {
    /// Plugin panicked during execution
    #[error("Plugin panicked: {0}")]
    Panic(String),

    /// `register` returned an error
    #[error("Plugin registration failed: {0}")]
    RegistrationFailed(String),

    /// `activate`, `deactivate` or `uninstall` returned an error
    #[error("Plugin lifecycle hook failed: {0}")]
    LifecycleFailed(String),

    /// Invalid or unreadable manifest
    #[error("Invalid plugin manifest: {0}")]
    Manifest(String),

    /// Plugin configuration error
    #[error("Plugin configuration error: {0}")]
    ConfigurationError(String),

    /// Plugin not found
    #[error("Plugin not found: {0}")]
    NotFound(String),

    /// Plugin is known but failed to load
    #[error("Plugin not loaded: {0}")]
    NotLoaded(String),

    /// A plugin with the same slug is already loaded
    #[error("Plugin already loaded: {0}")]
    AlreadyLoaded(String),

    /// Plugin requires a different gateway version
    #[error("Plugin {plugin} requires gateway {required}, running {actual}")]
    VersionIncompatible {
        plugin: String,
        required: String,
        actual: String,
    },

    /// Provisioning store failure during a lifecycle hook
    #[error("Plugin provisioning failed: {0}")]
    Provision(#[from] ProvisionError),
}

/// Context passed to per-tenant lifecycle hooks.
#[derive(Clone)]
pub struct PluginContext {
    pub plugin_slug: String,
    pub tenant_id: TenantId,
    /// Plugin-specific configuration (from the `plugins.config` section)
    pub config: Value,
    pub settings: Arc<dyn SettingsStore>,
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin_slug", &self.plugin_slug)
            .field("tenant_id", &self.tenant_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A loadable plugin.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn manifest(&self) -> &PluginManifest;

    /// Register hooks. Called exactly once, when the plugin is loaded.
    fn register(&self, hooks: &mut HookHandle, config: &Value) -> Result<(), PluginError>;

    /// Components this plugin contributes, by name.
    fn components(&self) -> Vec<(&'static str, Component)> {
        Vec::new()
    }

    /// Enable the plugin for a tenant. Must be idempotent.
    async fn activate(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        let _ = ctx;
        Ok(())
    }

    /// Disable the plugin for a tenant. Must be idempotent and keep data.
    async fn deactivate(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        let _ = ctx;
        Ok(())
    }

    /// Remove the plugin's data for a tenant. Must be idempotent.
    async fn uninstall(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        let _ = ctx;
        Ok(())
    }
}

/// Factory for a built-in plugin.
pub type PluginFactoryFn = fn() -> Result<Arc<dyn Plugin>, PluginError>;

/// Plugin constructor for inventory-based registration
///
/// Uses a function pointer to defer manifest parsing until runtime, making
/// it compatible with `inventory::submit!`.
pub struct PluginConstructor {
    /// Plugin slug, used for filtering before construction
    pub slug: &'static str,

    /// Factory function to create the plugin
    pub create: PluginFactoryFn,
}

impl PluginConstructor {
    pub const fn new(slug: &'static str, create: PluginFactoryFn) -> Self {
        Self { slug, create }
    }
}

inventory::collect!(PluginConstructor);

/// Every plugin constructor linked into the binary, sorted by slug.
pub fn builtin_constructors() -> Vec<&'static PluginConstructor> {
    let mut constructors: Vec<&'static PluginConstructor> =
        inventory::iter::<PluginConstructor>.into_iter().collect();
    constructors.sort_by_key(|c| c.slug);
    constructors
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use super::components::{Component, ComponentRef};
    pub use super::manifest::{MenuDescriptor, PluginManifest, RouteDescriptor};
    pub use super::{Plugin, PluginConstructor, PluginContext, PluginError};
    pub use crate::hooks::{HookError, HookHandle};

    pub use async_trait::async_trait;
    pub use inventory;
    pub use serde_json::Value;
    pub use std::sync::Arc;
}
