//! Plugin manager.
//!
//! Owns loaded plugins and their per-tenant activation state. Loading calls
//! `register` once inside panic isolation, then contributes the manifest's
//! menu entry and routes to the admin slots and registers the plugin's
//! components. A plugin that fails to load leaves nothing registered.

use dashmap::DashMap;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use super::components::ComponentRegistry;
use super::lifecycle::{ActivationStatus, LoadState, PluginEntry};
use super::manifest::PluginManifest;
use super::provisioning::{ActivationReport, PermissionStore, SettingsStore, provision_permissions};
use super::{Plugin, PluginContext, PluginError, builtin_constructors};
use crate::admin::{
    ADMIN_MENU_ITEMS, ADMIN_ROUTES, AdminRoute, MenuItem, PLUGINS_LOADED, plugin_menu_item,
    plugin_routes,
};
use crate::config::PluginConfig;
use crate::hooks::isolation::{call_preserving_error, call_preserving_error_async};
use crate::hooks::{HookHandle, HookRegistry, Registrations};
use crate::tenant::TenantId;

struct LoadedPlugin {
    plugin: Arc<dyn Plugin>,
    state: LoadState,
    registrations: Registrations,
    error: Option<String>,
}

/// A plugin that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedPlugin {
    pub slug: String,
    pub error: String,
}

/// Outcome of loading a batch of plugins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub loaded: Vec<String>,
    pub failed: Vec<FailedPlugin>,
}

/// Plugin listing entry.
#[derive(Debug, Clone, Serialize)]
pub struct PluginSummary {
    pub slug: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub author: String,
    pub permissions: Vec<String>,
    pub state: LoadState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Activation for the requesting tenant, when one is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation: Option<ActivationStatus>,
}

/// Loads plugins and runs their per-tenant lifecycle.
pub struct PluginManager {
    hooks: Arc<HookRegistry>,
    components: Arc<ComponentRegistry>,
    permissions: Arc<dyn PermissionStore>,
    settings: Arc<dyn SettingsStore>,
    config: PluginConfig,
    plugins: DashMap<String, LoadedPlugin>,
    activations: DashMap<(String, TenantId), PluginEntry>,
}

impl PluginManager {
    pub fn new(
        hooks: Arc<HookRegistry>,
        components: Arc<ComponentRegistry>,
        permissions: Arc<dyn PermissionStore>,
        settings: Arc<dyn SettingsStore>,
        config: PluginConfig,
    ) -> Self {
        Self {
            hooks,
            components,
            permissions,
            settings,
            config,
            plugins: DashMap::new(),
            activations: DashMap::new(),
        }
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Load every built-in plugin selected by configuration, then fire
    /// `plugins_loaded`.
    pub fn load_builtin(&self) -> LoadSummary {
        if !self.config.enabled {
            tracing::info!("Plugins disabled by configuration");
            return self.finish_loading(LoadSummary::default());
        }

        let mut summary = LoadSummary::default();
        for constructor in builtin_constructors() {
            if !self.config.is_selected(constructor.slug) {
                tracing::debug!(plugin = %constructor.slug, "Plugin not selected, skipping");
                continue;
            }

            let created = call_preserving_error(constructor.create, PluginError::Panic);
            match created {
                Ok(plugin) => self.load_into(plugin, &mut summary),
                Err(e) => {
                    tracing::error!(plugin = %constructor.slug, error = %e, "Failed to construct plugin");
                    summary.failed.push(FailedPlugin {
                        slug: constructor.slug.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        self.finish_loading(summary)
    }

    /// Load the given plugins, then fire `plugins_loaded`.
    pub fn load_all(&self, plugins: Vec<Arc<dyn Plugin>>) -> LoadSummary {
        let mut summary = LoadSummary::default();
        for plugin in plugins {
            self.load_into(plugin, &mut summary);
        }
        self.finish_loading(summary)
    }

    fn load_into(&self, plugin: Arc<dyn Plugin>, summary: &mut LoadSummary) {
        let slug = plugin.manifest().slug.clone();
        match self.load(plugin) {
            Ok(()) => summary.loaded.push(slug),
            Err(e) => summary.failed.push(FailedPlugin {
                slug,
                error: e.to_string(),
            }),
        }
    }

    fn finish_loading(&self, summary: LoadSummary) -> LoadSummary {
        let args = json!({
            "total": summary.loaded.len() + summary.failed.len(),
            "loaded": summary.loaded,
            "failed": summary.failed.iter().map(|f| f.slug.as_str()).collect::<Vec<_>>(),
        });
        let report = self.hooks.do_action(PLUGINS_LOADED, &args);
        tracing::info!(
            loaded = summary.loaded.len(),
            failed = summary.failed.len(),
            listeners = report.invoked,
            "Plugins loaded"
        );
        summary
    }

    /// Load one plugin: version check, `register`, admin contributions,
    /// components.
    pub fn load(&self, plugin: Arc<dyn Plugin>) -> Result<(), PluginError> {
        let manifest = plugin.manifest().clone();
        let slug = manifest.slug.clone();

        if self
            .plugins
            .get(&slug)
            .is_some_and(|p| p.state == LoadState::Loaded)
        {
            return Err(PluginError::AlreadyLoaded(slug));
        }

        let result = manifest
            .check_gateway_version()
            .and_then(|()| self.register_plugin(&plugin, &manifest));

        match result {
            Ok(registrations) => {
                tracing::info!(
                    plugin = %slug,
                    version = %manifest.version,
                    hooks = registrations.len(),
                    "Plugin loaded"
                );
                self.plugins.insert(
                    slug,
                    LoadedPlugin {
                        plugin,
                        state: LoadState::Loaded,
                        registrations,
                        error: None,
                    },
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(plugin = %slug, error = %e, "Plugin failed to load");
                self.plugins.insert(
                    slug,
                    LoadedPlugin {
                        plugin,
                        state: LoadState::Failed,
                        registrations: Registrations::default(),
                        error: Some(e.to_string()),
                    },
                );
                Err(e)
            }
        }
    }

    fn register_plugin(&self, plugin: &Arc<dyn Plugin>, manifest: &PluginManifest) -> Result<Registrations, PluginError> {
        let slug = manifest.slug.as_str();
        let config = self.config.config_for(slug);
        let mut handle = HookHandle::new(self.hooks.clone(), slug);

        let registered = call_preserving_error(|| plugin.register(&mut handle, &config), PluginError::Panic);
        if let Err(e) = registered {
            handle.finish().remove_from(&self.hooks);
            return Err(e);
        }

        contribute_admin(&mut handle, manifest);

        match call_preserving_error(|| Ok(plugin.components()), PluginError::Panic) {
            Ok(components) => {
                for (name, component) in components {
                    self.components.register(slug, name, component);
                }
            }
            Err(e) => {
                handle.finish().remove_from(&self.hooks);
                return Err(e);
            }
        }

        Ok(handle.finish())
    }

    /// Remove a plugin with all its hooks, components and activation state.
    pub fn unload(&self, slug: &str) -> bool {
        let Some((_, loaded)) = self.plugins.remove(slug) else {
            return false;
        };
        let hooks = loaded.registrations.remove_from(&self.hooks);
        let components = self.components.unregister_plugin(slug);
        self.activations.retain(|(plugin, _), _| plugin != slug);
        tracing::info!(plugin = %slug, hooks, components, "Plugin unloaded");
        true
    }

    // =========================================================================
    // Per-tenant lifecycle
    // =========================================================================

    /// Activate a plugin for a tenant.
    ///
    /// Provisions every manifest permission (failures are collected, not
    /// fatal), then runs the plugin's own `activate` hook.
    pub async fn activate(&self, slug: &str, tenant_id: &TenantId) -> Result<ActivationReport, PluginError> {
        let plugin = self.loaded(slug)?;

        let report = provision_permissions(self.permissions.as_ref(), plugin.manifest(), tenant_id).await;

        let ctx = self.context(slug, tenant_id);
        let result = call_preserving_error_async(plugin.activate(&ctx), PluginError::Panic).await;

        let mut entry = self
            .activations
            .entry((slug.to_string(), tenant_id.clone()))
            .or_default();
        match result {
            Ok(()) => {
                entry.record_activation();
                tracing::info!(
                    plugin = %slug,
                    tenant_id = %tenant_id,
                    provisioned = report.provisioned.len(),
                    failed = report.failures.len(),
                    "Plugin activated"
                );
                Ok(report)
            }
            Err(e) => {
                entry.record_error(e.to_string());
                tracing::error!(plugin = %slug, tenant_id = %tenant_id, error = %e, "Plugin activation failed");
                Err(e)
            }
        }
    }

    /// Deactivate a plugin for a tenant. Plugin data is kept.
    pub async fn deactivate(&self, slug: &str, tenant_id: &TenantId) -> Result<(), PluginError> {
        let plugin = self.loaded(slug)?;
        let ctx = self.context(slug, tenant_id);
        let result = call_preserving_error_async(plugin.deactivate(&ctx), PluginError::Panic).await;

        let mut entry = self
            .activations
            .entry((slug.to_string(), tenant_id.clone()))
            .or_default();
        match result {
            Ok(()) => {
                entry.record_deactivation();
                tracing::info!(plugin = %slug, tenant_id = %tenant_id, "Plugin deactivated");
                Ok(())
            }
            Err(e) => {
                entry.record_error(e.to_string());
                tracing::error!(plugin = %slug, tenant_id = %tenant_id, error = %e, "Plugin deactivation failed");
                Err(e)
            }
        }
    }

    /// Remove a plugin's data for a tenant and forget its activation.
    ///
    /// Permissions provisioned on activation are kept; they are shared by
    /// name across tenants.
    pub async fn uninstall(&self, slug: &str, tenant_id: &TenantId) -> Result<(), PluginError> {
        let plugin = self.loaded(slug)?;
        let ctx = self.context(slug, tenant_id);
        let result = call_preserving_error_async(plugin.uninstall(&ctx), PluginError::Panic).await;

        let key = (slug.to_string(), tenant_id.clone());
        match result {
            Ok(()) => {
                self.activations.remove(&key);
                tracing::info!(plugin = %slug, tenant_id = %tenant_id, "Plugin uninstalled");
                Ok(())
            }
            Err(e) => {
                self.activations
                    .entry(key)
                    .or_default()
                    .record_error(e.to_string());
                tracing::error!(plugin = %slug, tenant_id = %tenant_id, error = %e, "Plugin uninstall failed");
                Err(e)
            }
        }
    }

    pub fn activation_status(&self, slug: &str, tenant_id: &TenantId) -> ActivationStatus {
        self.activations
            .get(&(slug.to_string(), tenant_id.clone()))
            .map(|entry| entry.status())
            .unwrap_or_default()
    }

    pub fn is_active(&self, slug: &str, tenant_id: &TenantId) -> bool {
        self.is_loaded(slug)
            && self
                .activations
                .get(&(slug.to_string(), tenant_id.clone()))
                .is_some_and(|entry| entry.state.is_active())
    }

    /// Predicate over plugin slugs: loaded and active for `tenant_id`.
    pub fn active_for<'a>(&'a self, tenant_id: &'a TenantId) -> impl Fn(&str) -> bool + 'a {
        move |slug: &str| self.is_active(slug, tenant_id)
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn manifest(&self, slug: &str) -> Option<PluginManifest> {
        self.plugins.get(slug).map(|p| p.plugin.manifest().clone())
    }

    pub fn is_loaded(&self, slug: &str) -> bool {
        self.plugins
            .get(slug)
            .is_some_and(|p| p.state == LoadState::Loaded)
    }

    pub fn summary(&self, slug: &str, tenant_id: Option<&TenantId>) -> Option<PluginSummary> {
        let summary = {
            let loaded = self.plugins.get(slug)?;
            let manifest = loaded.plugin.manifest();
            PluginSummary {
                slug: manifest.slug.clone(),
                name: manifest.name.clone(),
                version: manifest.version.to_string(),
                description: manifest.description.clone(),
                author: manifest.author.clone(),
                permissions: manifest.permissions.clone(),
                state: loaded.state,
                error: loaded.error.clone(),
                activation: None,
            }
        };
        Some(PluginSummary {
            activation: tenant_id.map(|t| self.activation_status(slug, t)),
            ..summary
        })
    }

    /// Every known plugin, sorted by slug.
    pub fn summaries(&self, tenant_id: Option<&TenantId>) -> Vec<PluginSummary> {
        let mut slugs: Vec<String> = self.plugins.iter().map(|p| p.key().clone()).collect();
        slugs.sort();
        slugs
            .iter()
            .filter_map(|slug| self.summary(slug, tenant_id))
            .collect()
    }

    fn loaded(&self, slug: &str) -> Result<Arc<dyn Plugin>, PluginError> {
        let loaded = self
            .plugins
            .get(slug)
            .ok_or_else(|| PluginError::NotFound(slug.to_string()))?;
        match loaded.state {
            LoadState::Loaded => Ok(loaded.plugin.clone()),
            LoadState::Failed => Err(PluginError::NotLoaded(slug.to_string())),
        }
    }

    fn context(&self, slug: &str, tenant_id: &TenantId) -> PluginContext {
        PluginContext {
            plugin_slug: slug.to_string(),
            tenant_id: tenant_id.clone(),
            config: self.config.config_for(slug),
            settings: self.settings.clone(),
        }
    }
}

fn contribute_admin(handle: &mut HookHandle, manifest: &PluginManifest) {
    let slug = manifest.slug.as_str();

    if let Some(item) = plugin_menu_item(manifest) {
        handle.add_filter(ADMIN_MENU_ITEMS, &format!("{slug}_menu"), move |mut items: Vec<MenuItem>, _: &Value| {
            items.push(item.clone());
            Ok(items)
        });
    }

    let routes = plugin_routes(manifest);
    if !routes.is_empty() {
        handle.add_filter(ADMIN_ROUTES, &format!("{slug}_routes"), move |mut list: Vec<AdminRoute>, _: &Value| {
            list.extend(routes.iter().cloned());
            Ok(list)
        });
    }
}

impl std::fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let plugins: HashMap<String, LoadState> = self
            .plugins
            .iter()
            .map(|p| (p.key().clone(), p.state))
            .collect();
        f.debug_struct("PluginManager")
            .field("plugins", &plugins)
            .field("activations", &self.activations.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookError;
    use crate::plugin::components::Component;
    use crate::plugin::manifest::{MenuDescriptor, RouteDescriptor};
    use crate::plugin::provisioning::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestPlugin {
        manifest: PluginManifest,
        register_calls: AtomicUsize,
        fail_register: bool,
        fail_activate: bool,
    }

    impl TestPlugin {
        fn new(slug: &str) -> Self {
            let manifest = PluginManifest::new(slug, "Test Plugin", "1.0.0")
                .with_permissions(["test.read", "test.write"])
                .with_menu(MenuDescriptor {
                    label: "Test".into(),
                    icon: None,
                    path: "test".into(),
                    parent: None,
                    group: None,
                    order: 1,
                    permission: None,
                    feature: None,
                })
                .with_route(RouteDescriptor {
                    path: "test".into(),
                    component: "TestPage".into(),
                    permission: None,
                });
            Self {
                manifest,
                register_calls: AtomicUsize::new(0),
                fail_register: false,
                fail_activate: false,
            }
        }
    }

    #[async_trait]
    impl Plugin for TestPlugin {
        fn manifest(&self) -> &PluginManifest {
            &self.manifest
        }

        fn register(&self, hooks: &mut HookHandle, _config: &Value) -> Result<(), PluginError> {
            self.register_calls.fetch_add(1, Ordering::SeqCst);
            hooks.add_filter("email_content", "test", |body: String, _| Ok(body + "!"));
            if self.fail_register {
                panic!("register blew up");
            }
            Ok(())
        }

        fn components(&self) -> Vec<(&'static str, Component)> {
            vec![("TestPage", Component::fixed(|| "<p>test</p>".into()))]
        }

        async fn activate(&self, _ctx: &PluginContext) -> Result<(), PluginError> {
            if self.fail_activate {
                return Err(PluginError::LifecycleFailed("nope".into()));
            }
            Ok(())
        }
    }

    fn manager() -> (PluginManager, Arc<HookRegistry>, Arc<ComponentRegistry>, Arc<MemoryStore>) {
        let hooks = Arc::new(HookRegistry::new());
        let components = Arc::new(ComponentRegistry::new());
        let store = Arc::new(MemoryStore::new());
        let manager = PluginManager::new(
            hooks.clone(),
            components.clone(),
            store.clone(),
            store.clone(),
            PluginConfig::default(),
        );
        (manager, hooks, components, store)
    }

    #[test]
    fn test_load_registers_hooks_and_contributions() {
        let (manager, hooks, components, _) = manager();
        let plugin = Arc::new(TestPlugin::new("test"));

        let summary = manager.load_all(vec![plugin.clone()]);
        assert_eq!(summary.loaded, vec!["test"]);
        assert_eq!(plugin.register_calls.load(Ordering::SeqCst), 1);

        assert!(hooks.has_filter("email_content", "test"));
        assert!(hooks.has_filter(ADMIN_MENU_ITEMS, "test_menu"));
        assert!(hooks.has_filter(ADMIN_ROUTES, "test_routes"));
        assert_eq!(components.keys(), vec!["test:TestPage"]);

        let routes = crate::admin::admin_routes(&hooks, |_| true, &Value::Null);
        assert_eq!(routes[0].component, "test:TestPage");
    }

    #[test]
    fn test_load_twice_is_rejected() {
        let (manager, ..) = manager();
        manager.load(Arc::new(TestPlugin::new("test"))).unwrap();
        let err = manager.load(Arc::new(TestPlugin::new("test"))).unwrap_err();
        assert_eq!(err, PluginError::AlreadyLoaded("test".into()));
    }

    #[test]
    fn test_panicking_register_leaves_nothing() {
        let (manager, hooks, components, _) = manager();
        let mut plugin = TestPlugin::new("broken");
        plugin.fail_register = true;

        let summary = manager.load_all(vec![Arc::new(plugin), Arc::new(TestPlugin::new("ok"))]);
        assert_eq!(summary.loaded, vec!["ok"]);
        assert_eq!(summary.failed[0].slug, "broken");

        assert!(!hooks.has_filter(ADMIN_MENU_ITEMS, "broken_menu"));
        assert!(!components.keys().iter().any(|k| k.starts_with("broken:")));
        assert!(!manager.is_loaded("broken"));
        assert_eq!(manager.summary("broken", None).unwrap().state, LoadState::Failed);
    }

    #[test]
    fn test_plugins_loaded_fired_with_counts() {
        let (manager, hooks, ..) = manager();
        let seen = Arc::new(parking_lot::Mutex::new(Value::Null));
        let s = seen.clone();
        hooks.add_action(PLUGINS_LOADED, "observer", move |args| {
            *s.lock() = args.clone();
            Ok::<(), HookError>(())
        });

        manager.load_all(vec![Arc::new(TestPlugin::new("test"))]);
        assert_eq!(seen.lock()["total"], 1);
        assert_eq!(seen.lock()["loaded"][0], "test");
    }

    #[tokio::test]
    async fn test_activate_and_deactivate() {
        let (manager, _, _, store) = manager();
        manager.load(Arc::new(TestPlugin::new("test"))).unwrap();
        let tenant = TenantId::new("t-1");

        let report = manager.activate("test", &tenant).await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.provisioned, vec!["test.read", "test.write"]);
        assert_eq!(store.permission_count(), 2);
        assert!(manager.is_active("test", &tenant));
        assert!(!manager.is_active("test", &TenantId::new("t-2")));

        manager.activate("test", &tenant).await.unwrap();
        assert_eq!(manager.activation_status("test", &tenant).activation_count, 2);
        assert_eq!(store.permission_count(), 2);

        manager.deactivate("test", &tenant).await.unwrap();
        assert!(!manager.is_active("test", &tenant));
        manager.deactivate("test", &tenant).await.unwrap();
    }

    #[tokio::test]
    async fn test_uninstall_forgets_activation() {
        let (manager, ..) = manager();
        manager.load(Arc::new(TestPlugin::new("test"))).unwrap();
        let tenant = TenantId::new("t-1");

        manager.activate("test", &tenant).await.unwrap();
        manager.uninstall("test", &tenant).await.unwrap();
        assert!(!manager.is_active("test", &tenant));
        assert_eq!(manager.activation_status("test", &tenant).activation_count, 0);

        manager.uninstall("test", &tenant).await.unwrap();
        let err = manager.uninstall("missing", &tenant).await.unwrap_err();
        assert_eq!(err, PluginError::NotFound("missing".into()));
    }

    #[test]
    fn test_failed_load_keeps_hook_it_replaced() {
        let (manager, hooks, ..) = manager();
        manager.load(Arc::new(TestPlugin::new("ok"))).unwrap();

        let mut broken = TestPlugin::new("broken");
        broken.fail_register = true;
        assert!(manager.load(Arc::new(broken)).is_err());

        assert!(hooks.has_filter("email_content", "test"));
        let body = hooks.apply_filters("email_content", "hi".to_string(), &Value::Null);
        assert_eq!(body, "hi!");
    }

    #[tokio::test]
    async fn test_active_for_tracks_activation() {
        let (manager, ..) = manager();
        manager.load(Arc::new(TestPlugin::new("test"))).unwrap();
        let tenant = TenantId::new("t-1");
        manager.activate("test", &tenant).await.unwrap();
        let active = manager.active_for(&tenant);
        assert!(active("test"));
        assert!(!active("other"));
        drop(active);

        manager.unload("test");
        assert!(!manager.is_active("test", &tenant));
    }

    #[tokio::test]
    async fn test_failed_activate_hook_marks_failed() {
        let (manager, ..) = manager();
        let mut plugin = TestPlugin::new("test");
        plugin.fail_activate = true;
        manager.load(Arc::new(plugin)).unwrap();
        let tenant = TenantId::new("t-1");

        assert!(manager.activate("test", &tenant).await.is_err());
        let status = manager.activation_status("test", &tenant);
        assert_eq!(status.state, crate::plugin::ActivationState::Failed);
        assert_eq!(status.error_count, 1);
    }

    #[tokio::test]
    async fn test_activate_unknown_plugin() {
        let (manager, ..) = manager();
        let err = manager.activate("missing", &TenantId::new("t")).await.unwrap_err();
        assert_eq!(err, PluginError::NotFound("missing".into()));
    }

    #[tokio::test]
    async fn test_unload_removes_everything() {
        let (manager, hooks, components, _) = manager();
        manager.load(Arc::new(TestPlugin::new("test"))).unwrap();
        manager.activate("test", &TenantId::new("t-1")).await.unwrap();

        assert!(manager.unload("test"));
        assert!(!manager.unload("test"));
        assert!(hooks.filter_keys(ADMIN_MENU_ITEMS).is_empty());
        assert!(!hooks.has_filter("email_content", "test"));
        assert!(components.keys().is_empty());
        assert!(manager.summaries(None).is_empty());
    }
}
