//! Shared application state.

use std::sync::Arc;

use crate::admin::register_core_menu;
use crate::config::ServerConfig;
use crate::errors::AppError;
use crate::hooks::HookRegistry;
use crate::plugin::provisioning::{MemoryStore, PermissionStore, SettingsStore};
use crate::plugin::{ComponentRegistry, PluginManager};
use crate::supabase::SupabaseClient;
use crate::tenant::{ResolverSettings, StaticTenantLookup, TenantLookup, TenantResolver};
use crate::tier::TierFeatureTable;

/// State shared by every handler.
///
/// The hook registry is owned here rather than held in a global, so tests
/// and embedded servers each get an isolated set of registrations.
pub struct AppState {
    pub config: ServerConfig,
    pub resolver: TenantResolver,
    pub hooks: Arc<HookRegistry>,
    pub components: Arc<ComponentRegistry>,
    pub plugins: PluginManager,
    pub tiers: TierFeatureTable,
}

impl AppState {
    /// Build state from configuration.
    ///
    /// Uses Supabase for tenant lookup and provisioning when configured, and
    /// in-memory stores otherwise.
    pub async fn new(config: ServerConfig) -> Result<Arc<Self>, AppError> {
        let (lookup, permissions, settings): (
            Arc<dyn TenantLookup>,
            Arc<dyn PermissionStore>,
            Arc<dyn SettingsStore>,
        ) = match (&config.supabase_url, &config.supabase_key) {
            (Some(url), Some(key)) => {
                let client = Arc::new(
                    SupabaseClient::new(url, key, config.lookup_timeout())
                        .map_err(|e| AppError::Config(e.to_string()))?,
                );
                tracing::info!(supabase_url = %client.base_url(), "Using Supabase tenant directory");
                (client.clone(), client.clone(), client)
            }
            _ => {
                tracing::warn!(
                    "SUPABASE_URL not configured, tenant lookups will not match any host"
                );
                let store = Arc::new(MemoryStore::new());
                (
                    Arc::new(StaticTenantLookup::new()),
                    store.clone(),
                    store,
                )
            }
        };

        Self::with_services(config, lookup, permissions, settings)
    }

    /// Build state around explicit backends.
    pub fn with_services(
        config: ServerConfig,
        lookup: Arc<dyn TenantLookup>,
        permissions: Arc<dyn PermissionStore>,
        settings: Arc<dyn SettingsStore>,
    ) -> Result<Arc<Self>, AppError> {
        let tiers = match &config.tiers_path {
            Some(path) => {
                let table = TierFeatureTable::from_file(path)?;
                tracing::info!(path = %path.display(), "Loaded tier feature table");
                table
            }
            None => TierFeatureTable::shipped(),
        };

        let resolver = TenantResolver::new(lookup, ResolverSettings::from_config(&config));

        let hooks = Arc::new(HookRegistry::new());
        let components = Arc::new(ComponentRegistry::new());
        register_core_menu(&hooks);

        let plugins = PluginManager::new(
            hooks.clone(),
            components.clone(),
            permissions,
            settings,
            config.plugins.clone(),
        );
        let summary = plugins.load_builtin();
        tracing::info!(
            loaded = summary.loaded.len(),
            failed = summary.failed.len(),
            "Plugins loaded"
        );

        Ok(Arc::new(Self {
            config,
            resolver,
            hooks,
            components,
            plugins,
            tiers,
        }))
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("address", &self.config.address())
            .field("hooks", &self.hooks)
            .field("plugins", &self.plugins)
            .finish()
    }
}
