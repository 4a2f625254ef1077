//! Regions plugin.

use serde_json::Value;
use std::sync::Arc;

use crate::admin::PLUGINS_LOADED;
use crate::hooks::HookHandle;
use crate::plugin::components::Component;
use crate::plugin::manifest::PluginManifest;
use crate::plugin::{Plugin, PluginConstructor, PluginError};

const MANIFEST: &str = include_str!("regions.json");

pub struct RegionsPlugin {
    manifest: PluginManifest,
}

impl RegionsPlugin {
    pub fn new() -> Result<Self, PluginError> {
        Ok(Self {
            manifest: PluginManifest::from_json(MANIFEST)?,
        })
    }
}

fn create() -> Result<Arc<dyn Plugin>, PluginError> {
    Ok(Arc::new(RegionsPlugin::new()?))
}

inventory::submit!(PluginConstructor::new("regions", create));

impl Plugin for RegionsPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn register(&self, hooks: &mut HookHandle, _config: &Value) -> Result<(), PluginError> {
        let name = self.manifest.name.clone();
        let version = self.manifest.version.to_string();
        hooks.add_action(PLUGINS_LOADED, "regions_init", move |_| {
            tracing::debug!(plugin = %name, version = %version, "Plugin ready");
            Ok(())
        });
        Ok(())
    }

    fn components(&self) -> Vec<(&'static str, Component)> {
        vec![(
            "RegionsManager",
            Component::with_props(|props| {
                let tenant = props["tenant_id"].as_str().unwrap_or_default();
                format!("<section data-plugin=\"regions\" data-tenant=\"{tenant}\"></section>")
            }),
        )]
    }
}
