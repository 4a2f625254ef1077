//! Plugin manifest (`plugin.json`).

use serde::{Deserialize, Serialize};

use super::PluginError;

/// Gateway version plugins are checked against.
pub const GATEWAY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Static plugin descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Unique plugin identifier (e.g., "regions")
    pub slug: String,

    /// Human-readable plugin name
    pub name: String,

    /// Semantic version of the plugin
    pub version: semver::Version,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub author: String,

    /// Permission keys provisioned on activation
    #[serde(default)]
    pub permissions: Vec<String>,

    /// Admin sidebar entry contributed to `admin_menu_items`
    #[serde(default)]
    pub menu: Option<MenuDescriptor>,

    /// Admin pages contributed to `admin_routes`
    #[serde(default)]
    pub routes: Vec<RouteDescriptor>,

    /// Required gateway version (semver range)
    #[serde(default = "any_version")]
    pub gateway_version: semver::VersionReq,
}

fn any_version() -> semver::VersionReq {
    semver::VersionReq::STAR
}

/// Sidebar entry declared by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuDescriptor {
    pub label: String,
    #[serde(default)]
    pub icon: Option<String>,
    pub path: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default = "default_menu_order")]
    pub order: i32,
    #[serde(default)]
    pub permission: Option<String>,
    /// Tier feature gating the entry. Defaults to `ext-<slug>`.
    #[serde(default)]
    pub feature: Option<String>,
}

fn default_menu_order() -> i32 {
    100
}

/// Admin page declared by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDescriptor {
    pub path: String,
    /// Component name within the plugin (e.g., "RegionsManager")
    pub component: String,
    #[serde(default)]
    pub permission: Option<String>,
}

impl PluginManifest {
    /// Create a manifest with minimal required fields.
    ///
    /// Falls back to 1.0.0 if `version` is not valid semver.
    pub fn new(slug: impl Into<String>, name: impl Into<String>, version: &str) -> Self {
        let parsed_version = match semver::Version::parse(version) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    version = %version,
                    error = %e,
                    "Invalid plugin version, falling back to 1.0.0"
                );
                semver::Version::new(1, 0, 0)
            }
        };

        Self {
            slug: slug.into(),
            name: name.into(),
            version: parsed_version,
            description: String::new(),
            author: String::new(),
            permissions: Vec::new(),
            menu: None,
            routes: Vec::new(),
            gateway_version: semver::VersionReq::STAR,
        }
    }

    /// Parse a `plugin.json` document.
    pub fn from_json(json: &str) -> Result<Self, PluginError> {
        let manifest: Self =
            serde_json::from_str(json).map_err(|e| PluginError::Manifest(e.to_string()))?;
        if !crate::tenant::is_valid_slug(&manifest.slug) {
            return Err(PluginError::Manifest(format!(
                "invalid plugin slug '{}'",
                manifest.slug
            )));
        }
        Ok(manifest)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_permissions(mut self, permissions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.permissions = permissions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_menu(mut self, menu: MenuDescriptor) -> Self {
        self.menu = Some(menu);
        self
    }

    pub fn with_route(mut self, route: RouteDescriptor) -> Self {
        self.routes.push(route);
        self
    }

    /// Check the manifest's gateway requirement against this build.
    pub fn check_gateway_version(&self) -> Result<(), PluginError> {
        let current = semver::Version::parse(GATEWAY_VERSION)
            .map_err(|e| PluginError::Manifest(format!("invalid gateway version: {e}")))?;
        if self.gateway_version.matches(&current) {
            Ok(())
        } else {
            Err(PluginError::VersionIncompatible {
                plugin: self.slug.clone(),
                required: self.gateway_version.to_string(),
                actual: GATEWAY_VERSION.to_string(),
            })
        }
    }

    /// Tier feature gating this plugin's menu entry.
    pub fn menu_feature(&self) -> String {
        self.menu
            .as_ref()
            .and_then(|m| m.feature.clone())
            .unwrap_or_else(|| format!("ext-{}", self.slug))
    }
}
