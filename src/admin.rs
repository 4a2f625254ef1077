//! Admin navigation slots.
//!
//! The sidebar and admin page table are both built by applying filters: the
//! core menu registers first at priority 0, plugins append after it.
//! Entries contributed by a plugin are only served to tenants that have the
//! plugin active.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hooks::HookRegistry;
use crate::tier::{Tier, TierFeatureTable};

/// Filter slot: `Vec<MenuItem>`.
pub const ADMIN_MENU_ITEMS: &str = "admin_menu_items";
/// Filter slot: `Vec<AdminRoute>`.
pub const ADMIN_ROUTES: &str = "admin_routes";
/// Action fired once after all plugins are loaded.
pub const PLUGINS_LOADED: &str = "plugins_loaded";
/// Filter slot: `Vec<ComponentRef>` rendered on the dashboard.
pub const DASHBOARD_WIDGETS: &str = "dashboard_widgets";

const CORE_MENU_KEY: &str = "core_menu";
const CORE_MENU_PRIORITY: i32 = 0;
const PLUGIN_GROUP_ORDER: i32 = 900;

/// Where a menu entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MenuSource {
    Core,
    Plugin,
}

/// One sidebar entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: String,
    /// Tier feature key gating the entry.
    pub key: String,
    pub label: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    pub group: String,
    pub group_order: i32,
    pub order: i32,
    pub source: MenuSource,
    /// Contributing plugin, for plugin entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,
}

/// One admin page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRoute {
    pub path: String,
    /// Namespaced component key (`<plugin>:<Name>`).
    pub component: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
    pub plugin: String,
}

// (id, label, path, icon, permission, group, group_order, order)
type CoreEntry = (&'static str, &'static str, &'static str, &'static str, &'static str, &'static str, i32, i32);

const CORE_MENU: &[CoreEntry] = &[
    ("home", "Dashboard", "home", "LayoutDashboard", "", "CONTENT", 10, 10),
    ("articles", "Articles", "articles", "FileText", "tenant.article.read", "CONTENT", 10, 20),
    ("pages", "Pages", "pages", "FileEdit", "tenant.page.read", "CONTENT", 10, 30),
    ("visual_builder", "Visual Builder", "visual-pages", "Layout", "tenant.page.read", "CONTENT", 10, 35),
    ("themes", "Themes", "themes", "Palette", "tenant.theme.read", "CONTENT", 10, 40),
    ("portfolio", "Portfolio", "portfolio", "Briefcase", "tenant.portfolio.read", "CONTENT", 10, 50),
    ("testimonials", "Testimonials", "testimonies", "MessageSquareQuote", "tenant.testimonies.read", "CONTENT", 10, 60),
    ("announcements", "Announcements", "announcements", "Megaphone", "tenant.announcements.read", "CONTENT", 10, 70),
    ("promotions", "Promotions", "promotions", "Tag", "tenant.promotions.read", "CONTENT", 10, 80),
    ("contact_messages", "Contact Messages", "inbox", "Inbox", "tenant.contact_messages.read", "CONTENT", 10, 90),
    ("files", "Media Library", "files", "FolderOpen", "tenant.media.read", "MEDIA", 20, 10),
    ("photo_gallery", "Photo Gallery", "photo-gallery", "Image", "tenant.photo_gallery.read", "MEDIA", 20, 20),
    ("video_gallery", "Video Gallery", "video-gallery", "Video", "tenant.video_gallery.read", "MEDIA", 20, 30),
    ("products", "Products", "products", "Package", "tenant.products.read", "COMMERCE", 30, 10),
    ("product_types", "Product Types", "product-types", "Box", "tenant.product_types.read", "COMMERCE", 30, 20),
    ("orders", "Orders", "orders", "ShoppingCart", "tenant.orders.read", "COMMERCE", 30, 30),
    ("menus", "Menu Manager", "menus", "Menu", "tenant.menu.read", "NAVIGATION", 40, 10),
    ("categories", "Categories", "categories", "FolderTree", "tenant.categories.read", "NAVIGATION", 40, 20),
    ("tags", "Tags", "tags", "Hash", "tenant.tag.read", "NAVIGATION", 40, 30),
    ("users", "Users", "users", "Users", "tenant.user.read", "USERS", 50, 10),
    ("roles", "Roles & Permissions", "roles", "Shield", "tenant.user.read", "USERS", 50, 20),
    ("seo_manager", "SEO Manager", "seo", "Search", "tenant.setting.read", "SYSTEM", 60, 10),
    ("languages", "Languages", "languages", "Languages", "tenant.setting.read", "SYSTEM", 60, 20),
    ("extensions", "Extensions", "extensions", "Puzzle", "platform.module.read", "SYSTEM", 60, 30),
    ("sidebar_manager", "Sidebar Manager", "admin-navigation", "List", "tenant.setting.update", "SYSTEM", 60, 40),
    ("notifications", "Notifications", "notifications", "MessageSquareQuote", "tenant.notification.read", "SYSTEM", 60, 50),
    ("audit_logs", "Audit Logs", "audit-logs", "FileClock", "tenant.audit.read", "SYSTEM", 60, 60),
    ("settings_branding", "Branding", "settings/branding", "Palette", "tenant.setting.update", "CONFIGURATION", 70, 10),
    ("sso", "SSO & Security", "sso", "Lock", "platform.setting.read", "CONFIGURATION", 70, 20),
    ("iot_devices", "IoT Devices", "devices", "Cpu", "tenant.setting.read", "IoT", 80, 10),
    ("mobile_users", "Mobile Users", "mobile/users", "Smartphone", "tenant.setting.read", "MOBILE", 85, 10),
    ("push_notifications", "Push Notifications", "mobile/push", "Bell", "tenant.setting.update", "MOBILE", 85, 20),
    ("mobile_config", "App Config", "mobile/config", "Settings", "tenant.setting.update", "MOBILE", 85, 30),
    ("tenants", "Tenant Management", "tenants", "Building", "platform.tenant.read", "PLATFORM", 100, 10),
];

/// The built-in sidebar.
pub fn core_menu_items() -> Vec<MenuItem> {
    CORE_MENU
        .iter()
        .map(|&(id, label, path, icon, permission, group, group_order, order)| MenuItem {
            id: id.to_string(),
            key: id.to_string(),
            label: label.to_string(),
            path: path.to_string(),
            icon: Some(icon.to_string()),
            parent: None,
            permission: (!permission.is_empty()).then(|| permission.to_string()),
            group: group.to_string(),
            group_order,
            order,
            source: MenuSource::Core,
            plugin: None,
        })
        .collect()
}

/// Build a plugin's sidebar entry from its manifest.
pub fn plugin_menu_item(manifest: &crate::plugin::PluginManifest) -> Option<MenuItem> {
    let menu = manifest.menu.as_ref()?;
    Some(MenuItem {
        id: manifest.slug.clone(),
        key: manifest.menu_feature(),
        label: menu.label.clone(),
        path: menu.path.clone(),
        icon: menu.icon.clone(),
        parent: menu.parent.clone(),
        permission: menu.permission.clone(),
        group: menu.group.clone().unwrap_or_else(|| manifest.name.clone()),
        group_order: PLUGIN_GROUP_ORDER,
        order: menu.order,
        source: MenuSource::Plugin,
        plugin: Some(manifest.slug.clone()),
    })
}

/// Build a plugin's admin pages from its manifest.
pub fn plugin_routes(manifest: &crate::plugin::PluginManifest) -> Vec<AdminRoute> {
    manifest
        .routes
        .iter()
        .map(|route| AdminRoute {
            path: route.path.clone(),
            component: format!("{}:{}", manifest.slug, route.component),
            permission: route.permission.clone(),
            plugin: manifest.slug.clone(),
        })
        .collect()
}

/// Register the core sidebar as the first `admin_menu_items` filter.
pub fn register_core_menu(hooks: &HookRegistry) {
    hooks.add_filter_with_priority(
        ADMIN_MENU_ITEMS,
        CORE_MENU_KEY,
        CORE_MENU_PRIORITY,
        |mut items: Vec<MenuItem>, _| {
            items.extend(core_menu_items());
            Ok(items)
        },
    );
}

/// Apply `admin_menu_items`, keep entries the tier may use and whose plugin
/// is active, and sort by `(group_order, order)`.
///
/// `plugin_active` is asked about plugin entries only.
pub fn menu_for_tier(
    hooks: &HookRegistry,
    tiers: &TierFeatureTable,
    tier: Tier,
    plugin_active: impl Fn(&str) -> bool,
    args: &Value,
) -> Vec<MenuItem> {
    let mut items: Vec<MenuItem> = hooks
        .apply_filters::<Vec<MenuItem>>(ADMIN_MENU_ITEMS, Vec::new(), args)
        .into_iter()
        .filter(|item| item.plugin.as_deref().is_none_or(&plugin_active))
        .filter(|item| tiers.check_access(tier, &item.key))
        .collect();
    items.sort_by_key(|item| (item.group_order, item.order));
    items
}

/// Apply `admin_routes`, keeping routes whose plugin is active.
pub fn admin_routes(hooks: &HookRegistry, plugin_active: impl Fn(&str) -> bool, args: &Value) -> Vec<AdminRoute> {
    hooks
        .apply_filters::<Vec<AdminRoute>>(ADMIN_ROUTES, Vec::new(), args)
        .into_iter()
        .filter(|route| plugin_active(&route.plugin))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_menu_keys_are_tier_features() {
        let tiers = TierFeatureTable::shipped();
        for item in core_menu_items() {
            assert!(
                tiers.check_access(Tier::Enterprise, &item.key),
                "core menu key {} is not an enterprise feature",
                item.key
            );
        }
    }

    #[test]
    fn test_menu_filtered_by_tier() {
        let hooks = HookRegistry::new();
        register_core_menu(&hooks);
        let tiers = TierFeatureTable::shipped();

        let free = menu_for_tier(&hooks, &tiers, Tier::Free, |_| true, &Value::Null);
        let enterprise = menu_for_tier(&hooks, &tiers, Tier::Enterprise, |_| true, &Value::Null);

        assert!(free.iter().any(|i| i.key == "articles"));
        assert!(!free.iter().any(|i| i.key == "themes"));
        assert!(!free.iter().any(|i| i.key == "tenants"));
        assert_eq!(enterprise.len(), core_menu_items().len());
        assert_eq!(enterprise.first().map(|i| i.id.as_str()), Some("home"));
        assert_eq!(enterprise.last().map(|i| i.id.as_str()), Some("tenants"));
    }

    #[test]
    fn test_plugin_menu_item_gated_by_extensions() {
        let manifest = crate::plugin::PluginManifest::new("regions", "Regions", "1.0.0").with_menu(
            crate::plugin::MenuDescriptor {
                label: "Regions".into(),
                icon: Some("Map".into()),
                path: "regions".into(),
                parent: None,
                group: None,
                order: 10,
                permission: Some("tenant.region.read".into()),
                feature: None,
            },
        );
        let item = plugin_menu_item(&manifest).unwrap();
        assert_eq!(item.key, "ext-regions");
        assert_eq!(item.group, "Regions");
        assert_eq!(item.source, MenuSource::Plugin);
        assert_eq!(item.plugin.as_deref(), Some("regions"));

        let tiers = TierFeatureTable::shipped();
        assert!(!tiers.check_access(Tier::Pro, &item.key));
        assert!(tiers.check_access(Tier::Enterprise, &item.key));
    }

    #[test]
    fn test_inactive_plugin_entries_are_dropped() {
        let hooks = HookRegistry::new();
        register_core_menu(&hooks);
        let manifest = crate::plugin::PluginManifest::new("regions", "Regions", "1.0.0")
            .with_menu(crate::plugin::MenuDescriptor {
                label: "Regions".into(),
                icon: None,
                path: "regions".into(),
                parent: None,
                group: None,
                order: 10,
                permission: None,
                feature: None,
            })
            .with_route(crate::plugin::RouteDescriptor {
                path: "regions".into(),
                component: "RegionsManager".into(),
                permission: None,
            });
        let item = plugin_menu_item(&manifest).unwrap();
        hooks.add_filter(ADMIN_MENU_ITEMS, "regions_menu", move |mut items: Vec<MenuItem>, _| {
            items.push(item.clone());
            Ok(items)
        });
        let routes = plugin_routes(&manifest);
        hooks.add_filter(ADMIN_ROUTES, "regions_routes", move |mut list: Vec<AdminRoute>, _| {
            list.extend(routes.iter().cloned());
            Ok(list)
        });
        let tiers = TierFeatureTable::shipped();

        let inactive = menu_for_tier(&hooks, &tiers, Tier::Enterprise, |_| false, &Value::Null);
        assert_eq!(inactive.len(), core_menu_items().len());
        assert!(admin_routes(&hooks, |_| false, &Value::Null).is_empty());

        let active = menu_for_tier(&hooks, &tiers, Tier::Enterprise, |slug| slug == "regions", &Value::Null);
        assert!(active.iter().any(|i| i.id == "regions"));
        assert_eq!(admin_routes(&hooks, |slug| slug == "regions", &Value::Null).len(), 1);
    }
}
