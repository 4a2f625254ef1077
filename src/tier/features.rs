//! Tier feature table.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use super::{Tier, TierError};

/// Prefix of inheritance sentinels (`ALL_FREE`, `ALL_PRO`, ...).
pub const ALL_PREFIX: &str = "ALL_";

/// Feature keys with this prefix are gated by [`EXTENSION_FEATURE`].
pub const EXTENSION_PREFIX: &str = "ext-";

/// Feature granting access to every `ext-*` key.
pub const EXTENSION_FEATURE: &str = "extensions";

static EMPTY: BTreeSet<String> = BTreeSet::new();

const FREE_FEATURES: &[&str] = &[
    "home",
    "articles",
    "pages",
    "visual_builder",
    "categories",
    "tags",
    "files",
    "portfolio",
    "testimonials",
    "announcements",
    "promotions",
    "contact_messages",
    "contacts",
    "menus",
    "products",
    "product_types",
    "orders",
    "users",
];

const PRO_FEATURES: &[&str] = &[
    "ALL_FREE",
    "themes",
    "widgets",
    "roles",
    "permissions",
    "policies",
    "seo_manager",
    "languages",
    "notifications",
    "audit_logs",
    "settings_branding",
    "backup",
    "photo_gallery",
    "video_gallery",
];

const ENTERPRISE_FEATURES: &[&str] = &[
    "ALL_PRO",
    "sso",
    "extensions",
    "sidebar_manager",
    "settings_general",
    "tenants",
    "email_settings",
    "email_logs",
    "iot_devices",
    "mobile_users",
    "push_notifications",
    "mobile_config",
];

/// Resolved per-tier feature sets.
///
/// Built from raw lists that may contain `ALL_<TIER>` sentinels. Expansion
/// happens once in [`TierFeatureTable::from_map`]; cycles and references to
/// undefined tiers are rejected there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierFeatureTable {
    resolved: BTreeMap<String, BTreeSet<String>>,
}

impl Default for TierFeatureTable {
    fn default() -> Self {
        Self::shipped()
    }
}

impl TierFeatureTable {
    /// The built-in table.
    pub fn shipped() -> Self {
        let mut resolved = BTreeMap::new();
        let free: BTreeSet<String> = FREE_FEATURES.iter().map(|f| f.to_string()).collect();

        let mut pro = free.clone();
        pro.extend(PRO_FEATURES.iter().skip(1).map(|f| f.to_string()));

        let mut enterprise = pro.clone();
        enterprise.extend(ENTERPRISE_FEATURES.iter().skip(1).map(|f| f.to_string()));

        resolved.insert(Tier::Free.as_str().to_string(), free);
        resolved.insert(Tier::Pro.as_str().to_string(), pro);
        resolved.insert(Tier::Enterprise.as_str().to_string(), enterprise);
        Self { resolved }
    }

    /// The raw built-in lists, sentinels included.
    pub fn shipped_raw() -> BTreeMap<String, Vec<String>> {
        [
            (Tier::Free, FREE_FEATURES),
            (Tier::Pro, PRO_FEATURES),
            (Tier::Enterprise, ENTERPRISE_FEATURES),
        ]
        .into_iter()
        .map(|(tier, list)| {
            (
                tier.as_str().to_string(),
                list.iter().map(|f| f.to_string()).collect(),
            )
        })
        .collect()
    }

    /// Build a table from raw tier lists, expanding sentinels.
    pub fn from_map(raw: BTreeMap<String, Vec<String>>) -> Result<Self, TierError> {
        let raw: BTreeMap<String, Vec<String>> = raw
            .into_iter()
            .map(|(tier, list)| (tier.to_ascii_lowercase(), list))
            .collect();

        let mut resolved = BTreeMap::new();
        let mut path = Vec::new();
        for tier in raw.keys() {
            expand(tier, &raw, &mut resolved, &mut path)?;
        }
        Ok(Self { resolved })
    }

    /// Parse a YAML mapping of tier name to feature list.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, TierError> {
        let raw: BTreeMap<String, Vec<String>> =
            serde_yaml::from_str(yaml).map_err(|e| TierError::Parse(e.to_string()))?;
        Self::from_map(raw)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TierError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| TierError::Io(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&contents)
    }

    /// Every feature enabled for `tier`, inherited ones included.
    pub fn resolve_features(&self, tier: Tier) -> &BTreeSet<String> {
        self.resolve_by_name(tier.as_str())
    }

    /// Like [`resolve_features`](Self::resolve_features) for a raw tier name.
    /// Unknown names resolve to the free tier.
    pub fn resolve_by_name(&self, name: &str) -> &BTreeSet<String> {
        let name = name.trim().to_ascii_lowercase();
        self.resolved
            .get(&name)
            .or_else(|| self.resolved.get(Tier::Free.as_str()))
            .unwrap_or(&EMPTY)
    }

    /// Whether `tier` may use `feature_key`.
    ///
    /// An empty key is always allowed. `ext-*` keys require the
    /// `extensions` feature.
    pub fn check_access(&self, tier: Tier, feature_key: &str) -> bool {
        if feature_key.is_empty() {
            return true;
        }
        let features = self.resolve_features(tier);
        if feature_key.starts_with(EXTENSION_PREFIX) {
            return features.contains(EXTENSION_FEATURE);
        }
        features.contains(feature_key)
    }

    /// Tier names defined in the table.
    pub fn tiers(&self) -> impl Iterator<Item = &str> {
        self.resolved.keys().map(String::as_str)
    }
}

fn sentinel_target(item: &str) -> Option<String> {
    item.strip_prefix(ALL_PREFIX)
        .filter(|rest| !rest.is_empty())
        .map(str::to_ascii_lowercase)
}

fn expand(
    tier: &str,
    raw: &BTreeMap<String, Vec<String>>,
    resolved: &mut BTreeMap<String, BTreeSet<String>>,
    path: &mut Vec<String>,
) -> Result<(), TierError> {
    if resolved.contains_key(tier) {
        return Ok(());
    }
    if let Some(start) = path.iter().position(|t| t == tier) {
        let mut cycle = path[start..].to_vec();
        cycle.push(tier.to_string());
        return Err(TierError::Cycle { path: cycle });
    }

    path.push(tier.to_string());
    let mut features = BTreeSet::new();
    for item in raw.get(tier).map(Vec::as_slice).unwrap_or_default() {
        match sentinel_target(item) {
            Some(target) => {
                if !raw.contains_key(&target) {
                    return Err(TierError::UnknownTier {
                        tier: tier.to_string(),
                        referenced: target,
                    });
                }
                expand(&target, raw, resolved, path)?;
                if let Some(inherited) = resolved.get(&target) {
                    features.extend(inherited.iter().cloned());
                }
            }
            None => {
                features.insert(item.clone());
            }
        }
    }
    path.pop();

    resolved.insert(tier.to_string(), features);
    Ok(())
}
