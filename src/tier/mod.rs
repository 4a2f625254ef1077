//! Subscription tiers and feature gating.
//!
//! Feature sets are plain data: each tier lists feature keys and may inline
//! another tier's resolved set with an `ALL_<TIER>` sentinel. The table is
//! expanded once when it is built, so lookups never recurse.

pub mod features;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use features::{ALL_PREFIX, EXTENSION_FEATURE, EXTENSION_PREFIX, TierFeatureTable};

/// Subscription tier of a tenant.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Free,
    Pro,
    Enterprise,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::Pro, Tier::Enterprise];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
            Tier::Enterprise => "enterprise",
        }
    }

    /// Parse a stored tier name. Unknown or empty names are treated as free.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "pro" => Tier::Pro,
            "enterprise" => Tier::Enterprise,
            "free" => Tier::Free,
            other => {
                if !other.is_empty() {
                    tracing::debug!(tier = %other, "Unknown tier name, treating as free");
                }
                Tier::Free
            }
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier table construction errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TierError {
    #[error("tier inheritance cycle: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("tier '{tier}' references undefined tier '{referenced}'")]
    UnknownTier { tier: String, referenced: String },

    #[error("failed to read tier table: {0}")]
    Io(String),

    #[error("failed to parse tier table: {0}")]
    Parse(String),
}
