//! Plugin lifecycle state.
//!
//! ```text
//!   load ──▶ Loaded ──(per tenant)──▶ Active ◀──▶ Inactive
//!     │                                  │
//!     ▼                                  ▼
//!   Failed                             Failed
//! ```
//!
//! Load state is process-wide; activation state is tracked per
//! `(plugin, tenant)`.

use serde::Serialize;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Process-wide state of a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    /// `register` completed; hooks and components are in place.
    Loaded,
    /// Version check or `register` failed; nothing is registered.
    Failed,
}

impl std::fmt::Display for LoadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadState::Loaded => write!(f, "loaded"),
            LoadState::Failed => write!(f, "failed"),
        }
    }
}

/// Per-tenant activation state of a plugin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivationState {
    #[default]
    Inactive,
    Active,
    /// The plugin's own activate or deactivate hook failed.
    Failed,
}

impl std::fmt::Display for ActivationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivationState::Inactive => write!(f, "inactive"),
            ActivationState::Active => write!(f, "active"),
            ActivationState::Failed => write!(f, "failed"),
        }
    }
}

impl ActivationState {
    pub fn is_active(&self) -> bool {
        matches!(self, ActivationState::Active)
    }
}

/// Activation record for one `(plugin, tenant)` pair.
#[derive(Debug, Clone)]
pub struct PluginEntry {
    pub state: ActivationState,

    /// Time the record was created
    pub created_at: Instant,

    /// Time of the last lifecycle call
    pub last_changed: Instant,

    /// Successful activations
    pub activation_count: u64,

    pub error_count: u64,

    pub last_error: Option<String>,
}

impl PluginEntry {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            state: ActivationState::Inactive,
            created_at: now,
            last_changed: now,
            activation_count: 0,
            error_count: 0,
            last_error: None,
        }
    }

    /// Record a successful activation.
    pub fn record_activation(&mut self) {
        self.activation_count += 1;
        self.last_error = None;
        self.transition(ActivationState::Active);
    }

    /// Record a successful deactivation.
    pub fn record_deactivation(&mut self) {
        self.last_error = None;
        self.transition(ActivationState::Inactive);
    }

    /// Record a failed lifecycle call.
    pub fn record_error(&mut self, error: impl Into<String>) {
        self.error_count += 1;
        self.last_error = Some(error.into());
        self.transition(ActivationState::Failed);
    }

    pub fn transition(&mut self, new_state: ActivationState) {
        tracing::debug!(
            from = %self.state,
            to = %new_state,
            "Plugin activation state transition"
        );
        self.state = new_state;
        self.last_changed = Instant::now();
    }

    /// Time since the last lifecycle call.
    pub fn idle_time(&self) -> Duration {
        self.last_changed.elapsed()
    }

    /// Serializable view of the entry.
    pub fn status(&self) -> ActivationStatus {
        let since_change = self.idle_time();
        let changed_at = SystemTime::now()
            .checked_sub(since_change)
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or_default();

        ActivationStatus {
            state: self.state,
            activation_count: self.activation_count,
            error_count: self.error_count,
            last_error: self.last_error.clone(),
            last_changed_unix: changed_at,
        }
    }
}

impl Default for PluginEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// Activation state as reported by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivationStatus {
    pub state: ActivationState,
    pub activation_count: u64,
    pub error_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub last_changed_unix: u64,
}

impl Default for ActivationStatus {
    fn default() -> Self {
        Self {
            state: ActivationState::Inactive,
            activation_count: 0,
            error_count: 0,
            last_error: None,
            last_changed_unix: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", ActivationState::Active), "active");
        assert_eq!(format!("{}", ActivationState::Failed), "failed");
        assert_eq!(format!("{}", LoadState::Loaded), "loaded");
    }

    #[test]
    fn test_plugin_entry() {
        let mut entry = PluginEntry::new();
        assert_eq!(entry.state, ActivationState::Inactive);

        entry.record_activation();
        assert!(entry.state.is_active());
        assert_eq!(entry.activation_count, 1);

        entry.record_error("activate hook failed");
        assert_eq!(entry.state, ActivationState::Failed);
        assert_eq!(entry.error_count, 1);
        assert!(entry.last_error.as_ref().unwrap().contains("activate hook"));

        entry.record_activation();
        assert_eq!(entry.activation_count, 2);
        assert!(entry.last_error.is_none());

        entry.record_deactivation();
        assert_eq!(entry.state, ActivationState::Inactive);
    }

    #[test]
    fn test_status_serializes() {
        let mut entry = PluginEntry::new();
        entry.record_activation();
        let json = serde_json::to_value(entry.status()).unwrap();
        assert_eq!(json["state"], "active");
        assert_eq!(json["activation_count"], 1);
        assert!(json.get("last_error").is_none());
    }
}
