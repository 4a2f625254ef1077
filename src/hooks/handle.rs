//! Registration handle given to plugins.

use serde_json::Value;
use std::sync::Arc;

use super::registry::{DEFAULT_PRIORITY, HookRegistry, RegistrationToken};
use super::HookError;

/// One hook registered through a [`HookHandle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub slot: String,
    pub registrant_key: String,
    token: RegistrationToken,
}

/// Registrations made through a [`HookHandle`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registrations {
    pub actions: Vec<Recorded>,
    pub filters: Vec<Recorded>,
}

impl Registrations {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len() + self.filters.len()
    }

    /// Remove every recorded registration from `registry`.
    ///
    /// Only these registrations are removed. If one of them replaced a key
    /// held by another owner, that owner's registration is live again.
    /// Returns how many were still present.
    pub fn remove_from(&self, registry: &HookRegistry) -> usize {
        let actions = self
            .actions
            .iter()
            .filter(|r| registry.remove_action_registration(&r.slot, &r.registrant_key, r.token))
            .count();
        let filters = self
            .filters
            .iter()
            .filter(|r| registry.remove_filter_registration(&r.slot, &r.registrant_key, r.token))
            .count();
        actions + filters
    }

    fn record(list: &mut Vec<Recorded>, slot: &str, key: &str, token: RegistrationToken) {
        if !list.iter().any(|r| r.token == token) {
            list.push(Recorded {
                slot: slot.to_string(),
                registrant_key: key.to_string(),
                token,
            });
        }
    }
}

/// Registry access scoped to one plugin.
///
/// Records every registration so the plugin can later be unloaded without
/// touching hooks owned by anything else.
pub struct HookHandle {
    registry: Arc<HookRegistry>,
    owner: String,
    registrations: Registrations,
}

impl HookHandle {
    pub fn new(registry: Arc<HookRegistry>, owner: impl Into<String>) -> Self {
        Self {
            registry,
            owner: owner.into(),
            registrations: Registrations::default(),
        }
    }

    /// Slug of the plugin holding this handle.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn add_action<F>(&mut self, slot: &str, registrant_key: &str, callback: F)
    where
        F: Fn(&Value) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.add_action_with_priority(slot, registrant_key, DEFAULT_PRIORITY, callback);
    }

    pub fn add_action_with_priority<F>(&mut self, slot: &str, registrant_key: &str, priority: i32, callback: F)
    where
        F: Fn(&Value) -> Result<(), HookError> + Send + Sync + 'static,
    {
        let token = self
            .registry
            .register_action(slot, registrant_key, priority, Some(&self.owner), callback);
        Registrations::record(&mut self.registrations.actions, slot, registrant_key, token);
    }

    pub fn add_filter<T, F>(&mut self, slot: &str, registrant_key: &str, callback: F)
    where
        T: 'static,
        F: Fn(T, &Value) -> Result<T, HookError> + Send + Sync + 'static,
    {
        self.add_filter_with_priority(slot, registrant_key, DEFAULT_PRIORITY, callback);
    }

    pub fn add_filter_with_priority<T, F>(&mut self, slot: &str, registrant_key: &str, priority: i32, callback: F)
    where
        T: 'static,
        F: Fn(T, &Value) -> Result<T, HookError> + Send + Sync + 'static,
    {
        let token = self
            .registry
            .register_filter(slot, registrant_key, priority, Some(&self.owner), callback);
        Registrations::record(&mut self.registrations.filters, slot, registrant_key, token);
    }

    pub fn registrations(&self) -> &Registrations {
        &self.registrations
    }

    /// Consume the handle, returning what was registered.
    pub fn finish(self) -> Registrations {
        self.registrations
    }
}
