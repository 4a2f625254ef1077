//! Hook registry.
//!
//! Each slot maps registrant keys to entries, so registering an existing key
//! replaces its callback in place. Entries carry a priority and the sequence
//! number of their first registration; dispatch order is `(priority, seq)`.
//!
//! Registrations may name an owner. When a different owner takes over a key
//! the previous registration is kept underneath it, and removing the newer
//! one by token brings the previous one back.
//!
//! Dispatch snapshots the callbacks of a slot and releases the table lock
//! before invoking anything, so callbacks may register or remove hooks.

use dashmap::DashMap;
use serde_json::Value;
use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::isolation::call_hook;
use super::{HookError, HookFailure, HookReport};

/// Priority used when none is given. Lower runs first.
pub const DEFAULT_PRIORITY: i32 = 10;

/// Action callback. Receives the dispatch arguments.
pub type ActionFn = Arc<dyn Fn(&Value) -> Result<(), HookError> + Send + Sync>;

type FilterBox<T> = Box<dyn Fn(T, &Value) -> Result<T, HookError> + Send + Sync>;

/// Typed filter callback, stored type-erased.
struct FilterFn<T>(FilterBox<T>);

type ErasedFilter = Arc<dyn Any + Send + Sync>;

struct Layer<C> {
    callback: C,
    priority: i32,
    owner: Option<String>,
    token: u64,
}

/// A registrant key on one slot. The last layer is the live one.
struct Entry<C> {
    seq: u64,
    layers: Vec<Layer<C>>,
}

impl<C> Entry<C> {
    fn live(&self) -> Option<&Layer<C>> {
        self.layers.last()
    }
}

/// Identifies one registration made by an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegistrationToken(u64);

type SlotTable<C> = DashMap<String, HashMap<String, Entry<C>>>;

/// Registry of action and filter callbacks keyed by slot.
pub struct HookRegistry {
    actions: SlotTable<ActionFn>,
    filters: SlotTable<ErasedFilter>,
    seq: AtomicU64,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("action_slots", &self.action_slots())
            .field("filter_slots", &self.filter_slots())
            .finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self {
            actions: DashMap::new(),
            filters: DashMap::new(),
            seq: AtomicU64::new(0),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register an action at [`DEFAULT_PRIORITY`].
    pub fn add_action<F>(&self, slot: &str, registrant_key: &str, callback: F)
    where
        F: Fn(&Value) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.add_action_with_priority(slot, registrant_key, DEFAULT_PRIORITY, callback);
    }

    /// Register an action. Re-registering `registrant_key` on `slot` replaces
    /// the callback and priority but keeps its original registration order.
    pub fn add_action_with_priority<F>(&self, slot: &str, registrant_key: &str, priority: i32, callback: F)
    where
        F: Fn(&Value) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.register_action(slot, registrant_key, priority, None, callback);
    }

    pub(super) fn register_action<F>(
        &self,
        slot: &str,
        registrant_key: &str,
        priority: i32,
        owner: Option<&str>,
        callback: F,
    ) -> RegistrationToken
    where
        F: Fn(&Value) -> Result<(), HookError> + Send + Sync + 'static,
    {
        let callback: ActionFn = Arc::new(callback);
        let token = self.insert(&self.actions, slot, registrant_key, priority, owner, callback);
        tracing::debug!(slot = %slot, registrant_key = %registrant_key, priority, owner = ?owner, "Action registered");
        token
    }

    /// Register a filter at [`DEFAULT_PRIORITY`].
    pub fn add_filter<T, F>(&self, slot: &str, registrant_key: &str, callback: F)
    where
        T: 'static,
        F: Fn(T, &Value) -> Result<T, HookError> + Send + Sync + 'static,
    {
        self.add_filter_with_priority(slot, registrant_key, DEFAULT_PRIORITY, callback);
    }

    /// Register a filter over values of type `T`.
    ///
    /// Applying the slot with a different value type skips this filter and
    /// reports [`HookError::TypeMismatch`].
    pub fn add_filter_with_priority<T, F>(&self, slot: &str, registrant_key: &str, priority: i32, callback: F)
    where
        T: 'static,
        F: Fn(T, &Value) -> Result<T, HookError> + Send + Sync + 'static,
    {
        self.register_filter(slot, registrant_key, priority, None, callback);
    }

    pub(super) fn register_filter<T, F>(
        &self,
        slot: &str,
        registrant_key: &str,
        priority: i32,
        owner: Option<&str>,
        callback: F,
    ) -> RegistrationToken
    where
        T: 'static,
        F: Fn(T, &Value) -> Result<T, HookError> + Send + Sync + 'static,
    {
        let erased: ErasedFilter = Arc::new(FilterFn::<T>(Box::new(callback)));
        let token = self.insert(&self.filters, slot, registrant_key, priority, owner, erased);
        tracing::debug!(slot = %slot, registrant_key = %registrant_key, priority, owner = ?owner, "Filter registered");
        token
    }

    /// Remove an action, including any registrations it displaced. Returns
    /// whether one was registered.
    pub fn remove_action(&self, slot: &str, registrant_key: &str) -> bool {
        Self::remove(&self.actions, slot, registrant_key)
    }

    /// Remove a filter, including any registrations it displaced. Returns
    /// whether one was registered.
    pub fn remove_filter(&self, slot: &str, registrant_key: &str) -> bool {
        Self::remove(&self.filters, slot, registrant_key)
    }

    /// Remove one owned action registration. A registration it displaced
    /// becomes live again.
    pub(super) fn remove_action_registration(&self, slot: &str, registrant_key: &str, token: RegistrationToken) -> bool {
        Self::remove_layer(&self.actions, slot, registrant_key, token)
    }

    /// Remove one owned filter registration. A registration it displaced
    /// becomes live again.
    pub(super) fn remove_filter_registration(&self, slot: &str, registrant_key: &str, token: RegistrationToken) -> bool {
        Self::remove_layer(&self.filters, slot, registrant_key, token)
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Invoke every action registered on `slot`, in order.
    pub fn do_action(&self, slot: &str, args: &Value) -> HookReport {
        let callbacks = Self::snapshot(&self.actions, slot);
        let mut report = HookReport::default();

        for (key, callback) in callbacks {
            report.invoked += 1;
            if let Err(e) = call_hook(|| callback(args)) {
                report.failures.push(failure(slot, &key, e));
            }
        }

        report
    }

    /// Fold `initial` through every filter on `slot`.
    ///
    /// Failing filters are skipped and the value from before them carried
    /// forward. With no filters `initial` is returned unchanged.
    pub fn apply_filters<T>(&self, slot: &str, initial: T, args: &Value) -> T
    where
        T: Clone + 'static,
    {
        self.apply_filters_with_report(slot, initial, args).0
    }

    /// [`apply_filters`](Self::apply_filters) that also returns the report.
    pub fn apply_filters_with_report<T>(&self, slot: &str, initial: T, args: &Value) -> (T, HookReport)
    where
        T: Clone + 'static,
    {
        let filters = Self::snapshot(&self.filters, slot);
        let mut report = HookReport::default();
        let mut value = initial;

        for (key, erased) in filters {
            report.invoked += 1;
            let Some(filter) = erased.downcast_ref::<FilterFn<T>>() else {
                let err = HookError::TypeMismatch {
                    expected: type_name::<T>(),
                };
                report.failures.push(failure(slot, &key, err));
                continue;
            };

            let input = value.clone();
            match call_hook(|| (filter.0)(input, args)) {
                Ok(next) => value = next,
                Err(e) => report.failures.push(failure(slot, &key, e)),
            }
        }

        (value, report)
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub fn has_action(&self, slot: &str, registrant_key: &str) -> bool {
        Self::contains(&self.actions, slot, registrant_key)
    }

    pub fn has_filter(&self, slot: &str, registrant_key: &str) -> bool {
        Self::contains(&self.filters, slot, registrant_key)
    }

    /// Registrant keys of the actions on `slot`, in dispatch order.
    pub fn action_keys(&self, slot: &str) -> Vec<String> {
        Self::ordered_keys(&self.actions, slot)
    }

    /// Registrant keys of the filters on `slot`, in dispatch order.
    pub fn filter_keys(&self, slot: &str) -> Vec<String> {
        Self::ordered_keys(&self.filters, slot)
    }

    pub fn action_slots(&self) -> Vec<String> {
        Self::slots(&self.actions)
    }

    pub fn filter_slots(&self) -> Vec<String> {
        Self::slots(&self.filters)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn insert<C>(
        &self,
        table: &SlotTable<C>,
        slot: &str,
        key: &str,
        priority: i32,
        owner: Option<&str>,
        callback: C,
    ) -> RegistrationToken {
        let mut entries = table.entry(slot.to_string()).or_default();

        if let Some(entry) = entries.get_mut(key) {
            if let Some(live) = entry.layers.last_mut().filter(|l| l.owner.as_deref() == owner) {
                live.callback = callback;
                live.priority = priority;
                return RegistrationToken(live.token);
            }
            let previous = entry.live().and_then(|l| l.owner.clone());
            tracing::warn!(
                slot = %slot,
                registrant_key = %key,
                owner = ?owner,
                previous_owner = ?previous,
                "Hook key taken over from another owner"
            );
            let token = self.seq.fetch_add(1, Ordering::Relaxed);
            entry.layers.push(Layer {
                callback,
                priority,
                owner: owner.map(str::to_string),
                token,
            });
            return RegistrationToken(token);
        }

        let token = self.seq.fetch_add(1, Ordering::Relaxed);
        entries.insert(
            key.to_string(),
            Entry {
                seq: token,
                layers: vec![Layer {
                    callback,
                    priority,
                    owner: owner.map(str::to_string),
                    token,
                }],
            },
        );
        RegistrationToken(token)
    }

    fn remove<C>(table: &SlotTable<C>, slot: &str, key: &str) -> bool {
        let removed = match table.get_mut(slot) {
            Some(mut entries) => entries.remove(key).is_some(),
            None => return false,
        };
        table.remove_if(slot, |_, entries| entries.is_empty());
        if removed {
            tracing::debug!(slot = %slot, registrant_key = %key, "Hook removed");
        }
        removed
    }

    fn remove_layer<C>(table: &SlotTable<C>, slot: &str, key: &str, token: RegistrationToken) -> bool {
        let (removed, restored) = match table.get_mut(slot) {
            Some(mut entries) => {
                let Some(entry) = entries.get_mut(key) else {
                    return false;
                };
                let was_live = entry.live().is_some_and(|l| l.token == token.0);
                let before = entry.layers.len();
                entry.layers.retain(|l| l.token != token.0);
                let removed = entry.layers.len() != before;
                let restored = removed && was_live && !entry.layers.is_empty();
                if entry.layers.is_empty() {
                    entries.remove(key);
                }
                (removed, restored)
            }
            None => return false,
        };
        table.remove_if(slot, |_, entries| entries.is_empty());
        if restored {
            tracing::info!(slot = %slot, registrant_key = %key, "Hook restored to previous owner");
        } else if removed {
            tracing::debug!(slot = %slot, registrant_key = %key, "Hook removed");
        }
        removed
    }

    fn contains<C>(table: &SlotTable<C>, slot: &str, key: &str) -> bool {
        table.get(slot).is_some_and(|entries| entries.contains_key(key))
    }

    /// Ordered `(key, callback)` pairs. The slot guard is dropped on return.
    fn snapshot<C: Clone>(table: &SlotTable<C>, slot: &str) -> Vec<(String, C)> {
        let mut ordered: Vec<(i32, u64, String, C)> = match table.get(slot) {
            Some(entries) => entries
                .iter()
                .filter_map(|(key, e)| {
                    e.live()
                        .map(|l| (l.priority, e.seq, key.clone(), l.callback.clone()))
                })
                .collect(),
            None => return Vec::new(),
        };
        ordered.sort_by_key(|(priority, seq, _, _)| (*priority, *seq));
        ordered
            .into_iter()
            .map(|(_, _, key, callback)| (key, callback))
            .collect()
    }

    fn ordered_keys<C: Clone>(table: &SlotTable<C>, slot: &str) -> Vec<String> {
        Self::snapshot(table, slot)
            .into_iter()
            .map(|(key, _)| key)
            .collect()
    }

    fn slots<C>(table: &SlotTable<C>) -> Vec<String> {
        let mut slots: Vec<String> = table.iter().map(|e| e.key().clone()).collect();
        slots.sort();
        slots
    }
}

fn failure(slot: &str, key: &str, error: HookError) -> HookFailure {
    tracing::error!(slot = %slot, registrant_key = %key, error = %error, "Hook callback failed");
    HookFailure {
        slot: slot.to_string(),
        registrant_key: key.to_string(),
        error: error.to_string(),
    }
}
