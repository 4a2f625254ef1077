//! Slot components contributed by plugins.
//!
//! Components are keyed `<plugin>:<Name>`. A UI slot is a filter over
//! `Vec<ComponentRef>`; rendering applies the filter to an empty list, drops
//! references into plugins the tenant has not activated, and renders each
//! remaining component to an HTML fragment.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::hooks::HookRegistry;
use crate::hooks::isolation::call_hook;

type StaticRender = Arc<dyn Fn() -> String + Send + Sync>;
type PropsRender = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// A renderable component.
#[derive(Clone)]
pub enum Component {
    /// Renders the same fragment regardless of props.
    Static(StaticRender),
    /// Renders from slot props.
    WithProps(PropsRender),
}

impl Component {
    pub fn fixed<F>(render: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        Component::Static(Arc::new(render))
    }

    pub fn with_props<F>(render: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        Component::WithProps(Arc::new(render))
    }

    pub fn render(&self, props: &Value) -> String {
        match self {
            Component::Static(render) => render(),
            Component::WithProps(render) => render(props),
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Static(_) => f.write_str("Component::Static"),
            Component::WithProps(_) => f.write_str("Component::WithProps"),
        }
    }
}

/// Reference to a registered component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentRef(String);

impl ComponentRef {
    /// Namespaced reference `<plugin>:<name>`.
    pub fn new(plugin: &str, name: &str) -> Self {
        Self(format!("{plugin}:{name}"))
    }

    /// Reference by raw key, namespaced or bare.
    pub fn key(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split into `(plugin, name)`. Bare keys have no plugin.
    pub fn parts(&self) -> (Option<&str>, &str) {
        match self.0.split_once(':') {
            Some((plugin, name)) => (Some(plugin), name),
            None => (None, self.0.as_str()),
        }
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One rendered slot entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedComponent {
    pub key: String,
    pub found: bool,
    pub html: String,
}

/// Registry of plugin components.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    components: DashMap<String, Component>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, plugin: &str, name: &str, component: Component) {
        let key = ComponentRef::new(plugin, name);
        tracing::debug!(component = %key, "Component registered");
        self.components.insert(key.0, component);
    }

    /// Remove every component of `plugin`. Returns how many were removed.
    pub fn unregister_plugin(&self, plugin: &str) -> usize {
        let prefix = format!("{plugin}:");
        let before = self.components.len();
        self.components.retain(|key, _| !key.starts_with(&prefix));
        before - self.components.len()
    }

    /// Look up a component.
    ///
    /// Namespaced keys match exactly. A bare name matches the first
    /// component with that name in key order.
    pub fn get(&self, reference: &ComponentRef) -> Option<Component> {
        match reference.parts() {
            (Some(_), _) => self
                .components
                .get(reference.as_str())
                .map(|c| c.value().clone()),
            (None, name) => {
                let suffix = format!(":{name}");
                let mut matches: Vec<(String, Component)> = self
                    .components
                    .iter()
                    .filter(|entry| entry.key().ends_with(&suffix))
                    .map(|entry| (entry.key().clone(), entry.value().clone()))
                    .collect();
                matches.sort_by(|a, b| a.0.cmp(&b.0));
                matches.into_iter().next().map(|(_, c)| c)
            }
        }
    }

    /// All registered keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.components.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Render one component. Unknown keys render a placeholder.
    pub fn render(&self, reference: &ComponentRef, props: &Value) -> RenderedComponent {
        let Some(component) = self.get(reference) else {
            tracing::warn!(component = %reference, "Plugin component not found");
            return RenderedComponent {
                key: reference.to_string(),
                found: false,
                html: missing_placeholder(reference.as_str()),
            };
        };

        match call_hook(|| Ok(component.render(props))) {
            Ok(html) => RenderedComponent {
                key: reference.to_string(),
                found: true,
                html,
            },
            Err(e) => {
                tracing::error!(component = %reference, error = %e, "Plugin component failed to render");
                RenderedComponent {
                    key: reference.to_string(),
                    found: true,
                    html: String::new(),
                }
            }
        }
    }

    /// Apply `slot` to an empty reference list and render each entry.
    ///
    /// Namespaced references are kept only when `plugin_active` accepts
    /// their plugin. Bare references are always rendered.
    pub fn render_slot(
        &self,
        hooks: &HookRegistry,
        slot: &str,
        props: &Value,
        plugin_active: impl Fn(&str) -> bool,
    ) -> Vec<RenderedComponent> {
        hooks
            .apply_filters::<Vec<ComponentRef>>(slot, Vec::new(), props)
            .iter()
            .filter(|reference| reference.parts().0.is_none_or(&plugin_active))
            .map(|reference| self.render(reference, props))
            .collect()
    }
}

fn missing_placeholder(key: &str) -> String {
    format!(
        "<div class=\"plugin-component-missing\">Plugin component \"{}\" not found.</div>",
        escape_html(key)
    )
}

/// Escape text for use in HTML content and quoted attributes.
pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
