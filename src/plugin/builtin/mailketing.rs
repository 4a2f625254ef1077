//! Mailketing email plugin.
//!
//! Adds a tracking pixel to outgoing email bodies when configured and a
//! credits widget to the dashboard. Activation seeds the tenant's email
//! settings; deactivation disables sending but keeps the settings; uninstall
//! deletes them.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use url::Url;

use crate::admin::DASHBOARD_WIDGETS;
use crate::hooks::HookHandle;
use crate::plugin::components::{Component, ComponentRef, escape_html};
use crate::plugin::manifest::PluginManifest;
use crate::plugin::{Plugin, PluginConstructor, PluginContext, PluginError};

const MANIFEST: &str = include_str!("mailketing.json");

/// Filter slot: outgoing email body (`String`).
pub const EMAIL_CONTENT: &str = "email_content";

pub const SETTING_PROVIDER: &str = "email.provider";
pub const SETTING_ENABLED: &str = "email.enabled";
/// Prefix of every setting this plugin owns.
pub const SETTING_PREFIX: &str = "email.";

const WIDGET_PRIORITY: i32 = 50;

/// `plugins.config.mailketing`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailketingConfig {
    #[serde(default)]
    pub tracking_enabled: bool,
    #[serde(default)]
    pub tracking_url: Option<String>,
}

impl MailketingConfig {
    fn from_value(value: &Value) -> Result<Self, PluginError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let config: Self = serde_json::from_value(value.clone())
            .map_err(|e| PluginError::ConfigurationError(format!("mailketing: {e}")))?;
        if config.tracking_enabled && config.tracking_url.is_none() {
            return Err(PluginError::ConfigurationError(
                "mailketing: tracking_enabled requires tracking_url".to_string(),
            ));
        }
        if let Some(raw) = &config.tracking_url {
            let url = Url::parse(raw)
                .map_err(|e| PluginError::ConfigurationError(format!("mailketing: invalid tracking_url: {e}")))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(PluginError::ConfigurationError(format!(
                    "mailketing: tracking_url must be http or https, got {}",
                    url.scheme()
                )));
            }
        }
        Ok(config)
    }
}

pub struct MailketingPlugin {
    manifest: PluginManifest,
}

impl MailketingPlugin {
    pub fn new() -> Result<Self, PluginError> {
        Ok(Self {
            manifest: PluginManifest::from_json(MANIFEST)?,
        })
    }
}

fn create() -> Result<Arc<dyn Plugin>, PluginError> {
    Ok(Arc::new(MailketingPlugin::new()?))
}

inventory::submit!(PluginConstructor::new("mailketing", create));

#[async_trait]
impl Plugin for MailketingPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn register(&self, hooks: &mut HookHandle, config: &Value) -> Result<(), PluginError> {
        let config = MailketingConfig::from_value(config)?;

        if let (true, Some(url)) = (config.tracking_enabled, config.tracking_url) {
            let pixel = format!("<img src=\"{}\" width=\"1\" height=\"1\" />", escape_html(&url));
            hooks.add_filter(EMAIL_CONTENT, "mailketing", move |content: String, _| {
                Ok(content + &pixel)
            });
        }

        hooks.add_filter_with_priority(
            DASHBOARD_WIDGETS,
            "mailketing_stats",
            WIDGET_PRIORITY,
            |mut widgets: Vec<ComponentRef>, _| {
                widgets.push(ComponentRef::new("mailketing", "MailketingCreditsWidget"));
                Ok(widgets)
            },
        );

        Ok(())
    }

    fn components(&self) -> Vec<(&'static str, Component)> {
        vec![
            (
                "EmailSettings",
                Component::fixed(|| "<section data-plugin=\"mailketing\" data-view=\"settings\"></section>".into()),
            ),
            (
                "EmailLogs",
                Component::fixed(|| "<section data-plugin=\"mailketing\" data-view=\"logs\"></section>".into()),
            ),
            (
                "MailketingCreditsWidget",
                Component::with_props(|props| {
                    let credits = props["credits"].as_i64().unwrap_or_default();
                    format!("<div class=\"widget mailketing-credits\">{credits} credits</div>")
                }),
            ),
        ]
    }

    async fn activate(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        let existing = ctx.settings.get_setting(&ctx.tenant_id, SETTING_PROVIDER).await?;
        if existing.is_none() {
            ctx.settings
                .upsert_setting(&ctx.tenant_id, SETTING_PROVIDER, Value::from("mailketing"))
                .await?;
        }
        ctx.settings
            .upsert_setting(&ctx.tenant_id, SETTING_ENABLED, Value::Bool(true))
            .await?;
        Ok(())
    }

    async fn deactivate(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        ctx.settings
            .upsert_setting(&ctx.tenant_id, SETTING_ENABLED, Value::Bool(false))
            .await?;
        Ok(())
    }

    async fn uninstall(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        ctx.settings
            .delete_settings(&ctx.tenant_id, SETTING_PREFIX)
            .await?;
        Ok(())
    }
}
