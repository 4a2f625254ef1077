//! Loading, activating and unloading a third-party plugin on a running gateway.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::{Value, json};

use awcms_gateway::{
    admin::DASHBOARD_WIDGETS,
    plugin::{
        MenuDescriptor, PluginContext, PluginManifest, RouteDescriptor,
        prelude::*,
        provisioning::SettingsStore,
    },
    tenant::TenantId,
};
use common::{default_app, get, post, send};

const HOST: &str = "big.example.com";

struct NewsletterPlugin {
    manifest: PluginManifest,
}

impl NewsletterPlugin {
    fn new() -> Self {
        let manifest = PluginManifest::new("newsletter", "Newsletter", "0.3.0")
            .with_description("Email campaigns")
            .with_permissions(["tenant.newsletter.read", "tenant.newsletter.send"])
            .with_menu(MenuDescriptor {
                label: "Newsletter".to_string(),
                icon: Some("Mail".to_string()),
                path: "newsletter".to_string(),
                parent: None,
                group: None,
                order: 10,
                permission: Some("tenant.newsletter.read".to_string()),
                feature: None,
            })
            .with_route(RouteDescriptor {
                path: "newsletter".to_string(),
                component: "Campaigns".to_string(),
                permission: None,
            });
        Self { manifest }
    }
}

#[async_trait]
impl Plugin for NewsletterPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn register(&self, hooks: &mut HookHandle, config: &Value) -> Result<(), PluginError> {
        let sender = config["sender"].as_str().unwrap_or("noreply").to_string();
        hooks.add_filter(DASHBOARD_WIDGETS, "newsletter", |mut refs: Vec<ComponentRef>, _: &Value| {
            refs.push(ComponentRef::new("newsletter", "Subscribers"));
            Ok(refs)
        });
        hooks.add_filter("email_from", "newsletter", move |_: String, _: &Value| Ok(sender.clone()));
        Ok(())
    }

    fn components(&self) -> Vec<(&'static str, Component)> {
        vec![(
            "Subscribers",
            Component::with_props(|props| {
                format!("<p>subscribers for {}</p>", props["tenant_slug"].as_str().unwrap_or_default())
            }),
        )]
    }

    async fn activate(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        ctx.settings
            .upsert_setting(&ctx.tenant_id, "newsletter.enabled", json!(true))
            .await?;
        Ok(())
    }

    async fn deactivate(&self, ctx: &PluginContext) -> Result<(), PluginError> {
        ctx.settings
            .upsert_setting(&ctx.tenant_id, "newsletter.enabled", json!(false))
            .await?;
        Ok(())
    }
}

struct PanickingPlugin {
    manifest: PluginManifest,
}

#[async_trait]
impl Plugin for PanickingPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn register(&self, hooks: &mut HookHandle, _config: &Value) -> Result<(), PluginError> {
        hooks.add_filter(DASHBOARD_WIDGETS, "broken", |refs: Vec<ComponentRef>, _: &Value| Ok(refs));
        panic!("register blew up");
    }
}

fn menu_ids(body: &Value) -> Vec<String> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_third_party_plugin_lifecycle() {
    let app = default_app();
    app.state
        .plugins
        .load(Arc::new(NewsletterPlugin::new()))
        .unwrap();

    let (_, body) = send(&app.router, get("/api/plugins", HOST)).await;
    assert_eq!(body["total_count"], 3);

    // Loaded but not yet active for this tenant.
    let (_, body) = send(&app.router, get("/api/admin/menu", HOST)).await;
    assert!(!menu_ids(&body).contains(&"newsletter".to_string()));
    let (_, body) = send(&app.router, get("/api/slots/dashboard_widgets", HOST)).await;
    assert_eq!(body["components"], json!([]));

    let (status, body) = send(&app.router, post("/api/plugins/newsletter/activate", HOST)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["provisioned"], json!(["tenant.newsletter.read", "tenant.newsletter.send"]));

    let (_, body) = send(&app.router, get("/api/admin/menu", HOST)).await;
    assert!(menu_ids(&body).contains(&"newsletter".to_string()));

    let (_, body) = send(&app.router, get("/api/admin/routes", HOST)).await;
    assert!(body
        .as_array()
        .unwrap()
        .iter()
        .any(|r| r["component"] == "newsletter:Campaigns"));

    let (_, body) = send(&app.router, get("/api/slots/dashboard_widgets", HOST)).await;
    let widgets = body["components"].as_array().unwrap();
    assert_eq!(widgets.len(), 1);
    assert_eq!(widgets[0]["html"], "<p>subscribers for big</p>");
    assert_eq!(
        app.store.permission("tenant.newsletter.send").unwrap().description,
        "Permission for Newsletter"
    );
    let tenant = TenantId::new("t-big");
    assert_eq!(
        app.store.get_setting(&tenant, "newsletter.enabled").await.unwrap(),
        Some(json!(true))
    );

    // Activating twice is harmless.
    let (status, body) = send(&app.router, post("/api/plugins/newsletter/activate", HOST)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"]["activation_count"], 2);
    assert_eq!(app.store.permission_count(), 2);

    assert!(app.state.plugins.unload("newsletter"));
    let (_, body) = send(&app.router, get("/api/admin/menu", HOST)).await;
    assert!(!menu_ids(&body).contains(&"newsletter".to_string()));
    let (_, body) = send(&app.router, get("/api/slots/dashboard_widgets", HOST)).await;
    assert_eq!(body["components"], json!([]));
    let (status, _) = send(&app.router, get("/api/plugins/newsletter", HOST)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_panicking_plugin_is_isolated() {
    let app = default_app();
    let plugin = PanickingPlugin {
        manifest: PluginManifest::new("broken", "Broken", "1.0.0"),
    };

    let err = app.state.plugins.load(Arc::new(plugin)).unwrap_err();
    assert!(matches!(err, PluginError::Panic(_)));
    assert!(!app.state.hooks.has_filter(DASHBOARD_WIDGETS, "broken"));

    let (_, body) = send(&app.router, get("/api/plugins/broken", HOST)).await;
    assert_eq!(body["state"], "failed");
    assert!(body["error"].as_str().unwrap().contains("register blew up"));

    let (status, _) = send(&app.router, post("/api/plugins/broken/activate", HOST)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    // The rest of the gateway keeps serving.
    let (status, _) = send(&app.router, post("/api/plugins/mailketing/activate", HOST)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app.router, get("/api/slots/dashboard_widgets", HOST)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["components"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_incompatible_gateway_version_is_not_loaded() {
    let app = default_app();
    let mut manifest = PluginManifest::new("future", "Future", "1.0.0");
    manifest.gateway_version = semver::VersionReq::parse(">=99.0.0").unwrap();
    let plugin = NewsletterPlugin { manifest };

    let err = app.state.plugins.load(Arc::new(plugin)).unwrap_err();
    assert!(matches!(err, PluginError::VersionIncompatible { .. }));
    assert!(!app.state.plugins.is_loaded("future"));
    assert!(!app.state.hooks.has_filter("email_from", "newsletter"));
}

#[tokio::test]
async fn test_plugin_config_reaches_register() {
    let mut config = awcms_gateway::ServerConfig::default();
    config
        .plugins
        .config
        .insert("newsletter".to_string(), json!({ "sender": "news@acme.test" }));
    let app = common::test_app(config);
    app.state
        .plugins
        .load(Arc::new(NewsletterPlugin::new()))
        .unwrap();

    let from = app
        .state
        .hooks
        .apply_filters("email_from", String::new(), &Value::Null);
    assert_eq!(from, "news@acme.test");
}

struct SharedKeyPlugin {
    manifest: PluginManifest,
    suffix: &'static str,
    fail: bool,
}

#[async_trait]
impl Plugin for SharedKeyPlugin {
    fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    fn register(&self, hooks: &mut HookHandle, _config: &Value) -> Result<(), PluginError> {
        let suffix = self.suffix;
        hooks.add_filter("email_content", "shared", move |body: String, _: &Value| Ok(body + suffix));
        if self.fail {
            return Err(PluginError::RegistrationFailed("missing api key".to_string()));
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_failed_plugin_does_not_remove_hook_it_replaced() {
    let app = default_app();
    let first = SharedKeyPlugin {
        manifest: PluginManifest::new("first", "First", "1.0.0"),
        suffix: "A",
        fail: false,
    };
    let second = SharedKeyPlugin {
        manifest: PluginManifest::new("second", "Second", "1.0.0"),
        suffix: "B",
        fail: true,
    };

    app.state.plugins.load(Arc::new(first)).unwrap();
    let err = app.state.plugins.load(Arc::new(second)).unwrap_err();
    assert!(matches!(err, PluginError::RegistrationFailed(_)));

    assert!(app.state.hooks.has_filter("email_content", "shared"));
    let body = app
        .state
        .hooks
        .apply_filters("email_content", String::new(), &Value::Null);
    assert_eq!(body, "A");

    assert!(app.state.plugins.unload("first"));
    assert!(!app.state.hooks.has_filter("email_content", "shared"));
}
