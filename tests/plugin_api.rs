//! Plugin listing, per-tenant activation and tier-gated admin surfaces.

mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};

use awcms_gateway::{
    ServerConfig,
    plugin::provisioning::SettingsStore,
    tenant::TenantId,
};
use common::{default_app, get, post, send, test_app};

const ENTERPRISE_HOST: &str = "big.example.com";
const PRO_HOST: &str = "acme.example.com";
const FREE_HOST: &str = "small.example.com";

fn ids(body: &Value) -> Vec<String> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|item| item["id"].as_str().unwrap().to_string())
        .collect()
}

fn widget_keys(body: &Value) -> Vec<String> {
    body["components"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["key"].as_str().unwrap().to_string())
        .collect()
}

fn slugs(body: &Value) -> Vec<String> {
    body["plugins"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["slug"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_list_plugins() {
    let app = default_app();
    let (status, body) = send(&app.router, get("/api/plugins", PRO_HOST)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 2);
    assert_eq!(slugs(&body), vec!["mailketing", "regions"]);
    assert_eq!(body["plugins"][1]["state"], "loaded");
    assert_eq!(body["plugins"][1]["activation"]["state"], "inactive");
}

#[tokio::test]
async fn test_list_respects_plugin_selection() {
    let mut config = ServerConfig::default();
    config.plugins.active = Some(vec!["regions".to_string()]);
    let app = test_app(config);

    let (_, body) = send(&app.router, get("/api/plugins", PRO_HOST)).await;
    assert_eq!(slugs(&body), vec!["regions"]);
}

#[tokio::test]
async fn test_get_unknown_plugin_is_404() {
    let app = default_app();
    let (status, body) = send(&app.router, get("/api/plugins/backup", PRO_HOST)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "plugin_not_found");
}

#[tokio::test]
async fn test_activation_requires_extensions_feature() {
    let app = default_app();

    for host in [FREE_HOST, PRO_HOST] {
        let (status, body) = send(&app.router, post("/api/plugins/regions/activate", host)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "feature_forbidden");
    }
    assert_eq!(app.store.permission_count(), 0);
}

#[tokio::test]
async fn test_activate_and_deactivate_regions() {
    let app = default_app();

    let (status, body) = send(&app.router, post("/api/plugins/regions/activate", ENTERPRISE_HOST)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plugin"], "regions");
    assert_eq!(body["status"]["state"], "active");
    assert_eq!(body["status"]["activation_count"], 1);
    assert_eq!(body["provisioned"].as_array().unwrap().len(), 4);

    let grant = app.store.permission("tenant.region.read").unwrap();
    assert_eq!(grant.tenant_id, TenantId::new("t-big"));
    assert_eq!(grant.description, "Permission for Regions");

    let (_, body) = send(&app.router, get("/api/plugins/regions", ENTERPRISE_HOST)).await;
    assert_eq!(body["activation"]["state"], "active");

    // Activation is per tenant.
    let (_, body) = send(&app.router, get("/api/plugins/regions", PRO_HOST)).await;
    assert_eq!(body["activation"]["state"], "inactive");

    let (status, body) = send(&app.router, post("/api/plugins/regions/deactivate", ENTERPRISE_HOST)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"]["state"], "inactive");
    assert!(body.get("provisioned").is_none());

    // Permissions are kept on deactivation.
    assert_eq!(app.store.permission_count(), 4);
}

#[tokio::test]
async fn test_activate_through_path_tenant() {
    let app = default_app();
    let (status, body) = send(
        &app.router,
        post("/primary/api/plugins/mailketing/activate", "unknown.example.com"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"]["state"], "active");

    let tenant = TenantId::new("t-primary");
    assert_eq!(
        app.store.get_setting(&tenant, "email.provider").await.unwrap(),
        Some(json!("mailketing"))
    );
    assert_eq!(
        app.store.get_setting(&tenant, "email.enabled").await.unwrap(),
        Some(json!(true))
    );

    send(
        &app.router,
        post("/primary/api/plugins/mailketing/deactivate", "unknown.example.com"),
    )
    .await;
    assert_eq!(
        app.store.get_setting(&tenant, "email.enabled").await.unwrap(),
        Some(json!(false))
    );
}

#[tokio::test]
async fn test_activate_unknown_plugin_is_404() {
    let app = default_app();
    let (status, _) = send(&app.router, post("/api/plugins/backup/activate", ENTERPRISE_HOST)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_features_by_tier() {
    let app = default_app();

    let (status, body) = send(&app.router, get("/api/features", FREE_HOST)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tier"], "free");
    let features: Vec<&str> = body["features"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(features.contains(&"articles"));
    assert!(!features.contains(&"extensions"));

    let (_, body) = send(&app.router, get("/api/features", ENTERPRISE_HOST)).await;
    let features = body["features"].as_array().unwrap();
    assert!(features.contains(&json!("extensions")));
    assert!(features.contains(&json!("articles")));
    assert!(features.contains(&json!("backup")));
}

#[tokio::test]
async fn test_admin_menu_is_gated_by_tier() {
    let app = default_app();
    for slug in ["regions", "mailketing"] {
        let (status, _) = send(&app.router, post(&format!("/api/plugins/{slug}/activate"), ENTERPRISE_HOST)).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app.router, get("/api/admin/menu", ENTERPRISE_HOST)).await;
    assert_eq!(status, StatusCode::OK);
    let enterprise = ids(&body);
    assert!(enterprise.contains(&"regions".to_string()));
    assert!(enterprise.contains(&"mailketing".to_string()));
    assert_eq!(enterprise.first().map(String::as_str), Some("home"));
    // Plugin entries are grouped after the core menu.
    assert_eq!(body.as_array().unwrap().last().unwrap()["source"], "plugin");

    let (_, body) = send(&app.router, get("/api/admin/menu", PRO_HOST)).await;
    let pro = ids(&body);
    assert!(pro.contains(&"roles".to_string()));
    assert!(!pro.contains(&"regions".to_string()));
    assert!(!pro.contains(&"tenants".to_string()));

    let (_, body) = send(&app.router, get("/api/admin/menu", FREE_HOST)).await;
    let free = ids(&body);
    assert!(free.contains(&"articles".to_string()));
    assert!(!free.contains(&"roles".to_string()));
}

#[tokio::test]
async fn test_admin_routes_include_active_plugin_pages() {
    let app = default_app();
    let (status, body) = send(&app.router, get("/api/admin/routes", ENTERPRISE_HOST)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    for slug in ["regions", "mailketing"] {
        send(&app.router, post(&format!("/api/plugins/{slug}/activate"), ENTERPRISE_HOST)).await;
    }
    let (_, body) = send(&app.router, get("/api/admin/routes", ENTERPRISE_HOST)).await;

    let components: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|r| r["component"].as_str())
        .collect();
    assert!(components.contains(&"regions:RegionsManager"));
    assert!(components.contains(&"mailketing:EmailSettings"));
    assert!(components.contains(&"mailketing:EmailLogs"));

    // Other tenants still see no plugin pages.
    let (_, body) = send(&app.router, get("/api/admin/routes", PRO_HOST)).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_dashboard_widget_slot() {
    let app = default_app();
    let (status, body) = send(&app.router, get("/api/slots/dashboard_widgets", ENTERPRISE_HOST)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["slot"], "dashboard_widgets");
    assert_eq!(body["components"], json!([]));

    send(&app.router, post("/api/plugins/mailketing/activate", ENTERPRISE_HOST)).await;
    let (_, body) = send(&app.router, get("/api/slots/dashboard_widgets", ENTERPRISE_HOST)).await;

    let components = body["components"].as_array().unwrap();
    assert_eq!(components.len(), 1);
    assert_eq!(components[0]["key"], "mailketing:MailketingCreditsWidget");
    assert_eq!(components[0]["found"], true);
    assert!(components[0]["html"].as_str().unwrap().contains("credits"));
}

#[tokio::test]
async fn test_empty_slot() {
    let app = default_app();
    let (status, body) = send(&app.router, get("/api/slots/nothing_here", PRO_HOST)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["components"], json!([]));
}

#[tokio::test]
async fn test_deactivation_hides_plugin_menu_and_widget() {
    let app = default_app();

    let (_, body) = send(&app.router, get("/api/admin/menu", ENTERPRISE_HOST)).await;
    let menu = ids(&body);
    assert!(!menu.contains(&"mailketing".to_string()));
    assert!(!menu.contains(&"regions".to_string()));

    send(&app.router, post("/api/plugins/mailketing/activate", ENTERPRISE_HOST)).await;
    let (_, body) = send(&app.router, get("/api/admin/menu", ENTERPRISE_HOST)).await;
    assert!(ids(&body).contains(&"mailketing".to_string()));
    let (_, body) = send(&app.router, get("/api/slots/dashboard_widgets", ENTERPRISE_HOST)).await;
    assert_eq!(widget_keys(&body), vec!["mailketing:MailketingCreditsWidget"]);

    // Activation by one tenant does not leak to another.
    let (_, body) = send(&app.router, get("/primary/api/admin/menu", "unknown.example.com")).await;
    assert!(!ids(&body).contains(&"mailketing".to_string()));

    let (status, _) = send(&app.router, post("/api/plugins/mailketing/deactivate", ENTERPRISE_HOST)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app.router, get("/api/admin/menu", ENTERPRISE_HOST)).await;
    assert!(!ids(&body).contains(&"mailketing".to_string()));
    let (_, body) = send(&app.router, get("/api/slots/dashboard_widgets", ENTERPRISE_HOST)).await;
    assert!(widget_keys(&body).is_empty());
    let (_, body) = send(&app.router, get("/api/admin/routes", ENTERPRISE_HOST)).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_uninstall_removes_plugin_settings() {
    let app = default_app();
    let tenant = TenantId::new("t-big");

    send(&app.router, post("/api/plugins/mailketing/activate", ENTERPRISE_HOST)).await;
    app.store
        .upsert_setting(&tenant, "site.name", json!("Big"))
        .await
        .unwrap();
    assert_eq!(
        app.store.get_setting(&tenant, "email.enabled").await.unwrap(),
        Some(json!(true))
    );

    let (status, body) = send(&app.router, post("/api/plugins/mailketing/uninstall", ENTERPRISE_HOST)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"]["state"], "inactive");
    assert!(app.store.get_setting(&tenant, "email.enabled").await.unwrap().is_none());
    assert!(app.store.get_setting(&tenant, "email.provider").await.unwrap().is_none());
    assert_eq!(
        app.store.get_setting(&tenant, "site.name").await.unwrap(),
        Some(json!("Big"))
    );

    let (_, body) = send(&app.router, get("/api/admin/menu", ENTERPRISE_HOST)).await;
    assert!(!ids(&body).contains(&"mailketing".to_string()));

    let (status, _) = send(&app.router, post("/api/plugins/mailketing/uninstall", PRO_HOST)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
