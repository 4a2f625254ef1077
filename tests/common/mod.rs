//! Shared helpers for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::Value;
use tower::util::ServiceExt;

use awcms_gateway::{
    AppState, ServerConfig,
    plugin::provisioning::MemoryStore,
    routes,
    tenant::{StaticTenantLookup, TenantRecord},
};

/// Tenant directory used across tests.
///
/// - `acme.example.com` -> `t-acme` (pro), slug `acme`
/// - `big.example.com` -> `t-big` (enterprise), slug `big`
/// - `small.example.com` -> `t-small` (no tier, so free), slug `small`
/// - slug `primary` -> `t-primary` (enterprise), no host
pub fn tenant_directory() -> StaticTenantLookup {
    StaticTenantLookup::new()
        .with_host(
            "acme.example.com",
            TenantRecord::new("t-acme").with_slug("acme").with_tier("pro"),
        )
        .with_host(
            "big.example.com",
            TenantRecord::new("t-big").with_slug("big").with_tier("enterprise"),
        )
        .with_host(
            "small.example.com",
            TenantRecord::new("t-small").with_slug("small"),
        )
        .with_slug(
            TenantRecord::new("t-primary")
                .with_slug("primary")
                .with_tier("enterprise"),
        )
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub router: Router,
}

pub fn test_app(config: ServerConfig) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::with_services(
        config,
        Arc::new(tenant_directory()),
        store.clone(),
        store.clone(),
    )
    .expect("state builds");
    let router = routes::create_router(state.clone());
    TestApp {
        state,
        store,
        router,
    }
}

pub fn default_app() -> TestApp {
    test_app(ServerConfig::default())
}

pub fn get(uri: &str, host: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("host", host)
        .body(Body::empty())
        .unwrap()
}

pub fn post(uri: &str, host: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("host", host)
        .body(Body::empty())
        .unwrap()
}

/// Send a request and decode the JSON body (`Value::Null` when empty).
pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}
