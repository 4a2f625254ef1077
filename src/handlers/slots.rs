use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::tenant::tenant_args;
use crate::plugin::RenderedComponent;
use crate::state::AppState;
use crate::tenant::TenantContext;

#[derive(Debug, Deserialize)]
pub struct SlotPath {
    pub slot: String,
}

#[derive(Debug, Serialize)]
pub struct SlotResponse {
    pub slot: String,
    pub components: Vec<RenderedComponent>,
}

/// Render the components contributed to `slot`.
///
/// Query parameters are passed to components as props, next to the tenant
/// fields; tenant fields win on conflict. Components of plugins the tenant
/// has not activated are left out.
pub async fn render_slot(
    State(state): State<Arc<AppState>>,
    context: TenantContext,
    Path(path): Path<SlotPath>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<SlotResponse> {
    let mut props = serde_json::Map::new();
    for (key, value) in query {
        props.insert(key, Value::String(value));
    }
    if let Value::Object(tenant) = tenant_args(&context) {
        props.extend(tenant);
    }
    let props = Value::Object(props);

    let components = state.components.render_slot(
        &state.hooks,
        &path.slot,
        &props,
        state.plugins.active_for(&context.tenant_id),
    );
    tracing::debug!(
        tenant_id = %context.tenant_id,
        slot = %path.slot,
        count = components.len(),
        "Rendered slot"
    );

    Json(SlotResponse {
        slot: path.slot,
        components,
    })
}
