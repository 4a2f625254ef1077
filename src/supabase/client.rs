//! PostgREST client for the tenant directory and plugin provisioning.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;
use zeroize::Zeroize;

use crate::plugin::provisioning::{PermissionGrant, PermissionStore, ProvisionError, SettingsStore};
use crate::tenant::lookup::{LookupError, TenantLookup, TenantRecord};
use crate::tenant::TenantId;

/// RPC resolving a host to a tenant id (runs with definer privileges).
pub const RPC_TENANT_BY_HOST: &str = "get_tenant_id_by_host";
/// RPC resolving a slug to a tenant row.
pub const RPC_TENANT_BY_SLUG: &str = "get_tenant_by_slug";

/// Header carrying the tenant for tenant-scoped requests.
pub const TENANT_HEADER: &str = "x-tenant-id";

/// Supabase REST client.
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl std::fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl Drop for SupabaseClient {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

impl SupabaseClient {
    /// Create a client for the project at `base_url`.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, LookupError> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| LookupError::NotConfigured(format!("invalid Supabase URL: {e}")))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::NotConfigured(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn rest_url(&self, path: &str) -> Result<Url, LookupError> {
        self.base_url
            .join(&format!("rest/v1/{path}"))
            .map_err(|e| LookupError::NotConfigured(format!("invalid REST path '{path}': {e}")))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Accept", "application/json")
    }

    /// Call a Postgres function through `/rest/v1/rpc/<function>`.
    pub async fn rpc(&self, function: &str, body: &Value) -> Result<Value, LookupError> {
        let url = self.rest_url(&format!("rpc/{function}"))?;
        let response = self
            .request(Method::POST, url)
            .json(body)
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LookupError::Status {
                status: status.as_u16(),
                body,
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }

        let text = response
            .text()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| LookupError::Malformed(e.to_string()))
    }

    /// Read slug and tier of a tenant.
    async fn tenant_profile(&self, id: &TenantId) -> Result<Option<TenantRecord>, LookupError> {
        let mut url = self.rest_url("tenants")?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{id}"))
            .append_pair("select", "id,slug,subscription_tier");

        let response = self
            .request(Method::GET, url)
            .header(TENANT_HEADER, id.as_str())
            .send()
            .await
            .map_err(|e| LookupError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LookupError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let rows: Value = response
            .json()
            .await
            .map_err(|e| LookupError::Malformed(e.to_string()))?;
        parse_tenant(&rows)
    }

    async fn write(&self, path: &str, tenant_id: &TenantId, body: &Value) -> Result<(), ProvisionError> {
        let url = self
            .rest_url(path)
            .map_err(|e| ProvisionError::Request(e.to_string()))?;
        let response = self
            .request(Method::POST, url)
            .header(TENANT_HEADER, tenant_id.as_str())
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(body)
            .send()
            .await
            .map_err(|e| ProvisionError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ProvisionError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Interpret a lookup response.
///
/// Accepts a scalar id, an object with `id` or `tenant_id`, or an array of
/// such rows (first row wins). `null` and `[]` mean no tenant.
pub fn parse_tenant(value: &Value) -> Result<Option<TenantRecord>, LookupError> {
    match value {
        Value::Null => Ok(None),
        Value::String(id) if id.is_empty() => Ok(None),
        Value::String(id) => Ok(Some(TenantRecord::new(id.as_str()))),
        Value::Number(id) => Ok(Some(TenantRecord::new(id.to_string()))),
        Value::Array(rows) => match rows.first() {
            Some(row) => parse_tenant(row),
            None => Ok(None),
        },
        Value::Object(row) => {
            let id = ["id", "tenant_id"]
                .iter()
                .find_map(|field| match row.get(*field) {
                    Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                    Some(Value::Number(n)) => Some(n.to_string()),
                    _ => None,
                });
            let Some(id) = id else {
                if row.values().all(Value::is_null) {
                    return Ok(None);
                }
                return Err(LookupError::Malformed("tenant row without id".to_string()));
            };

            let text = |field: &str| row.get(field).and_then(Value::as_str).map(str::to_string);
            Ok(Some(TenantRecord {
                id: TenantId::new(id),
                slug: text("slug"),
                tier: text("subscription_tier").or_else(|| text("tier")),
            }))
        }
        other => Err(LookupError::Malformed(format!("unexpected tenant response: {other}"))),
    }
}

#[async_trait]
impl TenantLookup for SupabaseClient {
    async fn find_by_host(&self, host: &str) -> Result<Option<TenantRecord>, LookupError> {
        let response = self
            .rpc(RPC_TENANT_BY_HOST, &json!({ "lookup_host": host }))
            .await?;
        let Some(mut record) = parse_tenant(&response)? else {
            return Ok(None);
        };

        if record.slug.is_none() {
            match self.tenant_profile(&record.id).await {
                Ok(Some(profile)) => {
                    record.slug = profile.slug;
                    record.tier = record.tier.or(profile.tier);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(tenant_id = %record.id, error = %e, "Tenant profile read failed");
                }
            }
        }

        Ok(Some(record))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<TenantRecord>, LookupError> {
        let response = self
            .rpc(RPC_TENANT_BY_SLUG, &json!({ "lookup_slug": slug }))
            .await?;
        parse_tenant(&response)
    }
}

#[async_trait]
impl PermissionStore for SupabaseClient {
    async fn upsert_permission(&self, grant: &PermissionGrant) -> Result<(), ProvisionError> {
        let body = serde_json::to_value(grant).map_err(|e| ProvisionError::Request(e.to_string()))?;
        self.write("permissions?on_conflict=permission_name", &grant.tenant_id, &body)
            .await
    }
}

#[async_trait]
impl SettingsStore for SupabaseClient {
    async fn get_setting(&self, tenant_id: &TenantId, key: &str) -> Result<Option<Value>, ProvisionError> {
        let mut url = self
            .rest_url("settings")
            .map_err(|e| ProvisionError::Request(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("tenant_id", &format!("eq.{tenant_id}"))
            .append_pair("key", &format!("eq.{key}"))
            .append_pair("select", "value");

        let response = self
            .request(Method::GET, url)
            .header(TENANT_HEADER, tenant_id.as_str())
            .send()
            .await
            .map_err(|e| ProvisionError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProvisionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let rows: Value = response
            .json()
            .await
            .map_err(|e| ProvisionError::Request(e.to_string()))?;
        Ok(rows
            .as_array()
            .and_then(|rows| rows.first())
            .and_then(|row| row.get("value"))
            .cloned())
    }

    async fn upsert_setting(&self, tenant_id: &TenantId, key: &str, value: Value) -> Result<(), ProvisionError> {
        let body = json!({ "tenant_id": tenant_id, "key": key, "value": value });
        self.write("settings?on_conflict=tenant_id,key", tenant_id, &body)
            .await
    }

    async fn delete_settings(&self, tenant_id: &TenantId, prefix: &str) -> Result<(), ProvisionError> {
        let mut url = self
            .rest_url("settings")
            .map_err(|e| ProvisionError::Request(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("tenant_id", &format!("eq.{tenant_id}"))
            .append_pair("key", &format!("like.{prefix}*"));

        let response = self
            .request(Method::DELETE, url)
            .header(TENANT_HEADER, tenant_id.as_str())
            .header("Prefer", "return=minimal")
            .send()
            .await
            .map_err(|e| ProvisionError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ProvisionError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}
