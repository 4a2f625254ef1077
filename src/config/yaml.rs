use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values set here
/// override the environment.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3000
///   environment: "production"
///   tls:
///     enabled: true
///     cert_path: "/etc/awcms/cert.pem"
///     key_path: "/etc/awcms/key.pem"
///
/// supabase:
///   url: "https://project.supabase.co"
///   key: "service-role-key"
///
/// tenant:
///   dev_tenant_host: "primary.localhost"
///   path_resolution: true
///   fallback_slug: "primary"
///   fallback_hosts: ["awcms.example.com"]
///   default_locale: "en"
///   lookup_timeout_seconds: 5
///
/// tiers:
///   path: "/etc/awcms/tiers.yaml"
///
/// security:
///   cors_allowed_origins: "https://admin.example.com"
///   rate_limit_requests_per_second: 60
///   rate_limit_burst_size: 10
///
/// plugins:
///   enabled: true
///   active: ["regions", "mailketing"]
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub supabase: Option<SupabaseYaml>,
    pub tenant: Option<TenantYaml>,
    pub tiers: Option<TiersYaml>,
    pub security: Option<SecurityYaml>,
    pub plugins: Option<PluginsYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub environment: Option<String>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SupabaseYaml {
    pub url: Option<String>,
    pub key: Option<String>,
}

/// Tenant resolution settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TenantYaml {
    pub dev_tenant_host: Option<String>,
    pub path_resolution: Option<bool>,
    pub fallback_slug: Option<String>,
    pub fallback_hosts: Option<Vec<String>>,
    pub default_locale: Option<String>,
    pub lookup_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TiersYaml {
    pub path: Option<String>,
}

/// Security configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
    /// Maximum requests per second per IP address
    pub rate_limit_requests_per_second: Option<u32>,
    /// Maximum burst size for rate limiting
    pub rate_limit_burst_size: Option<u32>,
}

/// Plugin configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PluginsYaml {
    pub enabled: Option<bool>,
    pub active: Option<Vec<String>>,
    /// Plugin-specific configuration keyed by slug
    pub config: HashMap<String, serde_json::Value>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Fields have invalid types
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&contents)
    }

    /// Parse YAML text; an empty document yields the default configuration.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(contents).map_err(|e| ConfigError::Yaml(e.to_string()))
    }
}
