//! Configuration module for the AWCMS gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Applying YAML overrides on top of the environment
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use awcms_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

use crate::tenant::DEFAULT_LOCALE;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Yaml(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// TLS configuration for HTTPS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Deployment environment (`APP_ENV`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    /// `development`, `dev` and `local` select development; anything else is production.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Environment::Development,
            _ => Environment::Production,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

/// Tenant resolution settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantConfig {
    /// Host used for every lookup in development (ignored in production)
    pub dev_tenant_host: Option<String>,
    /// Whether `/<slug>/...` paths select a tenant before the host does
    pub path_resolution: bool,
    /// Tenant slug served when a fallback host has no tenant of its own
    pub fallback_slug: Option<String>,
    /// Hosts (or parent domains) eligible for the fallback slug
    pub fallback_hosts: Vec<String>,
    /// Locale used when `Accept-Language` names nothing supported
    pub default_locale: String,
    /// Timeout for tenant directory requests
    pub lookup_timeout_seconds: u64,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            dev_tenant_host: None,
            path_resolution: true,
            fallback_slug: None,
            fallback_hosts: Vec::new(),
            default_locale: DEFAULT_LOCALE.to_string(),
            lookup_timeout_seconds: 5,
        }
    }
}

/// Plugin system configuration
///
/// # Example YAML
/// ```yaml
/// plugins:
///   enabled: true
///   active: ["regions", "mailketing"]
///   config:
///     mailketing:
///       tracking_enabled: true
///       tracking_url: "https://track.example.com/open"
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PluginConfig {
    /// Whether built-in plugins are loaded at all (default: true)
    pub enabled: bool,
    /// Allow-list of plugin slugs; `None` loads every built-in
    pub active: Option<Vec<String>>,
    /// Plugin-specific configuration keyed by slug
    pub config: HashMap<String, Value>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            active: None,
            config: HashMap::new(),
        }
    }
}

impl PluginConfig {
    /// Whether the plugin `slug` should be loaded.
    pub fn is_selected(&self, slug: &str) -> bool {
        match &self.active {
            Some(active) => active.iter().any(|s| s == slug),
            None => true,
        }
    }

    /// Configuration for `slug`, `Value::Null` when none is set.
    pub fn config_for(&self, slug: &str) -> Value {
        self.config.get(slug).cloned().unwrap_or(Value::Null)
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway:
/// - Server settings (host, port, TLS, environment)
/// - Supabase tenant directory
/// - Tenant resolution settings
/// - Tier table location
/// - Security settings (CORS, rate limiting)
/// - Plugin selection
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    pub environment: Environment,

    // Supabase settings
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,

    pub tenant: TenantConfig,

    /// YAML tier table; the shipped table is used when unset
    pub tiers_path: Option<PathBuf>,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,

    pub plugins: PluginConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            tls: None,
            environment: Environment::default(),
            supabase_url: None,
            supabase_key: None,
            tenant: TenantConfig::default(),
            tiers_path: None,
            cors_allowed_origins: None,
            rate_limit_requests_per_second: 60,
            rate_limit_burst_size: 10,
            plugins: PluginConfig::default(),
        }
    }
}

/// Zeroize the Supabase key when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.supabase_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// The `.env` file is loaded into the process environment in `main`
    /// before this is called, so actual environment variables win over it.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// The merged configuration is validated before it is returned.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    /// Both the Supabase URL and key are set.
    pub fn has_supabase(&self) -> bool {
        self.supabase_url.is_some() && self.supabase_key.is_some()
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.tenant.lookup_timeout_seconds)
    }
}
