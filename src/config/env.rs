//! Environment variable loading.

use std::path::PathBuf;
use std::str::FromStr;

use super::{ConfigError, Environment, PluginConfig, ServerConfig, TenantConfig, TlsConfig};

/// Build a configuration from environment variables over the defaults.
pub fn load() -> Result<ServerConfig, ConfigError> {
    load_from(|key| std::env::var(key).ok())
}

/// Same as [`load`], reading variables through `var`.
pub fn load_from<F>(var: F) -> Result<ServerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| {
        var(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };

    let defaults = TenantConfig::default();
    let tenant = TenantConfig {
        dev_tenant_host: get("DEV_TENANT_HOST"),
        path_resolution: parse_bool(&get, "TENANT_PATH_RESOLUTION")?
            .unwrap_or(defaults.path_resolution),
        fallback_slug: get("TENANT_FALLBACK_SLUG"),
        fallback_hosts: get("TENANT_FALLBACK_HOSTS")
            .map(|hosts| parse_list(&hosts))
            .unwrap_or_default(),
        default_locale: get("DEFAULT_LOCALE").unwrap_or(defaults.default_locale),
        lookup_timeout_seconds: parse_number(&get, "TENANT_LOOKUP_TIMEOUT_SECONDS")?
            .unwrap_or(defaults.lookup_timeout_seconds),
    };

    let tls = match (get("TLS_CERT_PATH"), get("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        _ => {
            return Err(ConfigError::Validation(
                "TLS_CERT_PATH and TLS_KEY_PATH must be set together".to_string(),
            ));
        }
    };

    let plugin_defaults = PluginConfig::default();
    let plugins = PluginConfig {
        enabled: parse_bool(&get, "PLUGINS_ENABLED")?.unwrap_or(plugin_defaults.enabled),
        active: get("PLUGINS_ACTIVE").map(|active| parse_list(&active)),
        config: plugin_defaults.config.clone(),
    };

    let defaults = ServerConfig::default();
    Ok(ServerConfig {
        host: get("HOST").unwrap_or_else(|| defaults.host.clone()),
        port: parse_number(&get, "PORT")?.unwrap_or(defaults.port),
        tls,
        environment: get("APP_ENV")
            .map(|env| Environment::from_name(&env))
            .unwrap_or(defaults.environment),
        supabase_url: get("SUPABASE_URL"),
        supabase_key: get("SUPABASE_KEY"),
        tenant,
        tiers_path: get("TIER_FEATURES_PATH").map(PathBuf::from),
        cors_allowed_origins: get("CORS_ALLOWED_ORIGINS"),
        rate_limit_requests_per_second: parse_number(&get, "RATE_LIMIT_REQUESTS_PER_SECOND")?
            .unwrap_or(defaults.rate_limit_requests_per_second),
        rate_limit_burst_size: parse_number(&get, "RATE_LIMIT_BURST_SIZE")?
            .unwrap_or(defaults.rate_limit_burst_size),
        plugins,
    })
}

/// Split a comma-separated list, dropping empty entries.
pub(crate) fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool<F>(get: &F, key: &str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(None),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("expected a boolean, got '{value}'"),
            }),
        },
    }
}

fn parse_number<F, T>(get: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|value| {
            value.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{value}': {e}"),
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_with(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        load_from(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = load_with(&[]).unwrap();
        assert_eq!(config.address(), "0.0.0.0:3000");
        assert!(config.tls.is_none());
        assert!(config.supabase_url.is_none());
        assert_eq!(config.tenant, TenantConfig::default());
        assert_eq!(config.plugins, PluginConfig::default());
    }

    #[test]
    fn test_environment_values() {
        let config = load_with(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8081"),
            ("APP_ENV", "development"),
            ("SUPABASE_URL", "https://project.supabase.co"),
            ("SUPABASE_KEY", "service-key"),
            ("DEV_TENANT_HOST", "primary.localhost"),
            ("TENANT_PATH_RESOLUTION", "false"),
            ("TENANT_FALLBACK_SLUG", "primary"),
            ("TENANT_FALLBACK_HOSTS", "awcms.example.com, localhost,"),
            ("TENANT_LOOKUP_TIMEOUT_SECONDS", "2"),
            ("DEFAULT_LOCALE", "id"),
            ("TIER_FEATURES_PATH", "/etc/awcms/tiers.yaml"),
            ("RATE_LIMIT_REQUESTS_PER_SECOND", "120"),
            ("RATE_LIMIT_BURST_SIZE", "30"),
            ("PLUGINS_ENABLED", "yes"),
            ("PLUGINS_ACTIVE", "regions"),
        ])
        .unwrap();

        assert_eq!(config.address(), "127.0.0.1:8081");
        assert!(config.is_development());
        assert!(config.has_supabase());
        assert_eq!(config.tenant.dev_tenant_host.as_deref(), Some("primary.localhost"));
        assert!(!config.tenant.path_resolution);
        assert_eq!(config.tenant.fallback_hosts, vec!["awcms.example.com", "localhost"]);
        assert_eq!(config.tenant.lookup_timeout_seconds, 2);
        assert_eq!(config.tenant.default_locale, "id");
        assert_eq!(config.tiers_path, Some(PathBuf::from("/etc/awcms/tiers.yaml")));
        assert_eq!(config.rate_limit_requests_per_second, 120);
        assert_eq!(config.rate_limit_burst_size, 30);
        assert_eq!(config.plugins.active, Some(vec!["regions".to_string()]));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = load_with(&[("SUPABASE_URL", "  "), ("PORT", "")]).unwrap();
        assert!(config.supabase_url.is_none());
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let err = load_with(&[("PORT", "not-a-port")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_invalid_bool_is_rejected() {
        let err = load_with(&[("TENANT_PATH_RESOLUTION", "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_tls_requires_both_paths() {
        assert!(load_with(&[("TLS_CERT_PATH", "/cert.pem")]).is_err());

        let config = load_with(&[("TLS_CERT_PATH", "/cert.pem"), ("TLS_KEY_PATH", "/key.pem")])
            .unwrap();
        assert!(config.is_tls_enabled());
    }
}
