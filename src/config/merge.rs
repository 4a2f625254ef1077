//! Merge YAML overrides onto the environment configuration.

use std::path::PathBuf;

use super::yaml::YamlConfig;
use super::{ConfigError, Environment, ServerConfig, TlsConfig, env};

/// Load the environment base and apply `yaml` on top of it.
pub fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, ConfigError> {
    let mut config = env::load()?;
    if let Some(yaml) = yaml {
        apply_yaml(&mut config, yaml)?;
    }
    Ok(config)
}

/// Overwrite every field that `yaml` sets.
pub fn apply_yaml(config: &mut ServerConfig, yaml: YamlConfig) -> Result<(), ConfigError> {
    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(environment) = server.environment {
            config.environment = Environment::from_name(&environment);
        }
        if let Some(tls) = server.tls {
            if tls.enabled == Some(false) {
                config.tls = None;
            } else {
                match (tls.cert_path, tls.key_path) {
                    (Some(cert), Some(key)) => {
                        config.tls = Some(TlsConfig {
                            cert_path: PathBuf::from(cert),
                            key_path: PathBuf::from(key),
                        });
                    }
                    (None, None) if tls.enabled.is_none() => {}
                    _ => {
                        return Err(ConfigError::Validation(
                            "server.tls requires both cert_path and key_path".to_string(),
                        ));
                    }
                }
            }
        }
    }

    if let Some(supabase) = yaml.supabase {
        if let Some(url) = supabase.url {
            config.supabase_url = Some(url);
        }
        if let Some(key) = supabase.key {
            config.supabase_key = Some(key);
        }
    }

    if let Some(tenant) = yaml.tenant {
        if let Some(host) = tenant.dev_tenant_host {
            config.tenant.dev_tenant_host = Some(host);
        }
        if let Some(path_resolution) = tenant.path_resolution {
            config.tenant.path_resolution = path_resolution;
        }
        if let Some(slug) = tenant.fallback_slug {
            config.tenant.fallback_slug = Some(slug);
        }
        if let Some(hosts) = tenant.fallback_hosts {
            config.tenant.fallback_hosts = hosts;
        }
        if let Some(locale) = tenant.default_locale {
            config.tenant.default_locale = locale;
        }
        if let Some(timeout) = tenant.lookup_timeout_seconds {
            config.tenant.lookup_timeout_seconds = timeout;
        }
    }

    if let Some(path) = yaml.tiers.and_then(|tiers| tiers.path) {
        config.tiers_path = Some(PathBuf::from(path));
    }

    if let Some(security) = yaml.security {
        if let Some(origins) = security.cors_allowed_origins {
            config.cors_allowed_origins = Some(origins);
        }
        if let Some(rps) = security.rate_limit_requests_per_second {
            config.rate_limit_requests_per_second = rps;
        }
        if let Some(burst) = security.rate_limit_burst_size {
            config.rate_limit_burst_size = burst;
        }
    }

    if let Some(plugins) = yaml.plugins {
        if let Some(enabled) = plugins.enabled {
            config.plugins.enabled = enabled;
        }
        if let Some(active) = plugins.active {
            config.plugins.active = Some(active);
        }
        config.plugins.config.extend(plugins.config);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_overrides_base() {
        let mut config = ServerConfig::default();
        config.port = 9000;
        config.tenant.fallback_slug = Some("from-env".to_string());

        let yaml = YamlConfig::parse(
            r#"
server:
  host: "127.0.0.1"
  environment: "development"
tenant:
  fallback_slug: "primary"
  fallback_hosts: ["awcms.example.com"]
plugins:
  active: ["mailketing"]
  config:
    mailketing:
      tracking_enabled: false
"#,
        )
        .unwrap();

        apply_yaml(&mut config, yaml).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
        assert!(config.is_development());
        assert_eq!(config.tenant.fallback_slug.as_deref(), Some("primary"));
        assert_eq!(config.tenant.fallback_hosts, vec!["awcms.example.com"]);
        assert!(config.plugins.is_selected("mailketing"));
        assert!(!config.plugins.is_selected("regions"));
        assert_eq!(config.plugins.config_for("mailketing")["tracking_enabled"], false);
    }

    #[test]
    fn test_yaml_tls() {
        let mut config = ServerConfig::default();
        let yaml = YamlConfig::parse(
            "server:\n  tls:\n    cert_path: /c.pem\n    key_path: /k.pem\n",
        )
        .unwrap();
        apply_yaml(&mut config, yaml).unwrap();
        assert!(config.is_tls_enabled());

        let yaml = YamlConfig::parse("server:\n  tls:\n    enabled: false\n").unwrap();
        apply_yaml(&mut config, yaml).unwrap();
        assert!(!config.is_tls_enabled());

        let yaml = YamlConfig::parse("server:\n  tls:\n    cert_path: /c.pem\n").unwrap();
        assert!(apply_yaml(&mut config, yaml).is_err());
    }
}
