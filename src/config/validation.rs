//! Configuration validation.

use url::Url;

use super::{ConfigError, ServerConfig};
use crate::tenant::{SUPPORTED_LOCALES, is_valid_slug};

/// Validate a merged configuration.
pub fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    validate_supabase(config.supabase_url.as_deref(), config.supabase_key.as_deref())?;
    validate_tls(config)?;
    validate_tenant(config)?;
    validate_rate_limits(
        config.rate_limit_requests_per_second,
        config.rate_limit_burst_size,
    )?;
    Ok(())
}

fn validate_supabase(url: Option<&str>, key: Option<&str>) -> Result<(), ConfigError> {
    match (url, key) {
        (None, None) => Ok(()),
        (Some(url), Some(_)) => {
            let parsed = Url::parse(url).map_err(|e| ConfigError::InvalidValue {
                key: "SUPABASE_URL".to_string(),
                message: format!("'{url}': {e}"),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(ConfigError::InvalidValue {
                    key: "SUPABASE_URL".to_string(),
                    message: format!("'{url}' must use http or https"),
                });
            }
            Ok(())
        }
        _ => Err(ConfigError::Validation(
            "SUPABASE_URL and SUPABASE_KEY must be set together".to_string(),
        )),
    }
}

fn validate_tls(config: &ServerConfig) -> Result<(), ConfigError> {
    let Some(tls) = &config.tls else {
        return Ok(());
    };
    for path in [&tls.cert_path, &tls.key_path] {
        if !path.exists() {
            return Err(ConfigError::Validation(format!(
                "TLS file not found: {}",
                path.display()
            )));
        }
    }
    Ok(())
}

fn validate_tenant(config: &ServerConfig) -> Result<(), ConfigError> {
    let tenant = &config.tenant;

    if let Some(host) = &tenant.dev_tenant_host
        && !config.is_development()
    {
        tracing::warn!(
            dev_tenant_host = %host,
            environment = config.environment.as_str(),
            "DEV_TENANT_HOST is ignored outside development"
        );
    }

    if let Some(slug) = &tenant.fallback_slug
        && !is_valid_slug(slug)
    {
        return Err(ConfigError::InvalidValue {
            key: "TENANT_FALLBACK_SLUG".to_string(),
            message: format!("'{slug}' is not a valid tenant slug"),
        });
    }

    if tenant.fallback_slug.is_none() && !tenant.fallback_hosts.is_empty() {
        tracing::warn!("TENANT_FALLBACK_HOSTS has no effect without TENANT_FALLBACK_SLUG");
    }

    if tenant.lookup_timeout_seconds == 0 {
        return Err(ConfigError::InvalidValue {
            key: "TENANT_LOOKUP_TIMEOUT_SECONDS".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }

    if !SUPPORTED_LOCALES.contains_key(tenant.default_locale.as_str()) {
        return Err(ConfigError::InvalidValue {
            key: "DEFAULT_LOCALE".to_string(),
            message: format!("'{}' is not a supported locale", tenant.default_locale),
        });
    }

    Ok(())
}

fn validate_rate_limits(requests_per_second: u32, burst_size: u32) -> Result<(), ConfigError> {
    if requests_per_second == 0 {
        return Err(ConfigError::InvalidValue {
            key: "RATE_LIMIT_REQUESTS_PER_SECOND".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    if burst_size == 0 {
        return Err(ConfigError::InvalidValue {
            key: "RATE_LIMIT_BURST_SIZE".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(())
}
