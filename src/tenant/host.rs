//! Request host and path inspection for tenant resolution.

use http::HeaderMap;
use http::header::HOST;
use once_cell::sync::Lazy;
use regex::Regex;

/// Header set by reverse proxies carrying the client-facing host.
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// First path segments that never name a tenant.
static RESERVED_SEGMENTS: phf::Set<&'static str> = phf::phf_set! {
    "api",
    "health",
    "favicon.ico",
    "robots.txt",
    "sitemap.xml",
    "assets",
    "static",
};

static SLUG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]{0,62}$").expect("slug pattern is valid"));

/// Derive the lookup host from request headers.
///
/// `X-Forwarded-Host` wins over `Host`. For a comma-separated forwarded list
/// the first (client-facing) entry is used. The port suffix is stripped and
/// the result is lower-cased. Returns `None` when no usable host is present.
pub fn request_host(headers: &HeaderMap) -> Option<String> {
    let raw = headers
        .get(X_FORWARDED_HOST)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get(HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })?;

    let host = strip_port(raw).to_ascii_lowercase();
    if host.is_empty() { None } else { Some(host) }
}

/// Remove a `:port` suffix. Bracketed IPv6 literals keep their brackets.
pub fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }

    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Extract a tenant slug candidate from the first path segment.
///
/// Reserved segments, internal segments (`_*`) and strings that are not
/// valid slugs yield `None`.
pub fn path_slug(path: &str) -> Option<&str> {
    let first = path.trim_start_matches('/').split('/').next()?.trim();

    if first.is_empty() || first.starts_with('_') {
        return None;
    }
    if RESERVED_SEGMENTS.contains(first.to_ascii_lowercase().as_str()) {
        return None;
    }
    if !is_valid_slug(first) {
        return None;
    }
    Some(first)
}

/// Paths served without a tenant context (internal and static assets).
pub fn is_passthrough_path(path: &str) -> bool {
    path.starts_with("/_") || path.starts_with("/favicon")
}

/// Validates that a string is a usable tenant slug.
pub fn is_valid_slug(s: &str) -> bool {
    SLUG_PATTERN.is_match(s)
}

/// Returns true if `host` equals `domain` or is a subdomain of it.
pub fn host_matches(host: &str, domain: &str) -> bool {
    let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return false;
    }
    host == domain
        || host
            .strip_suffix(domain.as_str())
            .is_some_and(|prefix| prefix.ends_with('.'))
}
