//! Locale negotiation from `Accept-Language`.

use http::HeaderMap;
use http::header::ACCEPT_LANGUAGE;

/// Supported portal locales (code -> display name).
pub static SUPPORTED_LOCALES: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "en" => "English",
    "id" => "Bahasa Indonesia",
    "ar" => "العربية",
    "zh" => "中文",
    "ja" => "日本語",
};

/// Locales rendered right-to-left.
static RTL_LOCALES: phf::Set<&'static str> = phf::phf_set! { "ar" };

pub const DEFAULT_LOCALE: &str = "en";

pub fn is_supported_locale(code: &str) -> bool {
    SUPPORTED_LOCALES.contains_key(code)
}

pub fn is_rtl(code: &str) -> bool {
    RTL_LOCALES.contains(code)
}

/// Pick the first supported language from `Accept-Language`.
///
/// Region subtags are ignored (`en-US` -> `en`) and entries keep header
/// order; quality values are not re-sorted. Falls back to `default`.
pub fn detect_locale(headers: &HeaderMap, default: &str) -> String {
    let Some(accept) = headers.get(ACCEPT_LANGUAGE).and_then(|v| v.to_str().ok()) else {
        return default.to_string();
    };

    accept
        .split(',')
        .filter_map(|entry| entry.trim().split(';').next())
        .filter_map(|tag| tag.split('-').next())
        .map(|code| code.trim().to_ascii_lowercase())
        .find(|code| is_supported_locale(code))
        .unwrap_or_else(|| default.to_string())
}
