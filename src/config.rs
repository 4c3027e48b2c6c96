//! Picker terminal configuration.
//!
//! Replaces the globals the hosting page used to inject (`csrfToken`,
//! `window.SETTINGS`, embedded product data) with one explicit struct built
//! at startup and passed into the session initializer and reporting client.

use std::path::PathBuf;

use crate::sort::SortMode;

/// Everything the picker needs from its environment, resolved once at startup.
#[derive(Debug, Clone)]
pub struct PickerConfig {
    /// Base URL of the OrderPiQR server, normalized (scheme present, no
    /// trailing slash).
    pub server_url: String,
    /// CSRF token sent with every reporting POST.
    pub csrf_token: String,
    /// Default matching policy for a fresh session; the picker can toggle it.
    pub order_important: bool,
    /// Sort applied to a freshly accepted picklist.
    pub default_sort: SortMode,
    /// Directory holding the local SQLite database and log files.
    pub data_dir: PathBuf,
    /// Optional remote fingerprint service; when unset or unreachable a local
    /// identifier is generated instead.
    pub fingerprint_url: Option<String>,
}

impl PickerConfig {
    /// Build the config from environment variables, applying defaults that
    /// match the hosting page's initial state.
    ///
    /// - `ORDERPIQR_SERVER_URL` (default `http://localhost:8000`)
    /// - `ORDERPIQR_CSRF_TOKEN` (default empty)
    /// - `ORDERPIQR_ORDER_IMPORTANT` (`true`/`1`/`yes`/`on`, default false)
    /// - `ORDERPIQR_DEFAULT_SORT` (`original`/`location`/`description`)
    /// - `ORDERPIQR_DATA_DIR` (default `./orderpiqr-data`)
    /// - `ORDERPIQR_FINGERPRINT_URL` (optional)
    pub fn from_env() -> Self {
        let server_url = std::env::var("ORDERPIQR_SERVER_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|s| normalize_server_url(&s))
            .unwrap_or_else(|| "http://localhost:8000".to_string());

        let csrf_token = std::env::var("ORDERPIQR_CSRF_TOKEN").unwrap_or_default();

        let order_important = std::env::var("ORDERPIQR_ORDER_IMPORTANT")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let default_sort = std::env::var("ORDERPIQR_DEFAULT_SORT")
            .ok()
            .and_then(|v| v.trim().parse::<SortMode>().ok())
            .unwrap_or(SortMode::Original);

        let data_dir = std::env::var("ORDERPIQR_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("orderpiqr-data"));

        let fingerprint_url = std::env::var("ORDERPIQR_FINGERPRINT_URL")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        PickerConfig {
            server_url,
            csrf_token,
            order_important,
            default_sort,
            data_dir,
            fingerprint_url,
        }
    }
}

/// Interpret a boolean-ish config string.
pub(crate) fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Normalise the server URL:
/// - strip trailing slashes
/// - ensure a scheme is present (https, or http for localhost)
pub fn normalize_server_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    // Ensure scheme
    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    // Strip trailing slashes
    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_normalize_adds_https_scheme() {
        assert_eq!(
            normalize_server_url("warehouse.example.com"),
            "https://warehouse.example.com"
        );
    }

    #[test]
    fn test_normalize_uses_http_for_localhost() {
        assert_eq!(
            normalize_server_url("localhost:8000"),
            "http://localhost:8000"
        );
        assert_eq!(
            normalize_server_url("127.0.0.1:8000"),
            "http://127.0.0.1:8000"
        );
    }

    #[test]
    fn test_normalize_strips_trailing_slashes() {
        assert_eq!(
            normalize_server_url("https://example.com///"),
            "https://example.com"
        );
    }

    #[test]
    fn test_parse_flag_variants() {
        for yes in ["true", "1", "yes", "on", " TRUE ", "On"] {
            assert!(parse_flag(yes), "{yes} should parse as true");
        }
        for no in ["false", "0", "no", "off", "", "banana"] {
            assert!(!parse_flag(no), "{no} should parse as false");
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        for key in [
            "ORDERPIQR_SERVER_URL",
            "ORDERPIQR_CSRF_TOKEN",
            "ORDERPIQR_ORDER_IMPORTANT",
            "ORDERPIQR_DEFAULT_SORT",
            "ORDERPIQR_DATA_DIR",
            "ORDERPIQR_FINGERPRINT_URL",
        ] {
            std::env::remove_var(key);
        }

        let cfg = PickerConfig::from_env();
        assert_eq!(cfg.server_url, "http://localhost:8000");
        assert_eq!(cfg.csrf_token, "");
        assert!(!cfg.order_important);
        assert_eq!(cfg.default_sort, SortMode::Original);
        assert!(cfg.fingerprint_url.is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_reads_overrides() {
        std::env::set_var("ORDERPIQR_SERVER_URL", "warehouse.example.com/");
        std::env::set_var("ORDERPIQR_ORDER_IMPORTANT", "yes");
        std::env::set_var("ORDERPIQR_DEFAULT_SORT", "location");

        let cfg = PickerConfig::from_env();
        assert_eq!(cfg.server_url, "https://warehouse.example.com");
        assert!(cfg.order_important);
        assert_eq!(cfg.default_sort, SortMode::Location);

        std::env::remove_var("ORDERPIQR_SERVER_URL");
        std::env::remove_var("ORDERPIQR_ORDER_IMPORTANT");
        std::env::remove_var("ORDERPIQR_DEFAULT_SORT");
    }
}
