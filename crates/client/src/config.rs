//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `ECOMALL_API_BASE_URL` - Base URL of the store API (default: `http://127.0.0.1:8000/EcoMall/`)
//! - `ECOMALL_CACHE_DIR` - Directory for the local cart/wishlist/session cache (default: `.ecomall`)
//! - `ECOMALL_REQUEST_TIMEOUT_SECS` - Per-request timeout in seconds (default: 15)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/EcoMall/";
const DEFAULT_CACHE_DIR: &str = ".ecomall";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const MAX_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every API path is resolved against (always ends in `/`)
    pub api_base_url: Url,
    /// Directory holding the persisted local cache
    pub cache_dir: PathBuf,
    /// Timeout applied to every remote request
    pub request_timeout: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. "production", "staging")
    pub sentry_environment: Option<String>,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is present but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get_or_default = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let api_base_url = parse_base_url(
            "ECOMALL_API_BASE_URL",
            &get_or_default("ECOMALL_API_BASE_URL", DEFAULT_API_BASE_URL),
        )?;
        let cache_dir = PathBuf::from(get_or_default("ECOMALL_CACHE_DIR", DEFAULT_CACHE_DIR));
        let request_timeout = parse_timeout(
            "ECOMALL_REQUEST_TIMEOUT_SECS",
            &get_or_default(
                "ECOMALL_REQUEST_TIMEOUT_SECS",
                &DEFAULT_REQUEST_TIMEOUT_SECS.to_string(),
            ),
        )?;

        Ok(Self {
            api_base_url,
            cache_dir,
            request_timeout,
            sentry_dsn: lookup("SENTRY_DSN").filter(|v| !v.is_empty()),
            sentry_environment: lookup("SENTRY_ENVIRONMENT").filter(|v| !v.is_empty()),
        })
    }

    /// Configuration pointing at `base_url` with defaults for everything else.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `base_url` is not an absolute http(s) URL.
    pub fn for_base_url(
        base_url: &str,
        cache_dir: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            api_base_url: parse_base_url("base_url", base_url)?,
            cache_dir: cache_dir.into(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            sentry_dsn: None,
            sentry_environment: None,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse and normalize the API base URL.
///
/// A trailing slash is appended so relative paths join beneath it rather than
/// replacing the last segment.
fn parse_base_url(var_name: &str, value: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(value.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);

    Ok(url)
}

/// Parse a timeout in whole seconds.
fn parse_timeout(var_name: &str, value: &str) -> Result<Duration, ConfigError> {
    let secs = value
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(var_name.to_string(), e.to_string()))?;

    if secs == 0 || secs > MAX_REQUEST_TIMEOUT_SECS {
        return Err(ConfigError::InvalidEnvVar(
            var_name.to_string(),
            format!("must be between 1 and {MAX_REQUEST_TIMEOUT_SECS} seconds (got {secs})"),
        ));
    }

    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.api_base_url.as_str(), DEFAULT_API_BASE_URL);
        assert_eq!(config.cache_dir, PathBuf::from(".ecomall"));
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let config = ClientConfig::from_lookup(lookup_from(&[(
            "ECOMALL_API_BASE_URL",
            "https://shop.example.com/EcoMall",
        )]))
        .unwrap();
        assert_eq!(
            config.api_base_url.as_str(),
            "https://shop.example.com/EcoMall/"
        );
        assert_eq!(
            config.api_base_url.join("cart/").unwrap().as_str(),
            "https://shop.example.com/EcoMall/cart/"
        );
    }

    #[test]
    fn test_base_url_rejects_non_http() {
        let result = ClientConfig::from_lookup(lookup_from(&[(
            "ECOMALL_API_BASE_URL",
            "ftp://shop.example.com/",
        )]));
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(_, _))));

        let result =
            ClientConfig::from_lookup(lookup_from(&[("ECOMALL_API_BASE_URL", "not a url")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_timeout_validation() {
        let config = ClientConfig::from_lookup(lookup_from(&[(
            "ECOMALL_REQUEST_TIMEOUT_SECS",
            "30",
        )]))
        .unwrap();
        assert_eq!(config.request_timeout, Duration::from_secs(30));

        for bad in ["0", "-1", "ten", "301"] {
            let result = ClientConfig::from_lookup(lookup_from(&[(
                "ECOMALL_REQUEST_TIMEOUT_SECS",
                bad,
            )]));
            assert!(result.is_err(), "timeout {bad} should be rejected");
        }
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("ECOMALL_CACHE_DIR", "  "),
            ("SENTRY_DSN", ""),
        ]))
        .unwrap();
        assert_eq!(config.cache_dir, PathBuf::from(".ecomall"));
        assert!(config.sentry_dsn.is_none());
    }

    #[test]
    fn test_for_base_url() {
        let config = ClientConfig::for_base_url("http://127.0.0.1:9000/api", "/tmp/cache").unwrap();
        assert_eq!(config.api_base_url.as_str(), "http://127.0.0.1:9000/api/");
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/cache"));
    }
}
