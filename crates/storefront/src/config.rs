//! Cart client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `CART_API_BASE_URL` - Base URL of the cart API (default: `http://localhost:5000`)
//! - `CART_API_TIMEOUT_MS` - Per-request timeout in milliseconds (default: 5000)
//! - `CART_API_RETRY_BACKOFF_MS` - Delay before the single retry (default: 200)
//! - `CART_STORAGE_DIR` - Directory for device-local cart storage (default: `.cart`)
//! - `CART_ZERO_QUANTITY_POLICY` - `remove` or `keep` (default: `remove`)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use newofyou_core::ZeroQuantityPolicy;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Remote cart API settings
    pub api: RemoteConfig,
    /// Where the device-local cart is stored
    pub storage_dir: PathBuf,
    /// What setting a guest line to zero does
    pub zero_quantity_policy: ZeroQuantityPolicy,
}

/// Remote cart API settings.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Base URL; cart routes live under `/api/shop/cart`
    pub base_url: Url,
    /// Timeout applied to each attempt
    pub timeout: Duration,
    /// Delay before retrying a transient failure
    pub retry_backoff: Duration,
}

const DEFAULT_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_TIMEOUT_MS: u64 = 5000;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 200;

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = parse_base_url(
            &lookup("CART_API_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        )?;
        let timeout = parse_millis(&lookup, "CART_API_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?;
        let retry_backoff =
            parse_millis(&lookup, "CART_API_RETRY_BACKOFF_MS", DEFAULT_RETRY_BACKOFF_MS)?;
        let storage_dir =
            PathBuf::from(lookup("CART_STORAGE_DIR").unwrap_or_else(|| ".cart".to_string()));
        let zero_quantity_policy = match lookup("CART_ZERO_QUANTITY_POLICY") {
            Some(raw) => raw.parse().map_err(|e: newofyou_core::ParsePolicyError| {
                ConfigError::InvalidEnvVar("CART_ZERO_QUANTITY_POLICY".to_string(), e.to_string())
            })?,
            None => ZeroQuantityPolicy::default(),
        };

        Ok(Self {
            api: RemoteConfig {
                base_url,
                timeout,
                retry_backoff,
            },
            storage_dir,
            zero_quantity_policy,
        })
    }
}

/// Parse and validate the API base URL.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar("CART_API_BASE_URL".to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "CART_API_BASE_URL".to_string(),
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url)
}

/// Parse a millisecond duration with a default.
fn parse_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(Duration::from_millis(default));
    };
    let millis = raw
        .trim()
        .parse::<u64>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if millis == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(Duration::from_millis(millis))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api.base_url.as_str(), "http://localhost:5000/");
        assert_eq!(config.api.timeout, Duration::from_secs(5));
        assert_eq!(config.api.retry_backoff, Duration::from_millis(200));
        assert_eq!(config.storage_dir, PathBuf::from(".cart"));
        assert_eq!(config.zero_quantity_policy, ZeroQuantityPolicy::Remove);
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("CART_API_BASE_URL", "https://api.example.test/v1/"),
            ("CART_API_TIMEOUT_MS", "1500"),
            ("CART_STORAGE_DIR", "/tmp/cart"),
            ("CART_ZERO_QUANTITY_POLICY", "keep"),
        ]))
        .unwrap();
        assert_eq!(config.api.base_url.as_str(), "https://api.example.test/v1/");
        assert_eq!(config.api.timeout, Duration::from_millis(1500));
        assert_eq!(config.storage_dir, PathBuf::from("/tmp/cart"));
        assert_eq!(config.zero_quantity_policy, ZeroQuantityPolicy::Keep);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(ClientConfig::from_lookup(lookup(&[("CART_API_BASE_URL", "ftp://x")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("CART_API_BASE_URL", "not a url")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("CART_API_TIMEOUT_MS", "0")])).is_err());
        assert!(ClientConfig::from_lookup(lookup(&[("CART_API_TIMEOUT_MS", "soon")])).is_err());
        assert!(
            ClientConfig::from_lookup(lookup(&[("CART_ZERO_QUANTITY_POLICY", "drop")])).is_err()
        );
    }
}
