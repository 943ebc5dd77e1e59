//! Client configuration.

use std::time::Duration;

use crate::error::{ApiError, ApiResult};

/// Default API base URL (the service exposes a single endpoint).
pub const DEFAULT_ENDPOINT: &str = "https://api.ooyala.com";

/// Default signature validity window (2 seconds).
pub const DEFAULT_EXPIRES_MS: u64 = 2000;

/// Default upload chunk size (10 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// Default number of selective re-upload rounds after the first attempt.
pub const DEFAULT_RETRY_LIMIT: u32 = 3;

/// Client configuration.
///
/// Read-only for the lifetime of a client. Validated once by
/// [`ClientConfig::validate`] when the client is built.
#[derive(Clone)]
pub struct ClientConfig {
    /// API base URL
    pub endpoint: String,
    /// API key, sent as `api_key`
    pub key: String,
    /// API secret, used only for signing
    pub secret: String,
    /// Added to "now" to compute the `expires` query parameter
    pub expires: Duration,
    /// Upload chunk size in bytes; also announced to the server on asset creation
    pub chunk_size: usize,
    /// Selective re-upload rounds allowed after the first
    pub retry_limit: u32,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Create a config with defaults for everything but the credentials.
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            key: key.into(),
            secret: secret.into(),
            expires: Duration::from_millis(DEFAULT_EXPIRES_MS),
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry_limit: DEFAULT_RETRY_LIMIT,
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> ApiResult<Self> {
        let key = std::env::var("OOYALA_API_KEY")
            .map_err(|_| ApiError::validation("OOYALA_API_KEY must be set"))?;
        let secret = std::env::var("OOYALA_API_SECRET")
            .map_err(|_| ApiError::validation("OOYALA_API_SECRET must be set"))?;

        let defaults = Self::new(key, secret);

        let config = Self {
            endpoint: std::env::var("OOYALA_ENDPOINT").unwrap_or(defaults.endpoint.clone()),
            expires: Duration::from_millis(env_parse("OOYALA_EXPIRES_MS", DEFAULT_EXPIRES_MS)),
            chunk_size: env_parse("OOYALA_CHUNK_SIZE", DEFAULT_CHUNK_SIZE),
            retry_limit: env_parse("OOYALA_RETRY_LIMIT", DEFAULT_RETRY_LIMIT),
            timeout: Duration::from_secs(env_parse("OOYALA_TIMEOUT_SECS", 60)),
            connect_timeout: Duration::from_secs(env_parse("OOYALA_CONNECT_TIMEOUT_SECS", 10)),
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_expires(mut self, expires: Duration) -> Self {
        self.expires = expires;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check the fields every request depends on.
    pub fn validate(&self) -> ApiResult<()> {
        if self.key.trim().is_empty() {
            return Err(ApiError::validation("Invalid 'config.key': must be a non-empty string"));
        }
        if self.secret.trim().is_empty() {
            return Err(ApiError::validation(
                "Invalid 'config.secret': must be a non-empty string",
            ));
        }
        if self.endpoint.trim().is_empty() {
            return Err(ApiError::validation(
                "Invalid 'config.endpoint': must be a non-empty string",
            ));
        }
        if self.chunk_size == 0 {
            return Err(ApiError::validation("Invalid 'config.chunk_size': must be positive"));
        }
        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .field("expires", &self.expires)
            .field("chunk_size", &self.chunk_size)
            .field("retry_limit", &self.retry_limit)
            .field("timeout", &self.timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "OOYALA_API_KEY",
            "OOYALA_API_SECRET",
            "OOYALA_ENDPOINT",
            "OOYALA_EXPIRES_MS",
            "OOYALA_CHUNK_SIZE",
            "OOYALA_RETRY_LIMIT",
            "OOYALA_TIMEOUT_SECS",
            "OOYALA_CONNECT_TIMEOUT_SECS",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new("key", "secret");
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.expires, Duration::from_millis(2000));
        assert_eq!(config.chunk_size, 10 * 1024 * 1024);
        assert_eq!(config.retry_limit, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_credentials() {
        assert!(ClientConfig::new("", "secret").validate().unwrap_err().is_validation());
        assert!(ClientConfig::new("key", " ").validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let config = ClientConfig::new("key", "secret").with_chunk_size(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_base_url_trims_slash() {
        let config = ClientConfig::new("key", "secret").with_endpoint("http://localhost:8080/");
        assert_eq!(config.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let debug = format!("{:?}", ClientConfig::new("key", "top-secret"));
        assert!(!debug.contains("top-secret"));
    }

    #[test]
    #[serial]
    fn test_from_env_requires_credentials() {
        clear_env();
        assert!(ClientConfig::from_env().is_err());

        std::env::set_var("OOYALA_API_KEY", "key");
        assert!(ClientConfig::from_env().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_parses_overrides() {
        clear_env();
        std::env::set_var("OOYALA_API_KEY", "key");
        std::env::set_var("OOYALA_API_SECRET", "secret");
        std::env::set_var("OOYALA_CHUNK_SIZE", "1024");
        std::env::set_var("OOYALA_RETRY_LIMIT", "5");
        std::env::set_var("OOYALA_EXPIRES_MS", "not-a-number");

        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.retry_limit, 5);
        assert_eq!(config.expires, Duration::from_millis(DEFAULT_EXPIRES_MS));
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        clear_env();
    }
}
