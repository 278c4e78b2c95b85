//! Client configuration
//!
//! [`ClientConfig`] is an explicitly constructed value passed into
//! [`crate::client::ApiClient::new`]; there is no ambient global
//! configuration. The builder validates on `build`, so an `ApiClient` can
//! assume its configuration is internally consistent.
//!
//! The persisted key-value store consumed for the stored credential lives
//! in [`store`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod store;

pub use store::ConfigStore;

/// Default base URL for the primary API version.
pub const DEFAULT_BASE_URL: &str = "https://api.tasklane.com/api/v2";

/// Default base URL for operations routed to the alternate API version.
pub const DEFAULT_DOCS_BASE_URL: &str = "https://api.tasklane.com/api/v3";

/// Configuration and construction errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A configuration field failed validation
    #[error("Invalid configuration in field '{field}': {message}")]
    Invalid {
        /// The offending field
        field: &'static str,
        /// What was wrong with it
        message: String,
    },

    /// No credential was found in any source
    #[error(
        "No API credential found: pass one explicitly, set the environment \
         variable, or store one in the config file"
    )]
    MissingCredential,

    /// The persisted config store could not be read or written
    #[error("Config store error at '{path}': {message}")]
    Store {
        /// Location of the store file
        path: String,
        /// Underlying failure
        message: String,
    },
}

/// Serde adapter storing a `Duration` as whole seconds
pub mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize a Duration as seconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    /// Deserialize seconds (u64) into a Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Tunables for one [`crate::client::ApiClient`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL requests are issued against
    pub base_url: String,

    /// Base URL for operations routed to the alternate API version
    pub docs_base_url: String,

    /// Per-attempt transport timeout
    #[serde(with = "duration_secs")]
    pub request_timeout: Duration,

    /// Maximum number of retry-slot-consuming attempts per request plan
    pub max_retries: u32,

    /// Request budget per rolling 60 second window
    pub requests_per_minute: u32,

    /// Base delay for exponential backoff (`base * 2^attempt`)
    #[serde(with = "duration_secs")]
    pub backoff_base: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            docs_base_url: DEFAULT_DOCS_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            requests_per_minute: 100,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl ClientConfig {
    /// Create a configuration builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Validate the configuration
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "base_url",
                message: "must not be empty".to_string(),
            });
        }
        if self.docs_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "docs_base_url",
                message: "must not be empty".to_string(),
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "request_timeout",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid {
                field: "max_retries",
                message: "must be greater than 0".to_string(),
            });
        }
        if self.requests_per_minute == 0 {
            return Err(ConfigError::Invalid {
                field: "requests_per_minute",
                message: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for [`ClientConfig`]
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Start from the default configuration
    pub fn new() -> Self {
        Self { config: ClientConfig::default() }
    }

    /// Override the primary base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Override the alternate-version base URL
    pub fn docs_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.docs_base_url = url.into();
        self
    }

    /// Override the per-attempt transport timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Override the attempt budget per request plan
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Override the per-minute request budget
    pub fn requests_per_minute(mut self, requests: u32) -> Self {
        self.config.requests_per_minute = requests;
        self
    }

    /// Override the exponential backoff base delay
    ///
    /// A zero base disables backoff sleeps, which is useful in tests.
    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.config.backoff_base = base;
        self
    }

    /// Validate and produce the configuration
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] when a field fails validation.
    pub fn build(self) -> Result<ClientConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn builder_overrides_fields() {
        let config = ClientConfig::builder()
            .base_url("https://staging.tasklane.dev/api/v2")
            .max_retries(5)
            .requests_per_minute(600)
            .backoff_base(Duration::ZERO)
            .build()
            .unwrap();

        assert_eq!(config.base_url, "https://staging.tasklane.dev/api/v2");
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.requests_per_minute, 600);
        assert!(config.backoff_base.is_zero());
    }

    #[test]
    fn validation_rejects_degenerate_fields() {
        assert!(ClientConfig::builder().base_url("").build().is_err());
        assert!(ClientConfig::builder().docs_base_url("  ").build().is_err());
        assert!(ClientConfig::builder().max_retries(0).build().is_err());
        assert!(ClientConfig::builder().requests_per_minute(0).build().is_err());
        assert!(ClientConfig::builder().request_timeout(Duration::ZERO).build().is_err());
    }

    #[test]
    fn zero_backoff_base_is_allowed() {
        assert!(ClientConfig::builder().backoff_base(Duration::ZERO).build().is_ok());
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let config = ClientConfig::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["request_timeout"], 30);
        assert_eq!(json["backoff_base"], 1);

        let back: ClientConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back.request_timeout, Duration::from_secs(30));
    }
}
