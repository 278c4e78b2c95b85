//! Typed errors surfaced by the request pipeline
//!
//! Every HTTP response that is not a success classifies into exactly one
//! [`ApiError`] variant, and every variant keeps the original status code
//! and the message extracted from the remote body, so the CLI boundary
//! can render actionable guidance without re-parsing anything.
//!
//! Classification drives the retry loop: [`ApiError::is_retryable`] and
//! [`ApiError::retry_after`] are the two questions the executor's policy
//! asks of an error.

use std::fmt;
use std::time::Duration;

pub use crate::config::ConfigError;

/// Result alias for pipeline operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Classified outcome of a failed API call
///
/// The first five variants mirror the remote service's documented failure
/// modes; `Timeout` is transport-level, and `RetriesExhausted` is the
/// terminal outcome of a retry loop that never reached a classification.
/// A connection failure on the final attempt surfaces as
/// `Api { status: 0, .. }`.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// The active credential was rejected (HTTP 401)
    Unauthorized {
        /// Message extracted from the response body
        message: String,
    },

    /// The addressed resource does not exist (HTTP 404)
    NotFound {
        /// Resource kind, derived from the request path ("task", "list", ...)
        resource_type: String,
        /// Resource identifier, when the path carried one
        identifier: Option<String>,
    },

    /// The request budget on the server side is exhausted (HTTP 429)
    RateLimited {
        /// Server-directed wait before the next attempt
        retry_after: Duration,
    },

    /// The request payload failed remote validation (HTTP 400)
    Validation {
        /// Message extracted from the response body
        message: String,
    },

    /// Any other non-success response, or a connection failure (status 0)
    Api {
        /// HTTP status code; 0 for connection-level failures
        status: u16,
        /// Message extracted from the response body
        message: String,
    },

    /// The transport gave up waiting for a response
    Timeout {
        /// The per-attempt timeout that elapsed
        timeout: Duration,
    },

    /// The retry loop ran out of attempts without a terminal outcome
    RetriesExhausted {
        /// Number of attempts that were made
        attempts: u32,
    },

    /// Client construction or configuration failure
    Config(ConfigError),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthorized { message } => write!(f, "Unauthorized: {message}"),
            Self::NotFound { resource_type, identifier } => {
                if let Some(id) = identifier {
                    write!(f, "{resource_type} not found: '{id}'")
                } else {
                    write!(f, "{resource_type} not found")
                }
            }
            Self::RateLimited { retry_after } => {
                write!(f, "Rate limit exceeded (retry in {retry_after:?})")
            }
            Self::Validation { message } => write!(f, "Validation failed: {message}"),
            Self::Api { status: 0, message } => write!(f, "Connection failed: {message}"),
            Self::Api { status, message } => write!(f, "API error (HTTP {status}): {message}"),
            Self::Timeout { timeout } => write!(f, "Request timed out after {timeout:?}"),
            Self::RetriesExhausted { attempts } => {
                write!(f, "Max retries exceeded after {attempts} attempts")
            }
            Self::Config(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl ApiError {
    /// Whether the retry loop may attempt this request again
    ///
    /// Unauthorized is deliberately *not* retryable here: the executor
    /// handles it through the one-shot credential fallback instead of the
    /// backoff path.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Validation { .. } | Self::Api { .. }
            | Self::Timeout { .. } => true,
            Self::Unauthorized { .. }
            | Self::NotFound { .. }
            | Self::RetriesExhausted { .. }
            | Self::Config(_) => false,
        }
    }

    /// Server-directed wait, when the error carries one
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Original HTTP status code, when the error corresponds to one
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { .. } => Some(401),
            Self::NotFound { .. } => Some(404),
            Self::RateLimited { .. } => Some(429),
            Self::Validation { .. } => Some(400),
            Self::Api { status, .. } => Some(*status),
            Self::Timeout { .. } | Self::RetriesExhausted { .. } | Self::Config(_) => None,
        }
    }

    /// Message extracted from the remote response, where one exists
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Unauthorized { message }
            | Self::Validation { message }
            | Self::Api { message, .. } => Some(message),
            _ => None,
        }
    }
}
