//! Transport seam between the executor and the HTTP stack
//!
//! The executor's state machine only depends on the [`Transport`] trait,
//! so every retry/fallback path can be exercised against a scripted
//! transport. [`HttpTransport`] is the production implementation on
//! `reqwest`'s blocking client.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, RETRY_AFTER};
use serde_json::Value;
use thiserror::Error;

use super::response::RawResponse;
use crate::config::ConfigError;

/// HTTP method of a prepared request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
}

impl Method {
    /// Canonical upper-case name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => Self::GET,
            Method::Post => Self::POST,
            Method::Put => Self::PUT,
            Method::Delete => Self::DELETE,
        }
    }
}

/// One fully resolved HTTP attempt, ready to be sent
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL including the encoded query string
    pub url: String,
    /// Bearer token securing this attempt
    pub bearer_token: String,
    /// JSON body, when the operation carries one
    pub body: Option<Value>,
    /// Per-attempt timeout
    pub timeout: Duration,
}

/// Transport-level failures, before any HTTP status exists
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// No response arrived within the per-attempt timeout
    #[error("transport timed out after {0:?}")]
    Timeout(Duration),

    /// The connection could not be established or broke mid-flight
    #[error("connection failed: {0}")]
    Connection(String),
}

/// The seam the executor issues attempts through
pub trait Transport: Send + Sync {
    /// Perform one HTTP round trip
    ///
    /// # Errors
    /// Returns [`TransportError`] for timeouts and connection failures;
    /// responses with error statuses are *not* transport errors.
    fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError>;
}

/// Production transport on `reqwest::blocking`
///
/// The client is built without a global timeout; each attempt carries its
/// own, so one configuration value controls both connect and read time.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build the underlying HTTP client
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] when the TLS backend cannot be
    /// initialized.
    pub fn new() -> Result<Self, ConfigError> {
        let client = Client::builder().build().map_err(|err| ConfigError::Invalid {
            field: "http_client",
            message: err.to_string(),
        })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportError> {
        let classify_transport = |err: &reqwest::Error| {
            if err.is_timeout() {
                TransportError::Timeout(request.timeout)
            } else {
                TransportError::Connection(err.to_string())
            }
        };

        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .timeout(request.timeout)
            .header(AUTHORIZATION, format!("Bearer {}", request.bearer_token));
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().map_err(|err| classify_transport(&err))?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.text().map_err(|err| classify_transport(&err))?;

        Ok(RawResponse { status, retry_after, body })
    }
}
