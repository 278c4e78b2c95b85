//! Request execution
//!
//! [`ApiClient`] turns a logical operation ("fetch task X") into a
//! reliable HTTP call: it waits for rate-limit budget, issues the attempt
//! through a [`Transport`], classifies the response, and drives the
//! retry/backoff/credential-fallback state machine until the plan
//! resolves.
//!
//! One client instance is shared across threads; concurrent plans contend
//! on the token bucket and observe each other's credential swaps, but are
//! otherwise independent.

use std::thread;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

mod plan;
pub mod policy;
pub mod query;
pub mod response;
pub mod transport;

pub use policy::{next_action, NextAction};
pub use query::QueryValue;
pub use response::RawResponse;
pub use transport::{HttpTransport, Method, PreparedRequest, Transport, TransportError};

use crate::config::ClientConfig;
use crate::credentials::CredentialResolver;
use crate::error::{ApiError, ApiResult};
use crate::ratelimit::TokenBucket;
use plan::RequestPlan;

/// Path prefix routed to the alternate API-version base URL.
const DOCS_PREFIX: &str = "docs";

/// The request executor
///
/// Generic over [`Transport`] so the full state machine can run against a
/// scripted transport in tests; production code uses the default
/// [`HttpTransport`].
///
/// # Examples
///
/// ```no_run
/// use tasklane_client::{ApiClient, ClientConfig, CredentialResolver, QueryValue};
///
/// # fn example() -> Result<(), tasklane_client::ApiError> {
/// let credentials = CredentialResolver::new(Some("tl_token".into()), None, None)?;
/// let client = ApiClient::new(ClientConfig::default(), credentials)?;
///
/// let task = client.get("task/9hz42", &[("include_subtasks", QueryValue::one(true))])?;
/// println!("{}", task["name"]);
/// # Ok(())
/// # }
/// ```
pub struct ApiClient<T: Transport = HttpTransport> {
    config: ClientConfig,
    transport: T,
    bucket: TokenBucket,
    credentials: CredentialResolver,
}

impl ApiClient<HttpTransport> {
    /// Create a client with the production HTTP transport
    ///
    /// # Errors
    /// Returns [`ApiError::Config`] when the configuration is invalid or
    /// the HTTP client cannot be built.
    pub fn new(config: ClientConfig, credentials: CredentialResolver) -> ApiResult<Self> {
        let transport = HttpTransport::new()?;
        Self::with_transport(config, credentials, transport)
    }
}

impl<T: Transport> ApiClient<T> {
    /// Create a client over a caller-supplied transport
    ///
    /// # Errors
    /// Returns [`ApiError::Config`] when the configuration is invalid.
    pub fn with_transport(
        config: ClientConfig,
        credentials: CredentialResolver,
        transport: T,
    ) -> ApiResult<Self> {
        config.validate()?;
        let bucket = TokenBucket::new(config.requests_per_minute)?;
        Ok(Self { config, transport, bucket, credentials })
    }

    /// Execute one logical API call to completion
    ///
    /// Blocks until rate-limit budget admits the plan, then runs up to
    /// `max_retries` attempts. Returns the parsed success payload, or the
    /// classified error of the attempt that resolved the plan.
    ///
    /// # Errors
    /// Any [`ApiError`]; see the crate-level taxonomy. Wrappers must
    /// propagate these, never swallow them.
    pub fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, QueryValue)],
        body: Option<&Value>,
    ) -> ApiResult<Value> {
        // Admission is a hard gate, not a hint: wait for budget before
        // the first attempt, however long that takes.
        if !self.bucket.acquire(1.0, None) {
            return Err(ApiError::RateLimited { retry_after: Duration::from_secs(60) });
        }

        let url = self.url_for(path, query);
        let mut credential = self.credentials.active();
        let mut plan = RequestPlan::new(method, path, credential.source());

        while plan.attempt < self.config.max_retries {
            debug!(
                "{} {} (attempt {}/{})",
                method.as_str(),
                path,
                plan.attempt + 1,
                self.config.max_retries
            );

            let request = PreparedRequest {
                method,
                url: url.clone(),
                bearer_token: credential.token().to_string(),
                body: body.cloned(),
                timeout: self.config.request_timeout,
            };

            let error = match self.transport.send(&request) {
                Ok(raw) => match response::classify(&raw, path) {
                    Ok(payload) => {
                        plan.record("success");
                        debug!(
                            "{} {} resolved after {} calls",
                            plan.method.as_str(),
                            plan.path,
                            plan.calls()
                        );
                        return Ok(payload);
                    }
                    Err(error) => error,
                },
                Err(TransportError::Timeout(timeout)) => ApiError::Timeout { timeout },
                Err(TransportError::Connection(message)) => {
                    ApiError::Api { status: 0, message }
                }
            };
            plan.record(error.to_string());

            let action = policy::next_action(
                error.clone(),
                plan.attempt,
                self.config.max_retries,
                plan.fallback_attempted,
                self.config.backoff_base,
            );

            match action {
                NextAction::RetryWithNewCredential => {
                    plan.fallback_attempted = true;
                    match self.credentials.fallback(&mut plan.tried) {
                        // Same attempt index: the substitution consumes no
                        // retry slot and sleeps for nothing.
                        Some(next) => credential = next,
                        None => {
                            warn!(
                                "{} {} failed, no fallback credential [{}]",
                                plan.method.as_str(),
                                plan.path,
                                plan.summary()
                            );
                            return Err(error);
                        }
                    }
                }
                NextAction::Retry { delay } => {
                    if !delay.is_zero() {
                        debug!("Waiting {:?} before attempt {}", delay, plan.attempt + 2);
                        thread::sleep(delay);
                    }
                    plan.attempt += 1;
                }
                NextAction::Fail(error) => {
                    warn!(
                        "{} {} failed after {} calls: {} [{}]",
                        plan.method.as_str(),
                        plan.path,
                        plan.calls(),
                        error,
                        plan.summary()
                    );
                    return Err(error);
                }
            }
        }

        Err(ApiError::RetriesExhausted { attempts: self.config.max_retries })
    }

    /// `GET` convenience wrapper around [`Self::execute`]
    ///
    /// # Errors
    /// See [`Self::execute`].
    pub fn get(&self, path: &str, query: &[(&str, QueryValue)]) -> ApiResult<Value> {
        self.execute(Method::Get, path, query, None)
    }

    /// `POST` convenience wrapper around [`Self::execute`]
    ///
    /// # Errors
    /// See [`Self::execute`].
    pub fn post(&self, path: &str, body: &Value) -> ApiResult<Value> {
        self.execute(Method::Post, path, &[], Some(body))
    }

    /// `PUT` convenience wrapper around [`Self::execute`]
    ///
    /// # Errors
    /// See [`Self::execute`].
    pub fn put(&self, path: &str, body: &Value) -> ApiResult<Value> {
        self.execute(Method::Put, path, &[], Some(body))
    }

    /// `DELETE` convenience wrapper around [`Self::execute`]
    ///
    /// # Errors
    /// See [`Self::execute`].
    pub fn delete(&self, path: &str) -> ApiResult<Value> {
        self.execute(Method::Delete, path, &[], None)
    }

    /// The configuration this client was built with
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The credential resolver owned by this client
    pub fn credentials(&self) -> &CredentialResolver {
        &self.credentials
    }

    /// The shared rate-limit bucket
    pub fn rate_limiter(&self) -> &TokenBucket {
        &self.bucket
    }

    /// Resolve a request path against the right base URL and attach the
    /// encoded query string.
    fn url_for(&self, path: &str, params: &[(&str, QueryValue)]) -> String {
        let trimmed = path.trim_start_matches('/');
        let routed_to_docs = trimmed
            .strip_prefix(DOCS_PREFIX)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'));
        let base = if routed_to_docs {
            &self.config.docs_base_url
        } else {
            &self.config.base_url
        };

        let mut url = format!("{}/{}", base.trim_end_matches('/'), trimmed);
        let query = query::encode_query(params);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialResolver;
    use crate::testing::MockTransport;

    fn client(transport: MockTransport) -> ApiClient<MockTransport> {
        let config = ClientConfig::builder()
            .base_url("https://api.test/api/v2")
            .docs_base_url("https://api.test/api/v3")
            .backoff_base(Duration::ZERO)
            .build()
            .unwrap();
        let credentials = CredentialResolver::new(Some("tok-test".into()), None, None).unwrap();
        ApiClient::with_transport(config, credentials, transport).unwrap()
    }

    #[test]
    fn paths_resolve_against_the_primary_base() {
        let client = client(MockTransport::new());
        assert_eq!(client.url_for("task/9hz", &[]), "https://api.test/api/v2/task/9hz");
        assert_eq!(client.url_for("/task/9hz", &[]), "https://api.test/api/v2/task/9hz");
    }

    #[test]
    fn docs_paths_route_to_the_alternate_base() {
        let client = client(MockTransport::new());
        assert_eq!(
            client.url_for("docs/workspace/123", &[]),
            "https://api.test/api/v3/docs/workspace/123"
        );
        assert_eq!(client.url_for("docs", &[]), "https://api.test/api/v3/docs");
        // A prefix match requires a segment boundary.
        assert_eq!(
            client.url_for("docstore/1", &[]),
            "https://api.test/api/v2/docstore/1"
        );
    }

    #[test]
    fn queries_attach_after_the_path() {
        let client = client(MockTransport::new());
        assert_eq!(
            client.url_for("list/7/task", &[("assignees", QueryValue::many([4, 5]))]),
            "https://api.test/api/v2/list/7/task?assignees[]=4&assignees[]=5"
        );
    }

    #[test]
    fn success_returns_the_payload_on_the_first_call() {
        let transport = MockTransport::new();
        transport.push_status(200, r#"{"id": "9hz"}"#);

        let client = client(transport.clone());
        let payload = client.get("task/9hz", &[]).unwrap();
        assert_eq!(payload["id"], "9hz");
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn requests_carry_the_bearer_token() {
        let transport = MockTransport::new();
        transport.push_status(200, "{}");

        let client = client(transport.clone());
        client.get("task/9hz", &[]).unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].bearer_token, "tok-test");
        assert_eq!(requests[0].method, Method::Get);
    }

    #[test]
    fn bodies_are_forwarded_unchanged() {
        let transport = MockTransport::new();
        transport.push_status(201, r#"{"id": "new"}"#);

        let client = client(transport.clone());
        let body = serde_json::json!({"name": "Ship it", "assignees": [4]});
        client.post("list/7/task", &body).unwrap();

        assert_eq!(transport.requests()[0].body.as_ref().unwrap(), &body);
    }
}
