//! Shared helpers for the integration suites
//!
//! Compiled into each test binary via `mod support;`.

#![allow(dead_code)]

use std::time::Duration;

use tasklane_client::testing::MockTransport;
use tasklane_client::{ApiClient, ClientConfig, CredentialResolver};

/// Configuration pointing both API versions at `base`, tuned for tests:
/// short timeout, zero backoff base so retries do not sleep.
pub fn test_config(base: &str) -> ClientConfig {
    ClientConfig::builder()
        .base_url(format!("{base}/api/v2"))
        .docs_base_url(format!("{base}/api/v3"))
        .request_timeout(Duration::from_secs(5))
        .backoff_base(Duration::ZERO)
        .build()
        .unwrap()
}

/// Resolver with an explicit credential only.
pub fn explicit_resolver(token: &str) -> CredentialResolver {
    CredentialResolver::new(Some(token.to_string()), None, None).unwrap()
}

/// Resolver with an explicit credential and an environment fallback.
pub fn resolver_with_env_fallback(explicit: &str, environment: &str) -> CredentialResolver {
    CredentialResolver::new(Some(explicit.to_string()), Some(environment.to_string()), None)
        .unwrap()
}

/// Client over a scripted transport against a dummy base URL.
pub fn mock_client(
    transport: MockTransport,
    credentials: CredentialResolver,
) -> ApiClient<MockTransport> {
    ApiClient::with_transport(test_config("https://api.test"), credentials, transport).unwrap()
}

/// Opt-in log output for debugging a failing test (`RUST_LOG=debug`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
