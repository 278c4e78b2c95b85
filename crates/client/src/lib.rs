//! Request-execution pipeline for the Tasklane API
//!
//! This crate is the core of the Tasklane client: it turns a logical
//! operation ("fetch task X") into a reliable HTTP call, under a fixed
//! request budget, resilient to transient failures and credential
//! rejection. The resource wrappers, CLI, and local context store are
//! built on top and live elsewhere.
//!
//! # Architecture
//!
//! - [`ratelimit::TokenBucket`]: shared request budget per rolling
//!   minute; admission to the pipeline is a hard gate.
//! - [`credentials::CredentialResolver`]: picks the active credential
//!   from explicit parameter, environment, or the persisted config
//!   store, and supplies one fallback per call when the active one is
//!   rejected.
//! - [`client::response`]: pure classification of HTTP responses into
//!   payloads or typed [`ApiError`]s.
//! - [`client::ApiClient`]: the executor: acquires budget, issues
//!   attempts through a [`client::Transport`], and drives the
//!   retry/backoff/fallback state machine.
//!
//! Concurrent callers share one client (typically behind an `Arc`); each
//! call runs as an independent plan with strictly sequential attempts.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod ratelimit;
pub mod testing;

// Re-export the types the wrapper and CLI layers touch day to day.
pub use client::{
    next_action, ApiClient, HttpTransport, Method, NextAction, PreparedRequest, QueryValue,
    RawResponse, Transport, TransportError,
};
pub use config::{ClientConfig, ClientConfigBuilder, ConfigError, ConfigStore};
pub use credentials::{
    Credential, CredentialResolver, CredentialSource, TriedSources, ENV_TOKEN_VAR,
    STORE_TOKEN_KEY,
};
pub use error::{ApiError, ApiResult};
pub use ratelimit::TokenBucket;
