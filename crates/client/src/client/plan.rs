//! Per-call bookkeeping
//!
//! A `RequestPlan` tracks one logical API call across all of its HTTP
//! round trips: the attempt counter (bounded by `max_retries`), the
//! single-shot credential-fallback flag, the per-plan tried-source set,
//! and an ordered record of attempt outcomes for logging. Plans are
//! created per call and discarded on resolution; nothing here outlives
//! the call.

use crate::credentials::{CredentialSource, TriedSources};

use super::transport::Method;

/// Outcome record of one HTTP round trip
#[derive(Debug)]
struct Attempt {
    index: u32,
    outcome: String,
}

pub(crate) struct RequestPlan {
    pub method: Method,
    pub path: String,
    /// Current retry-slot index, 0-based
    pub attempt: u32,
    /// Set once the one allowed credential substitution has been spent
    pub fallback_attempted: bool,
    /// Sources that have secured an attempt of this plan
    pub tried: TriedSources,
    attempts: Vec<Attempt>,
}

impl RequestPlan {
    pub fn new(method: Method, path: &str, active_source: CredentialSource) -> Self {
        Self {
            method,
            path: path.to_string(),
            attempt: 0,
            fallback_attempted: false,
            tried: TriedSources::seeded(active_source),
            attempts: Vec::new(),
        }
    }

    /// Record the outcome of the round trip that just finished
    pub fn record(&mut self, outcome: impl Into<String>) {
        self.attempts.push(Attempt { index: self.attempt, outcome: outcome.into() });
    }

    /// Total HTTP calls made so far (fallback repeats share an index)
    pub fn calls(&self) -> usize {
        self.attempts.len()
    }

    /// Compact history for log lines, e.g. `"0: HTTP 401; 0: success"`
    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(|attempt| format!("{}: {}", attempt.index, attempt.outcome))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
