//! Retry policy
//!
//! The executor mixes three wait strategies keyed off the error
//! classification: none (transport failures and credential fallback),
//! server-directed (rate limits), and exponential backoff (everything
//! else retryable). [`next_action`] encodes that choice as a pure
//! function so the policy is testable without any transport.

use std::time::Duration;

use crate::error::ApiError;

/// What the executor should do with a failed attempt
#[derive(Debug)]
pub enum NextAction {
    /// Consume a retry slot and try again after `delay`
    Retry {
        /// How long to sleep before the next attempt
        delay: Duration,
    },
    /// Swap in a fallback credential and repeat the same attempt index
    RetryWithNewCredential,
    /// Give up and propagate the error
    Fail(ApiError),
}

/// Decide how to proceed after attempt `attempt` (0-based) failed
///
/// `fallback_attempted` is the plan's single-shot credential-fallback
/// flag: a second rejection never triggers another substitution.
#[must_use]
pub fn next_action(
    error: ApiError,
    attempt: u32,
    max_retries: u32,
    fallback_attempted: bool,
    backoff_base: Duration,
) -> NextAction {
    let last_attempt = attempt + 1 >= max_retries;

    match error {
        ApiError::Unauthorized { .. } => {
            if fallback_attempted {
                NextAction::Fail(error)
            } else {
                NextAction::RetryWithNewCredential
            }
        }
        // A missing resource will still be missing on the next attempt.
        ApiError::NotFound { .. } => NextAction::Fail(error),
        ApiError::RateLimited { retry_after } => {
            if last_attempt {
                NextAction::Fail(error)
            } else {
                NextAction::Retry { delay: retry_after }
            }
        }
        // Transport-level failures retry immediately; there is no server
        // to be gentle with, and the per-attempt timeout already paced us.
        ApiError::Timeout { .. } | ApiError::Api { status: 0, .. } => {
            if last_attempt {
                NextAction::Fail(error)
            } else {
                NextAction::Retry { delay: Duration::ZERO }
            }
        }
        ApiError::Validation { .. } | ApiError::Api { .. } => {
            if last_attempt {
                NextAction::Fail(error)
            } else {
                NextAction::Retry { delay: exponential_delay(backoff_base, attempt) }
            }
        }
        // Terminal by construction; nothing sensible to retry.
        ApiError::RetriesExhausted { .. } | ApiError::Config(_) => NextAction::Fail(error),
    }
}

/// `base * 2^attempt`, saturating rather than overflowing
fn exponential_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2_u32.saturating_pow(attempt))
}
