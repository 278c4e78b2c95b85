//! Request-budget rate limiting
//!
//! A token bucket bounds the number of requests a client issues per
//! rolling 60 second window. The budget is a fractional token count that
//! refills continuously at `capacity / 60` tokens per second, computed
//! lazily from elapsed time, so an idle bucket converges back to full
//! capacity without a background task.
//!
//! The token count and the last-refill timestamp are the only state
//! shared between concurrent callers; both live behind a single mutex.
//! Sleeping while a caller waits for budget happens outside the lock.

use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::config::ConfigError;
use crate::testing::{Clock, SystemClock};

/// Length of the rolling window the capacity applies to.
const WINDOW: Duration = Duration::from_secs(60);

/// Padding added to computed waits so float rounding cannot leave a
/// sleeper perpetually one epsilon short of its deficit.
const WAIT_PAD: Duration = Duration::from_millis(2);

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket shared by every request plan of one client
///
/// Starts full. `acquire` blocks until the requested budget is available
/// (or a caller-supplied timeout elapses), which makes admission a hard
/// gate rather than a hint: a burst of callers drains the bucket and the
/// rest queue on the refill rate.
///
/// # Examples
///
/// ```
/// use tasklane_client::ratelimit::TokenBucket;
///
/// # fn example() -> Result<(), tasklane_client::ConfigError> {
/// let bucket = TokenBucket::new(100)?;
/// assert!(bucket.acquire(1.0, None));
/// assert!(bucket.available() < 100.0);
/// # Ok(())
/// # }
/// ```
pub struct TokenBucket<C: Clock = SystemClock> {
    capacity: f64,
    refill_rate: f64,
    state: Mutex<BucketState>,
    clock: C,
}

impl TokenBucket<SystemClock> {
    /// Create a bucket allowing `capacity` requests per rolling minute
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] when `capacity` is zero.
    pub fn new(capacity: u32) -> Result<Self, ConfigError> {
        Self::with_clock(capacity, SystemClock)
    }
}

impl<C: Clock> TokenBucket<C> {
    /// Create a bucket with a custom clock
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] when `capacity` is zero.
    pub fn with_clock(capacity: u32, clock: C) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "capacity",
                message: "must be greater than 0".to_string(),
            });
        }

        let capacity = f64::from(capacity);
        Ok(Self {
            capacity,
            refill_rate: capacity / WINDOW.as_secs_f64(),
            state: Mutex::new(BucketState { tokens: capacity, last_refill: clock.now() }),
            clock,
        })
    }

    /// Apply the lazily computed refill to the locked state.
    fn refill(&self, state: &mut BucketState) {
        let now = self.clock.now();
        let elapsed = now.saturating_duration_since(state.last_refill);
        let replenished = elapsed.as_secs_f64() * self.refill_rate;

        if replenished > 0.0 {
            state.tokens = (state.tokens + replenished).min(self.capacity);
            state.last_refill = now;
        }
    }

    /// Acquire `count` tokens, blocking until they are available
    ///
    /// Returns `true` once the tokens have been consumed. Returns `false`
    /// when `count` exceeds the bucket capacity (which could never be
    /// satisfied, so the call fails immediately instead of blocking
    /// forever) or when `timeout` would elapse before enough budget
    /// refills.
    ///
    /// The wait is a sleep computed from the current deficit and the
    /// refill rate; other callers may consume tokens while this caller
    /// sleeps, in which case it re-evaluates and keeps waiting.
    pub fn acquire(&self, count: f64, timeout: Option<Duration>) -> bool {
        if count <= 0.0 {
            return true;
        }
        if count > self.capacity {
            warn!(
                "Rate limit: requested {} tokens exceeds capacity {}, rejecting",
                count, self.capacity
            );
            return false;
        }

        let deadline = timeout.map(|t| self.clock.now() + t);

        loop {
            let wait = {
                let mut state = self.state.lock();
                self.refill(&mut state);

                if state.tokens >= count {
                    state.tokens -= count;
                    debug!("Acquired {} tokens ({:.2} remaining)", count, state.tokens);
                    return true;
                }

                let deficit = count - state.tokens;
                Duration::from_secs_f64(deficit / self.refill_rate) + WAIT_PAD
            };

            if let Some(deadline) = deadline {
                // Tokens only refill with time; if the deficit cannot be
                // covered before the deadline, no amount of waiting helps.
                if self.clock.now() + wait > deadline {
                    debug!("Rate limit: timeout before {} tokens refill", count);
                    return false;
                }
            }

            thread::sleep(wait);
        }
    }

    /// Current refilled token level, without consuming anything
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock();
        self.refill(&mut state);
        state.tokens
    }

    /// Restore the bucket to full capacity (test support)
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.tokens = self.capacity;
        state.last_refill = self.clock.now();
    }

    /// Maximum number of tokens the bucket can hold
    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockClock;

    fn drained_bucket(capacity: u32, clock: MockClock) -> TokenBucket<MockClock> {
        let bucket = TokenBucket::with_clock(capacity, clock).unwrap();
        assert!(bucket.acquire(f64::from(capacity), None));
        bucket
    }

    #[test]
    fn starts_full() {
        let bucket = TokenBucket::new(10).unwrap();
        assert!((bucket.available() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(TokenBucket::new(0).is_err());
    }

    #[test]
    fn refill_from_empty_matches_elapsed_fraction_of_window() {
        // available() == min(C, T * C / 60) for a bucket drained at T=0.
        for capacity in [1_u32, 30, 60, 600] {
            let clock = MockClock::new();
            let bucket = drained_bucket(capacity, clock.clone());

            for secs in [0_u64, 1, 15, 30, 59, 60, 61, 600] {
                clock.set_elapsed(Duration::from_secs(secs));
                let expected =
                    (secs as f64 * f64::from(capacity) / 60.0).min(f64::from(capacity));
                let got = bucket.available();
                assert!(
                    (got - expected).abs() < 1e-6,
                    "capacity={capacity} secs={secs}: got {got}, expected {expected}"
                );
            }
        }
    }

    #[test]
    fn refill_never_exceeds_capacity() {
        let clock = MockClock::new();
        let bucket = drained_bucket(5, clock.clone());

        clock.advance(Duration::from_secs(3600));
        assert!((bucket.available() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn acquire_consumes_fractional_budget() {
        let clock = MockClock::new();
        let bucket = TokenBucket::with_clock(10, clock).unwrap();

        assert!(bucket.acquire(2.5, None));
        assert!((bucket.available() - 7.5).abs() < 1e-6);
    }

    #[test]
    fn acquire_more_than_capacity_fails_immediately() {
        let bucket = TokenBucket::new(5).unwrap();
        let start = Instant::now();
        assert!(!bucket.acquire(6.0, None));
        assert!(start.elapsed() < Duration::from_millis(100));
        // The failed call must not have consumed anything.
        assert!((bucket.available() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn acquire_times_out_when_budget_cannot_refill_in_time() {
        let bucket = TokenBucket::new(60).unwrap();
        assert!(bucket.acquire(60.0, None));
        // One token refills per second at capacity 60; 50ms is hopeless.
        assert!(!bucket.acquire(1.0, Some(Duration::from_millis(50))));
    }

    #[test]
    fn acquire_blocks_until_refill() {
        // 6000 tokens/min = 100 tokens/sec, so 5 tokens arrive in ~50ms.
        let bucket = TokenBucket::new(6000).unwrap();
        assert!(bucket.acquire(6000.0, None));

        let start = Instant::now();
        assert!(bucket.acquire(5.0, Some(Duration::from_secs(5))));
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(40), "waited {waited:?}");
    }

    #[test]
    fn reset_restores_full_capacity() {
        let clock = MockClock::new();
        let bucket = drained_bucket(10, clock);
        bucket.reset();
        assert!((bucket.available() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn zero_count_is_a_no_op() {
        let bucket = TokenBucket::new(3).unwrap();
        assert!(bucket.acquire(0.0, None));
        assert!((bucket.available() - 3.0).abs() < 1e-6);
    }
}
