//! Backoff policy: retry delay computation and retryability decisions.
//!
//! Two variants share one implementation:
//!
//! - the **generic** policy retries any failure until attempts run out, with
//!   jitter in `[0, 0.25 × delay]`; used between queue-level job attempts;
//! - the **rate-limit-aware** policy retries only failures carrying a
//!   recognized too-many-requests signal, with tighter jitter in
//!   `[0, 0.10 × delay]` because the delay is usually provider-dictated;
//!   used inside the Provider Gateway around every outbound call.
//!
//! The driver loop works over explicit attempt outcomes instead of caught
//! exceptions; on exhaustion the most recent error is returned to the
//! caller, never swallowed.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{debug, warn};

use forma_core::{defaults, Error, Result};

/// Retryability mode distinguishing the two policy variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryMode {
    /// Retry any failure until attempts are exhausted.
    Generic,
    /// Retry only failures carrying a too-many-requests signal.
    RateLimitAware,
}

/// Bounded exponential backoff with uniform jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: f64,
    mode: RetryMode,
}

impl RetryPolicy {
    /// Generic policy: retries everything, jitter fraction 0.25.
    pub fn generic(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            multiplier,
            jitter: defaults::JITTER_GENERIC,
            mode: RetryMode::Generic,
        }
    }

    /// Rate-limit-aware policy: retries only too-many-requests failures,
    /// jitter fraction 0.10.
    pub fn rate_limit_aware(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        multiplier: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            multiplier,
            jitter: defaults::JITTER_RATE_LIMIT,
            mode: RetryMode::RateLimitAware,
        }
    }

    /// Gateway default: 5 attempts, 20 s base, 120 s cap, multiplier 2.
    pub fn gateway_default() -> Self {
        Self::rate_limit_aware(
            defaults::GATEWAY_MAX_ATTEMPTS,
            defaults::GATEWAY_BASE_DELAY,
            defaults::GATEWAY_MAX_DELAY,
            defaults::GATEWAY_MULTIPLIER,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Exponential delay before jitter: `min(base × multiplier^(attempt-1), max)`.
    pub fn raw_delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let exp = self.base_delay.as_secs_f64() * self.multiplier.powi(attempt as i32 - 1);
        Duration::from_secs_f64(exp.min(self.max_delay.as_secs_f64()))
    }

    /// Delay for the given 1-based attempt, with uniform jitter added in
    /// `[0, jitter_fraction × delay]`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let raw = self.raw_delay(attempt).as_secs_f64();
        let jitter = if raw > 0.0 {
            rand::thread_rng().gen_range(0.0..=self.jitter * raw)
        } else {
            0.0
        };
        Duration::from_secs_f64(raw + jitter)
    }

    /// Whether the failed attempt should be retried.
    ///
    /// Never true on the final attempt. The rate-limit-aware variant also
    /// requires a recognized too-many-requests signal on the error.
    pub fn should_retry(&self, error: &Error, attempt: u32) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        match self.mode {
            RetryMode::Generic => true,
            RetryMode::RateLimitAware => error.is_rate_limit(),
        }
    }

    /// Provider-advised wait extracted from error metadata, when present.
    pub fn retry_after(&self, error: &Error) -> Option<Duration> {
        error.retry_after_hint()
    }

    /// Delay to apply after a failed attempt: the provider-advised wait when
    /// present, otherwise the computed exponential delay.
    pub fn backoff_delay(&self, attempt: u32, error: &Error) -> Duration {
        self.retry_after(error)
            .unwrap_or_else(|| self.next_delay(attempt))
    }
}

/// Outcome of one attempt, returned by the attempt function.
#[derive(Debug)]
pub enum Attempt<T> {
    Success(T),
    /// May be retried if the policy allows.
    Retryable(Error),
    /// Ends the loop immediately; never retried.
    Fatal(Error),
}

/// Drive an attempt function under a retry policy.
///
/// Suspends between attempts via [`tokio::time::sleep`]; mutates no shared
/// state. On exhaustion the most recent error is returned.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    mut attempt_fn: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Attempt<T>>,
{
    let mut attempt = 1;
    loop {
        match attempt_fn(attempt).await {
            Attempt::Success(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Attempt::Fatal(error) => {
                debug!(operation, attempt, error = %error, "Fatal failure, not retrying");
                return Err(error);
            }
            Attempt::Retryable(error) => {
                if !policy.should_retry(&error, attempt) {
                    warn!(
                        operation,
                        attempt,
                        error = %error,
                        "Retries exhausted"
                    );
                    return Err(error);
                }
                let delay = policy.backoff_delay(attempt, &error);
                warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Attempt failed, backing off"
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
