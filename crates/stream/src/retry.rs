//! Retry logic with exponential backoff and rate-limit pauses.
//!
//! Every remote call goes through [`RetryPolicy::execute`]. Each attempt
//! reports an [`Attempt`]:
//!
//! - `Done` returns immediately.
//! - `RateLimited` sleeps for the server-provided `Retry-After` (or the
//!   policy default) and tries again without spending an attempt. The number
//!   of such pauses is capped so a platform that never recovers still
//!   surfaces [`StreamError::RateLimited`].
//! - `Failed` with a transient error sleeps `base_delay * 2^attempt` and
//!   tries again until `max_attempts` is reached, then returns that error.
//!   Anything else is returned as is.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StreamError;

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    /// HTTP 429, with the parsed `Retry-After` when present.
    RateLimited(Option<Duration>),
    Failed(StreamError),
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts for transient failures, the first one included.
    pub max_attempts: u32,
    /// Base delay between attempts (exponentially increased).
    pub base_delay: Duration,
    /// Upper bound for a single backoff delay.
    pub max_delay: Duration,
    /// Pause used for a 429 without a usable `Retry-After` header.
    pub default_rate_limit_wait: Duration,
    /// Number of 429 pauses tolerated within one call.
    pub max_rate_limit_waits: u32,
    /// Whether to add random jitter to backoff delays.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
            default_rate_limit_wait: Duration::from_secs(5),
            max_rate_limit_waits: 10,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Values below one are raised to one.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_default_rate_limit_wait(mut self, wait: Duration) -> Self {
        self.default_rate_limit_wait = wait;
        self
    }

    pub fn with_max_rate_limit_waits(mut self, waits: u32) -> Self {
        self.max_rate_limit_waits = waits;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay slept after the failed attempt numbered `attempt` (zero-based).
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let exponential = base.saturating_mul(2_u64.saturating_pow(attempt));
        let delay = exponential.min(self.max_delay.as_millis() as u64);

        if self.jitter {
            // 0-50% extra
            let jitter = fastrand::u64(0..=delay / 2);
            Duration::from_millis(delay + jitter)
        } else {
            Duration::from_millis(delay)
        }
    }

    /// Runs `operation` under this policy. `operation` receives the zero-based
    /// attempt number; `sleep` performs every pause.
    pub fn execute<T, F, S>(&self, label: &str, sleep: S, mut operation: F) -> Result<T, StreamError>
    where
        F: FnMut(u32) -> Attempt<T>,
        S: Fn(Duration),
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        let mut rate_limit_waits = 0;

        loop {
            match operation(attempt) {
                Attempt::Done(value) => return Ok(value),
                Attempt::RateLimited(retry_after) => {
                    if rate_limit_waits >= self.max_rate_limit_waits {
                        return Err(StreamError::RateLimited {
                            waits: rate_limit_waits,
                        });
                    }
                    rate_limit_waits += 1;
                    let wait = retry_after.unwrap_or(self.default_rate_limit_wait);
                    warn!(
                        operation = label,
                        wait_secs = wait.as_secs_f64(),
                        waits = rate_limit_waits,
                        "rate_limited"
                    );
                    sleep(wait);
                }
                Attempt::Failed(err) if err.is_transient() && attempt + 1 < max_attempts => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        operation = label,
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "request_retry"
                    );
                    sleep(delay);
                    attempt += 1;
                }
                Attempt::Failed(err) => return Err(err),
            }
        }
    }
}

/// What a response status means for the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    Success,
    RateLimited(Option<Duration>),
    Rejected,
}

pub(crate) fn disposition(status: StatusCode, headers: &HeaderMap) -> Disposition {
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = headers
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after);
        Disposition::RateLimited(retry_after)
    } else if status.is_success() {
        Disposition::Success
    } else {
        Disposition::Rejected
    }
}

/// Parses a `Retry-After` value given in (possibly fractional) seconds.
/// HTTP-date values are not supported and yield `None`.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let seconds: f64 = value.trim().parse().ok()?;
    if seconds.is_finite() && seconds >= 0.0 {
        Some(Duration::from_secs_f64(seconds))
    } else {
        None
    }
}
