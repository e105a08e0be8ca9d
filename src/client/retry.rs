//! Retry logic with exponential backoff for transient request failures.
//!
//! The policy is plain data: [`RetryPolicy`] holds the attempt budget and the
//! backoff schedule, [`classify_error`] is the retryable predicate, and
//! [`run_with_retry`] combines the two around a single-call operation.
//!
//! # Example
//!
//! ```
//! use animal_etl::client::{RequestError, RetryDecision, RetryPolicy, classify_error};
//!
//! let policy = RetryPolicy::default();
//! let error = RequestError::http_status("http://localhost:3123/animals/v1/animals/1", 503);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("Retrying in {:?} (attempt {})", delay, attempt);
//!     }
//!     RetryDecision::DoNotRetry { reason } => {
//!         println!("Not retrying: {}", reason);
//!     }
//! }
//! ```

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info, instrument};

use super::constants::RETRYABLE_STATUSES;
use super::error::RequestError;

/// Default maximum attempts, including the first one.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default delay before the first retry (2 seconds).
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(2);

/// Default maximum delay cap (30 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Default upper bound of random jitter added to each delay.
const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(250);

/// Classification of request failure types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry (network, timeout, 500/502/503/504).
    Transient,

    /// Failure that will not succeed regardless of retries.
    Permanent,
}

/// Decision on whether to retry a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed, so first retry is attempt 2).
        attempt: u32,
    },

    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason why retry is not attempted.
        reason: String,
    },
}

/// Configuration for retry behavior with exponential backoff.
///
/// # Default Values
///
/// - `max_attempts`: 5
/// - `base_delay`: 2 seconds
/// - `max_delay`: 30 seconds
/// - `backoff_multiplier`: 2.0
/// - `max_jitter`: 250 ms
///
/// # Delay Calculation
///
/// ```text
/// delay = min(base_delay * multiplier^(attempt - 1), max_delay) + jitter
/// ```
///
/// With defaults, delays are approximately: 2s, 4s, 8s, 16s.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f32,
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Creates a new retry policy with custom settings and no jitter.
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Maximum attempts including initial (clamped to >= 1)
    /// * `base_delay` - Delay before the first retry
    /// * `max_delay` - Maximum delay cap
    /// * `backoff_multiplier` - Multiplier for exponential increase
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
            max_jitter: Duration::ZERO,
        }
    }

    /// Creates a policy with a custom max_attempts, using defaults for other settings.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Replaces the jitter bound.
    #[must_use]
    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Determines whether to retry a failed request.
    ///
    /// `attempt` is the attempt number that just failed (1-indexed).
    #[instrument(level = "trace", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        RetryDecision::Retry {
            delay: self.calculate_delay(attempt),
            attempt: attempt + 1,
        }
    }

    /// Backoff without jitter for the retry that follows failed attempt `attempt`.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let multiplier = f64::from(self.backoff_multiplier);
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = (base_ms * multiplier.powf(exponent)).min(self.max_delay.as_millis() as f64);
        Duration::from_millis(delay_ms as u64)
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        self.backoff(attempt) + self.calculate_jitter()
    }

    fn calculate_jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
    }
}

/// Classifies a single-attempt error for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | Network, Timeout | Transient |
/// | HTTP 500, 502, 503, 504 | Transient |
/// | any other HTTP status | Permanent |
/// | Decode, InvalidUrl | Permanent |
#[must_use]
pub fn classify_error(error: &RequestError) -> FailureType {
    match error {
        RequestError::Network { .. } | RequestError::Timeout { .. } => FailureType::Transient,
        RequestError::HttpStatus { status, .. } if RETRYABLE_STATUSES.contains(status) => {
            FailureType::Transient
        }
        RequestError::HttpStatus { .. }
        | RequestError::Decode { .. }
        | RequestError::InvalidUrl { .. } => FailureType::Permanent,
    }
}

/// Runs `operation` until it succeeds, fails permanently, or exhausts the policy.
///
/// `classify` decides which errors are worth another attempt. On failure the
/// last error is returned with the number of attempts made.
pub async fn run_with_retry<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    label: &str,
    classify: C,
    mut operation: F,
) -> Result<T, (E, u32)>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> FailureType,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        debug!(label, attempt, "attempting request");

        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => match policy.should_retry(classify(&e), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next_attempt,
                } => {
                    info!(
                        label,
                        attempt = next_attempt,
                        max_attempts = policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %e,
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(label, %reason, "not retrying request");
                    return Err((e, attempt));
                }
            },
        }
    }
}
