//! Retry utilities with geometric backoff.
//!
//! A failed call is retried up to `max_attempts` times in total. The delay
//! before retrying after attempt `i` is `base_delay * backoff_factor^(i-1)`.
//! When the ceiling is reached the original error is returned unchanged.

use crate::errors::{ConfigError, StageError};
use crate::events::{EventSink, LogRecord};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts, including the first call.
    pub max_attempts: u32,
    /// Delay before the first retry, in seconds.
    pub base_delay_secs: f64,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 1.0,
            backoff_factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that calls once and never retries.
    #[must_use]
    pub fn no_retry() -> Self {
        Self::default().with_max_attempts(1)
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay_secs = delay.as_secs_f64();
        self
    }

    /// Sets the backoff factor.
    #[must_use]
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Returns the base delay.
    #[must_use]
    pub fn base_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.base_delay_secs).unwrap_or_default()
    }

    /// Returns the delay slept after attempt `attempt` (1-indexed) fails.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        scale(self.base_delay(), self.backoff_factor.powi(exponent))
    }

    /// Validates the policy.
    pub fn validate(&self, section: &'static str) -> Result<(), ConfigError> {
        if self.max_attempts < 1 {
            return Err(ConfigError::invalid(section, "max_attempts must be >= 1"));
        }
        if !(self.base_delay_secs.is_finite() && self.base_delay_secs > 0.0) {
            return Err(ConfigError::invalid(section, "base_delay_secs must be > 0"));
        }
        if !(self.backoff_factor.is_finite() && self.backoff_factor >= 1.0) {
            return Err(ConfigError::invalid(section, "backoff_factor must be >= 1"));
        }
        Ok(())
    }
}

fn scale(delay: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}

/// Per-call retry bookkeeping.
///
/// Created fresh for every wrapped call and dropped when it finishes.
#[derive(Debug, Clone)]
pub struct RetryState {
    attempt: u32,
    current_delay: Duration,
    max_attempts: u32,
    backoff_factor: f64,
}

impl RetryState {
    /// Creates the state for a new call.
    #[must_use]
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            attempt: 1,
            current_delay: config.base_delay(),
            max_attempts: config.max_attempts.max(1),
            backoff_factor: config.backoff_factor,
        }
    }

    /// The attempt currently in flight (1-indexed).
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The delay that will be slept if the current attempt fails.
    #[must_use]
    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }

    /// The attempt ceiling.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Records a failure of the current attempt and decides what to do next.
    pub fn on_failure<E: RetryableError + ?Sized>(&mut self, error: &E) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::NotRetryable;
        }
        if self.attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }

        let failed = self.attempt;
        let delay = self.current_delay;
        self.current_delay = scale(self.current_delay, self.backoff_factor);
        self.attempt += 1;

        RetryDecision::Retry {
            failed_attempt: failed,
            delay,
        }
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for `delay`, then try again.
    Retry {
        /// The attempt that just failed.
        failed_attempt: u32,
        /// How long to wait.
        delay: Duration,
    },
    /// The attempt ceiling was reached.
    GiveUp,
    /// The error must not be retried.
    NotRetryable,
}

/// Errors that can tell whether retrying them makes sense.
pub trait RetryableError: Display {
    /// Returns true if a later attempt may succeed.
    fn is_retryable(&self) -> bool {
        true
    }
}

impl RetryableError for StageError {
    fn is_retryable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}

impl RetryableError for String {}

impl RetryableError for &str {}

/// Executes an operation with retry logic.
///
/// Every failed attempt below the ceiling emits a warning naming the attempt
/// and the upcoming delay, then suspends the calling task only. Exhaustion
/// emits an error and returns the last error exactly as the operation
/// produced it.
pub async fn with_retry<T, E, F, Fut>(
    config: &RetryConfig,
    component: &str,
    events: &dyn EventSink,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError,
{
    let mut state = RetryState::new(config);

    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        match state.on_failure(&error) {
            RetryDecision::Retry {
                failed_attempt,
                delay,
            } => {
                events.emit(LogRecord::warning(
                    component,
                    format!(
                        "{component} failed (attempt {failed_attempt}/{}): {error}. Retrying in {:.2}s...",
                        state.max_attempts(),
                        delay.as_secs_f64()
                    ),
                ));
                drop(error);
                tokio::time::sleep(delay).await;
            }
            RetryDecision::GiveUp => {
                events.emit(LogRecord::error(
                    component,
                    format!(
                        "{component} failed after {} attempts: {error}",
                        state.max_attempts()
                    ),
                ));
                return Err(error);
            }
            RetryDecision::NotRetryable => {
                events.emit(LogRecord::error(
                    component,
                    format!(
                        "{component} failed on attempt {} with a non-retryable error: {error}",
                        state.attempt()
                    ),
                ));
                return Err(error);
            }
        }
    }
}
