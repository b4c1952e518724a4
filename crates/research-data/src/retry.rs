//! Bounded fetch retry with exponential backoff
//!
//! Every attempt is bounded by a per-call timeout. Only transient errors
//! (network, timeout) are retried, and never more than
//! [`MAX_FETCH_ATTEMPTS`] times in total.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::error::{DataError, Result};

/// Hard upper bound on attempts per fetch
pub const MAX_FETCH_ATTEMPTS: u32 = 2;

/// Fetch retry policy
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Total attempts, clamped to 1..=MAX_FETCH_ATTEMPTS
    pub max_attempts: u32,

    /// Backoff before the second attempt
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,

    /// Backoff multiplier (2.0 for exponential backoff)
    pub backoff_multiplier: f64,

    /// Deadline for each individual attempt
    pub attempt_timeout: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_FETCH_ATTEMPTS,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            attempt_timeout: Duration::from_secs(15),
        }
    }
}

/// Result of a policy run along with how many attempts it took
#[derive(Debug)]
pub struct FetchOutcome<T> {
    pub result: Result<T>,
    pub attempts: u32,
}

impl FetchPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration, attempt_timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, MAX_FETCH_ATTEMPTS),
            initial_backoff,
            attempt_timeout,
            ..Self::default()
        }
    }

    /// Single attempt, no backoff
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            backoff_multiplier: 1.0,
            ..Self::default()
        }
    }

    /// Fast retries (for testing)
    pub fn fast() -> Self {
        Self {
            max_attempts: MAX_FETCH_ATTEMPTS,
            initial_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(20),
            backoff_multiplier: 2.0,
            attempt_timeout: Duration::from_millis(200),
        }
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.clamp(1, MAX_FETCH_ATTEMPTS)
    }

    /// Backoff before attempt number `attempt` (1-based retry index)
    fn backoff_duration(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let backoff_ms = self.initial_backoff.as_millis() as f64
            * self.backoff_multiplier.powi((attempt - 1) as i32);

        Duration::from_millis(backoff_ms as u64).min(self.max_backoff)
    }

    /// Run `operation` under this policy
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> FetchOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                "Attempt {}/{} for operation: {}",
                attempt, max_attempts, operation_name
            );

            let result = match timeout(self.attempt_timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(DataError::Timeout(self.attempt_timeout)),
            };

            match result {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            "Operation '{}' succeeded after {} retries",
                            operation_name,
                            attempt - 1
                        );
                    }
                    return FetchOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    };
                }
                Err(e) if !e.is_transient() || attempt >= max_attempts => {
                    warn!(
                        "Operation '{}' failed after {} attempt(s): {}",
                        operation_name, attempt, e
                    );
                    return FetchOutcome {
                        result: Err(e),
                        attempts: attempt,
                    };
                }
                Err(e) => {
                    let backoff = self.backoff_duration(attempt);
                    warn!(
                        "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                        operation_name, attempt, max_attempts, e, backoff
                    );
                    sleep(backoff).await;
                }
            }
        }
    }
}
