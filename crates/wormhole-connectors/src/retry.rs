//! Bounded retry with a fixed delay.
//!
//! Used where a single unit of work (one consumed record) may fail
//! transiently: the operation is retried a fixed number of times and the
//! caller decides what to do once the budget is spent.

use std::future::Future;
use std::time::Duration;

use crate::config::ConnectorConfig;
use crate::error::ConnectorError;
use crate::shutdown::{self, ShutdownSignal};

/// Retry budget and delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: usize,
    /// Delay before every retry.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Retries up to `max_retries` times, waiting `delay` before each.
    #[must_use]
    pub fn fixed(max_retries: usize, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// Runs the operation exactly once.
    #[must_use]
    pub fn none() -> Self {
        Self::fixed(0, Duration::ZERO)
    }

    /// Reads `{prefix}.retries` and `{prefix}.retry.delay.ms`, falling back
    /// to `default`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::ConfigurationError` if a value is invalid.
    pub fn from_config(
        config: &ConnectorConfig,
        prefix: &str,
        default: RetryPolicy,
    ) -> Result<Self, ConnectorError> {
        let max_retries = config
            .get_parsed(&format!("{prefix}.retries"))?
            .unwrap_or(default.max_retries);
        let delay = config
            .get_parsed::<u64>(&format!("{prefix}.retry.delay.ms"))?
            .map_or(default.delay, Duration::from_millis);
        Ok(Self { max_retries, delay })
    }

    /// Total attempts including the first.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.max_retries + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(5, Duration::from_secs(1))
    }
}

/// How a retried operation ended.
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    /// An attempt succeeded after `attempts` tries.
    Succeeded {
        /// The successful value.
        value: T,
        /// Attempts made, including the successful one.
        attempts: usize,
    },
    /// Every attempt failed; carries the last error.
    Exhausted {
        /// Error of the final attempt.
        error: E,
        /// Attempts made.
        attempts: usize,
    },
    /// Shutdown was requested while waiting to retry.
    Cancelled {
        /// Error of the last attempt made.
        error: E,
    },
}

/// Runs `op` until it succeeds or the policy's budget is spent.
///
/// `on_error` sees every failed attempt (1-based). Waiting between attempts
/// is cut short by `shutdown`.
pub async fn retry<T, E, F, Fut, H>(
    policy: RetryPolicy,
    shutdown: &mut ShutdownSignal,
    mut op: F,
    mut on_error: H,
) -> RetryOutcome<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    H: FnMut(usize, &E),
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let error = match op().await {
            Ok(value) => {
                return RetryOutcome::Succeeded {
                    value,
                    attempts: attempt,
                }
            }
            Err(e) => e,
        };
        on_error(attempt, &error);
        if attempt > policy.max_retries {
            return RetryOutcome::Exhausted {
                error,
                attempts: attempt,
            };
        }
        if !policy.delay.is_zero() {
            tokio::select! {
                () = tokio::time::sleep(policy.delay) => {}
                () = shutdown::requested(shutdown) => {
                    return RetryOutcome::Cancelled { error };
                }
            }
        } else if shutdown::is_requested(shutdown) {
            return RetryOutcome::Cancelled { error };
        }
    }
}
