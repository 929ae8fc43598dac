// * Retry-on-Timeout Executor
// * Bounds an async operation by an overall deadline and retries it only when the
// * failure is a timeout. Every other error propagates on the first attempt.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::constants::DEFAULT_RETRY_DELAY;
use crate::ops::telemetry::record_retry_attempt;

/// Errors that can tell a timeout apart from every other failure
pub trait TimeoutClassify: Sized {
    fn is_timeout(&self) -> bool;

    /// Builds the timeout error surfaced when a budget elapses
    fn timed_out(after: Duration) -> Self;
}

/// How timed-out attempts are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Pause before re-invoking a timed-out operation
    pub retry_delay: Duration,
    /// Retries after the first attempt; zero means a single attempt
    pub max_retries: u32,
    /// Optional budget for each individual attempt
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_delay: DEFAULT_RETRY_DELAY,
            max_retries: 3,
            attempt_timeout: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(retry_delay: Duration, max_retries: u32) -> Self {
        Self {
            retry_delay,
            max_retries,
            attempt_timeout: None,
        }
    }

    pub fn with_attempt_timeout(mut self, budget: Duration) -> Self {
        self.attempt_timeout = Some(budget);
        self
    }
}

/// Runs `operation` until it succeeds, fails with a non-timeout error, runs out
/// of retries, or `deadline` elapses.
///
/// When the deadline fires the in-flight attempt is dropped and a timeout error
/// is returned. Timers are owned by the futures here, so every exit path
/// releases them.
pub async fn retry_on_timeout<T, E, F, Fut>(
    deadline: Duration,
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: TimeoutClassify + Display,
{
    let attempts = async {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let outcome = match policy.attempt_timeout {
                Some(budget) => match tokio::time::timeout(budget, operation()).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(E::timed_out(budget)),
                },
                None => operation().await,
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if err.is_timeout() && attempt <= policy.max_retries => {
                    record_retry_attempt();
                    debug!(
                        attempt,
                        max_retries = policy.max_retries,
                        error = %err,
                        "Attempt timed out, retrying in {}ms",
                        policy.retry_delay.as_millis()
                    );
                    tokio::time::sleep(policy.retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    };

    match tokio::time::timeout(deadline, attempts).await {
        Ok(outcome) => outcome,
        Err(_) => {
            warn!(
                deadline_ms = millis(deadline),
                "Overall deadline elapsed before any attempt succeeded"
            );
            Err(E::timed_out(deadline))
        }
    }
}

// * Milliseconds for log fields, saturating instead of truncating
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
