//! Retry loop shared by the login and by report queries against flaky endpoints.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::ConfigError;

/// Attempts made before giving up on an operation
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Pause between two attempts
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

/// Upper bound for a single HTTP request, so a stalled connection cannot hang a run
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// How often and how patiently an operation is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        retry_delay: Duration,
        request_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if max_attempts == 0 {
            return Err(ConfigError::InvalidRetryPolicy(
                "max attempts must be at least 1".to_string(),
            ));
        }
        if request_timeout.is_zero() {
            return Err(ConfigError::InvalidRetryPolicy(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            retry_delay,
            request_timeout,
        })
    }

    /// Longest time the retry loop can spend sleeping
    pub fn worst_case_wait(&self) -> Duration {
        self.retry_delay * self.max_attempts.saturating_sub(1)
    }
}

/// Suspension point between attempts. Swapped out in tests to observe delays.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Every attempt failed; `last` is the error of the final one.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last: E,
}

/// Run `operation` until it succeeds or the policy's attempts are used up.
///
/// The closure receives the 1-based attempt number. On success the value is
/// returned together with the number of attempts it took. The delay is only
/// applied between attempts, never after the last failure.
pub async fn run_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    operation_name: &str,
    operation: F,
) -> Result<(T, u32), RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
{
    run_with_retry_if(policy, sleeper, operation_name, |_| true, operation).await
}

/// Like [`run_with_retry`], but stops at the first error `is_retryable` rejects.
pub async fn run_with_retry_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    operation_name: &str,
    is_retryable: P,
    mut operation: F,
) -> Result<(T, u32), RetryExhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok((value, attempt)),
            Err(err) => {
                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    error = %err,
                    "Attempt failed"
                );
                if attempt >= max_attempts || !is_retryable(&err) {
                    return Err(RetryExhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                info!(
                    operation = operation_name,
                    delay_secs = policy.retry_delay.as_secs(),
                    "Waiting before next attempt"
                );
                sleeper.sleep(policy.retry_delay).await;
                attempt += 1;
            }
        }
    }
}
