use gist_common::{GistError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// How often, and how patiently, an operation is retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Names the operation in logs and in the exhaustion message.
    pub label: String,
}

impl RetryPolicy {
    pub fn new(label: impl Into<String>, max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            label: label.into(),
        }
    }

    /// Wait before the attempt following `attempt` (0-based): `base * 2^attempt`.
    ///
    /// ```
    /// use gist_pipeline::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::new("fetch", 3, Duration::from_millis(100));
    /// assert_eq!(policy.delay_for(0), Duration::from_millis(100));
    /// assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Runs operations under a [`RetryPolicy`].
///
/// Stateless: every call starts a fresh attempt sequence.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackoffExecutor;

impl BackoffExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// policy runs out of attempts.
    pub async fn run<T, F, Fut>(&self, op: F, policy: &RetryPolicy) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_counted(op, policy).await.0
    }

    /// Like [`BackoffExecutor::run`], also returning how many retries happened.
    pub async fn run_counted<T, F, Fut>(&self, mut op: F, policy: &RetryPolicy) -> (Result<T>, u32)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 0;
        loop {
            let err = match op().await {
                Ok(value) => return (Ok(value), attempt),
                Err(err) => err,
            };

            if !err.is_retryable() {
                return (Err(err), attempt);
            }

            if attempt >= policy.max_retries {
                tracing::error!(
                    label = %policy.label,
                    attempts = attempt + 1,
                    error = %err,
                    "backoff.exhausted"
                );
                return (
                    Err(GistError::exhausted(&policy.label, attempt + 1, &err)),
                    attempt,
                );
            }

            let delay = policy.delay_for(attempt);
            tracing::warn!(
                label = %policy.label,
                attempt = attempt + 1,
                max_attempts = policy.max_attempts(),
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "backoff.retry"
            );
            sleep(delay).await;
            attempt += 1;
        }
    }
}
