use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::utils::error::AutomationError;

/// Terminal outcome of a bounded-retry scope. There is no partial-success
/// state: an operation either produced a value or every attempt failed.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Success(T),
    ExhaustedRetries,
}

impl<T> RetryOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Success(_))
    }

    pub fn ok(self) -> Option<T> {
        match self {
            RetryOutcome::Success(value) => Some(value),
            RetryOutcome::ExhaustedRetries => None,
        }
    }

    /// Convert exhaustion into the terminal error for `operation`.
    pub fn into_result(self, operation: &str, attempts: u32) -> Result<T, AutomationError> {
        match self {
            RetryOutcome::Success(value) => Ok(value),
            RetryOutcome::ExhaustedRetries => Err(AutomationError::ExhaustedRetries {
                operation: operation.to_string(),
                attempts,
            }),
        }
    }
}

/// Bounded retry over a fallible, idempotent operation with a fixed delay
/// between attempts. Any failure is retryable here, stale handles included;
/// the operation itself is responsible for performing a fresh lookup on each
/// invocation rather than reusing state from a failed attempt.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Invoke `op` up to `max_attempts` times. The operation runs exactly once
    /// per attempt; no delay follows the final failure.
    pub async fn retry<T, F, Fut>(&self, operation: &str, mut op: F) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AutomationError>>,
    {
        for attempt in 1..=self.max_attempts {
            match op().await {
                Ok(value) => return RetryOutcome::Success(value),
                Err(err) => {
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "attempt failed"
                    );
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }
        RetryOutcome::ExhaustedRetries
    }
}
