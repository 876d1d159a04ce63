//! Centralized retry-then-degrade policy.
//!
//! One policy object, parameterized by error kind via
//! [`EngineError::is_retryable`], applied uniformly wherever the engine
//! talks to an external collaborator. Callers decide what "degrade" means
//! (skip the turn, mark it unscored); the policy only decides whether to
//! re-attempt.

use std::future::Future;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::warn;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::config::RetryConfig;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            initial_interval: Duration::from_millis(self.config.initial_backoff_ms),
            max_interval: Duration::from_millis(self.config.max_backoff_ms),
            // Attempt counting bounds the loop, not elapsed time.
            max_elapsed_time: None,
            randomization_factor: 0.0,
            ..ExponentialBackoff::default()
        }
    }

    /// Run `operation`, re-attempting retryable failures up to the
    /// configured attempt budget.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> EngineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EngineResult<T>>,
    {
        let mut backoff = self.backoff();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.config.max_attempts => {
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or(Duration::from_millis(self.config.initial_backoff_ms));
                    warn!(
                        label,
                        attempt,
                        max_attempts = self.config.max_attempts,
                        error = %err,
                        "retryable failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn flaky_error() -> EngineError {
        EngineError::adapter("judge", "transient connection error")
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_error_is_retried_once() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let result = policy
            .run("judge:score", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(flaky_error())
                    } else {
                        Ok(42u32)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_are_bounded() {
        let policy = RetryPolicy::new(RetryConfig {
            max_attempts: 3,
            initial_backoff_ms: 10,
            max_backoff_ms: 50,
        });
        let calls = AtomicU32::new(0);

        let result: EngineResult<u32> = policy
            .run("judge:score", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(flaky_error()) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let result: EngineResult<u32> = policy
            .run("advance", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(EngineError::InvalidTransition {
                        from: "complete".to_string(),
                        to: "discussion".to_string(),
                        turn: 1,
                        detail: "terminal".to_string(),
                    })
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
