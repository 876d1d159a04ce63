//! Budget enforcement for external calls.
//!
//! Wraps any participant or judge operation with a token/time ceiling. Token
//! overruns are deterministically truncated at the boundary and reported as
//! a recoverable condition so the turn proceeds with penalized, shortened
//! content; time overruns cancel the call with no partial output and surface
//! as a fatal-to-the-call [`EngineError::Timeout`]. Every invocation is
//! logged with elapsed time and token count for later audit.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::config::BudgetLimits;
use crate::domain::models::transcript::{count_tokens, truncate_tokens, UtteranceDraft};

use super::audit_log::{AuditCategory, AuditLog};

/// Output whose size is measured and truncated in tokens.
pub trait TokenBounded {
    fn token_count(&self) -> u32;
    /// Truncate in place to at most `max_tokens`.
    fn truncate_to(&mut self, max_tokens: u32);
}

impl TokenBounded for UtteranceDraft {
    fn token_count(&self) -> u32 {
        count_tokens(&self.text)
    }

    fn truncate_to(&mut self, max_tokens: u32) {
        self.text = truncate_tokens(&self.text, max_tokens);
    }
}

/// What came back from an enforced call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetOutcome<T> {
    pub output: T,
    /// Token count after any truncation.
    pub tokens_used: u32,
    /// Whether the output was cut at the token boundary. The caller records
    /// the matching `BudgetExceeded` penalty.
    pub truncated: bool,
    pub elapsed_ms: u64,
}

/// Applies token/time ceilings uniformly to external calls.
pub struct BudgetEnforcer {
    audit: Arc<AuditLog>,
}

impl BudgetEnforcer {
    pub fn new(audit: Arc<AuditLog>) -> Self {
        Self { audit }
    }

    /// Run `operation` under `limits`, truncating oversized output.
    pub async fn execute<T, F>(
        &self,
        turn: u32,
        label: &str,
        limits: BudgetLimits,
        operation: F,
    ) -> EngineResult<BudgetOutcome<T>>
    where
        T: TokenBounded,
        F: Future<Output = EngineResult<T>>,
    {
        let started = tokio::time::Instant::now();
        let mut output = self.await_within(label, limits, operation).await?;
        let elapsed_ms = ms_since(started);

        let raw_tokens = output.token_count();
        let truncated = raw_tokens > limits.max_tokens;
        if truncated {
            output.truncate_to(limits.max_tokens);
            warn!(
                label,
                raw_tokens,
                max_tokens = limits.max_tokens,
                "output exceeded token budget, truncated"
            );
        }
        let tokens_used = output.token_count();

        self.audit
            .record_timed(
                turn,
                AuditCategory::Invocation,
                label,
                if truncated {
                    format!("truncated from {raw_tokens} tokens")
                } else {
                    "ok".to_string()
                },
                Some(elapsed_ms),
                Some(tokens_used),
            )
            .await;
        debug!(label, tokens_used, elapsed_ms, truncated, "enforced call finished");

        Ok(BudgetOutcome {
            output,
            tokens_used,
            truncated,
            elapsed_ms,
        })
    }

    /// Run `operation` under the time ceiling only. For calls whose output
    /// is not token-measurable (judge scoring).
    pub async fn timebox<T, F>(
        &self,
        turn: u32,
        label: &str,
        limits: BudgetLimits,
        operation: F,
    ) -> EngineResult<BudgetOutcome<T>>
    where
        F: Future<Output = EngineResult<T>>,
    {
        let started = tokio::time::Instant::now();
        let output = self.await_within(label, limits, operation).await?;
        let elapsed_ms = ms_since(started);

        self.audit
            .record_timed(
                turn,
                AuditCategory::Invocation,
                label,
                "ok",
                Some(elapsed_ms),
                None,
            )
            .await;

        Ok(BudgetOutcome {
            output,
            tokens_used: 0,
            truncated: false,
            elapsed_ms,
        })
    }

    async fn await_within<T, F>(
        &self,
        label: &str,
        limits: BudgetLimits,
        operation: F,
    ) -> EngineResult<T>
    where
        F: Future<Output = EngineResult<T>>,
    {
        match tokio::time::timeout(Duration::from_secs(limits.max_seconds), operation).await {
            Ok(result) => result,
            Err(_) => {
                warn!(label, limit_secs = limits.max_seconds, "call timed out, cancelled");
                Err(EngineError::Timeout {
                    label: label.to_string(),
                    limit_secs: limits.max_seconds,
                })
            }
        }
    }
}

fn ms_since(started: tokio::time::Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enforcer() -> BudgetEnforcer {
        BudgetEnforcer::new(Arc::new(AuditLog::default()))
    }

    fn limits(max_tokens: u32, max_seconds: u64) -> BudgetLimits {
        BudgetLimits {
            max_tokens,
            max_seconds,
        }
    }

    #[tokio::test]
    async fn test_within_budget_passes_through() {
        let outcome = enforcer()
            .execute(0, "speak:test", limits(10, 5), async {
                Ok(UtteranceDraft::new("four words right here"))
            })
            .await
            .unwrap();
        assert!(!outcome.truncated);
        assert_eq!(outcome.tokens_used, 4);
        assert_eq!(outcome.output.text, "four words right here");
    }

    #[tokio::test]
    async fn test_oversized_output_is_truncated_not_failed() {
        let text = (0..80).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let outcome = enforcer()
            .execute(0, "speak:test", limits(50, 5), async move {
                Ok(UtteranceDraft::new(text))
            })
            .await
            .unwrap();
        assert!(outcome.truncated);
        assert_eq!(outcome.tokens_used, 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out_with_no_partial_output() {
        let result: EngineResult<BudgetOutcome<UtteranceDraft>> = enforcer()
            .execute(0, "speak:slow", limits(10, 1), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(UtteranceDraft::new("too late"))
            })
            .await;

        match result {
            Err(EngineError::Timeout { label, limit_secs }) => {
                assert_eq!(label, "speak:slow");
                assert_eq!(limit_secs, 1);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invocations_are_audited() {
        let audit = Arc::new(AuditLog::default());
        let enforcer = BudgetEnforcer::new(Arc::clone(&audit));
        enforcer
            .execute(3, "speak:audited", limits(10, 5), async {
                Ok(UtteranceDraft::new("hello there"))
            })
            .await
            .unwrap();

        let entries = audit.by_category(AuditCategory::Invocation).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].label, "speak:audited");
        assert_eq!(entries[0].tokens, Some(2));
        assert_eq!(entries[0].turn, 3);
    }
}
