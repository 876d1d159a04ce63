//! Audit logging for reproducibility checks.
//!
//! Every budget-enforced invocation, penalty, tie-break draw, phase
//! transition, and fault lands here with enough detail to reconstruct why
//! the run unfolded the way it did. The log is bounded in memory and drained
//! into the final report.

use std::collections::VecDeque;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Category of audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    /// A call that went through the budget enforcer.
    Invocation,
    /// A penalty emitted by the anti-gaming detector or budget enforcer.
    Penalty,
    /// A seeded random draw consumed for tie-breaking.
    TieBreak,
    /// A phase transition.
    Transition,
    /// An elimination applied by the orchestrator.
    Elimination,
    /// A non-fatal fault degraded into report data.
    Fault,
}

impl AuditCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invocation => "invocation",
            Self::Penalty => "penalty",
            Self::TieBreak => "tie_break",
            Self::Transition => "transition",
            Self::Elimination => "elimination",
            Self::Fault => "fault",
        }
    }
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Monotonic sequence number within the run.
    pub seq: u64,
    pub turn: u32,
    pub category: AuditCategory,
    /// The operation or subject (e.g. `speak:Ada`, `juror:2`).
    pub label: String,
    pub detail: String,
    /// Elapsed milliseconds, for invocations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    /// Token count of the produced output, for invocations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<u32>,
}

struct Inner {
    entries: VecDeque<AuditEntry>,
    next_seq: u64,
}

/// Bounded in-memory audit log shared across services.
pub struct AuditLog {
    max_entries: usize,
    inner: Arc<RwLock<Inner>>,
}

impl AuditLog {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries,
            inner: Arc::new(RwLock::new(Inner {
                entries: VecDeque::new(),
                next_seq: 0,
            })),
        }
    }

    /// Append an entry, evicting the oldest when full.
    pub async fn record(
        &self,
        turn: u32,
        category: AuditCategory,
        label: impl Into<String>,
        detail: impl Into<String>,
    ) {
        self.record_timed(turn, category, label, detail, None, None)
            .await;
    }

    /// Append an invocation entry with timing and token data.
    pub async fn record_timed(
        &self,
        turn: u32,
        category: AuditCategory,
        label: impl Into<String>,
        detail: impl Into<String>,
        elapsed_ms: Option<u64>,
        tokens: Option<u32>,
    ) {
        let mut inner = self.inner.write().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.push_back(AuditEntry {
            seq,
            turn,
            category,
            label: label.into(),
            detail: detail.into(),
            elapsed_ms,
            tokens,
        });
        while inner.entries.len() > self.max_entries {
            inner.entries.pop_front();
        }
    }

    /// Snapshot of all retained entries, oldest first.
    pub async fn snapshot(&self) -> Vec<AuditEntry> {
        let inner = self.inner.read().await;
        inner.entries.iter().cloned().collect()
    }

    /// Entries of one category, oldest first.
    pub async fn by_category(&self, category: AuditCategory) -> Vec<AuditEntry> {
        let inner = self.inner.read().await;
        inner
            .entries
            .iter()
            .filter(|e| e.category == category)
            .cloned()
            .collect()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(10_000)
    }
}
