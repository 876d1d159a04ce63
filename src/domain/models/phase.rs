//! Competition lifecycle phases.
//!
//! ```text
//! Initialization → OpeningStatements → Discussion ⟲ → Elimination
//!                                         ↑              ↓
//!                                         └── Discussion | FinalWords
//!                                                            ↓
//!                                            ClosingSynthesis → Complete
//! ```
//!
//! Transitions are monotonic: no phase is revisited except Discussion.
//! `Aborted` is reachable from any non-terminal phase via the cancellation
//! path and terminates the run with a partial report.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initialization,
    OpeningStatements,
    Discussion,
    Elimination,
    FinalWords,
    ClosingSynthesis,
    Complete,
    Aborted,
}

impl Default for Phase {
    fn default() -> Self {
        Self::Initialization
    }
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initialization => "initialization",
            Self::OpeningStatements => "opening_statements",
            Self::Discussion => "discussion",
            Self::Elimination => "elimination",
            Self::FinalWords => "final_words",
            Self::ClosingSynthesis => "closing_synthesis",
            Self::Complete => "complete",
            Self::Aborted => "aborted",
        }
    }

    /// Whether the competition has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Aborted)
    }

    /// Legal successor phases.
    pub fn valid_transitions(&self) -> Vec<Phase> {
        match self {
            Self::Initialization => vec![Self::OpeningStatements, Self::Aborted],
            Self::OpeningStatements => vec![Self::Discussion, Self::Aborted],
            Self::Discussion => vec![Self::Elimination, Self::Aborted],
            Self::Elimination => vec![Self::Discussion, Self::FinalWords, Self::Aborted],
            Self::FinalWords => vec![Self::ClosingSynthesis, Self::Aborted],
            Self::ClosingSynthesis => vec![Self::Complete, Self::Aborted],
            Self::Complete | Self::Aborted => vec![],
        }
    }

    pub fn can_transition_to(&self, next: Phase) -> bool {
        self.valid_transitions().contains(&next)
    }
}
