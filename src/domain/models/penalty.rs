//! Penalty records emitted by the anti-gaming detector and budget enforcer.

use serde::{Deserialize, Serialize};

use super::participant::ParticipantId;

/// The detected condition a penalty was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyKind {
    /// Factual claim with no attached evidence reference.
    UnsupportedClaim,
    /// Semantic similarity to a prior utterance above threshold.
    Paraphrase,
    /// N-gram overlap with the participant's own recent utterances.
    Repetition,
    /// Sustained generic, non-substantive contributions.
    Stall,
    /// Similarity plateau across the recent window with no topic movement.
    Orbiting,
    /// Output exceeded its token budget and was truncated.
    BudgetExceeded,
}

impl PenaltyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedClaim => "unsupported_claim",
            Self::Paraphrase => "paraphrase",
            Self::Repetition => "repetition",
            Self::Stall => "stall",
            Self::Orbiting => "orbiting",
            Self::BudgetExceeded => "budget_exceeded",
        }
    }
}

/// A scored deduction. Read-only once emitted; the orchestrator appends it
/// to the competition's penalty log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Penalty {
    pub kind: PenaltyKind,
    /// Signed score delta. Negative for deductions.
    pub magnitude: f64,
    pub participant: ParticipantId,
    /// Turn the offending utterance belongs to.
    pub turn: u32,
    /// Free-text justification for the audit trail.
    pub justification: String,
}

impl Penalty {
    pub fn new(
        kind: PenaltyKind,
        magnitude: f64,
        participant: ParticipantId,
        turn: u32,
        justification: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            magnitude,
            participant,
            turn,
            justification: justification.into(),
        }
    }
}
