//! Participant domain model.
//!
//! Participants are owned exclusively by the orchestrator and mutated only
//! after a scoring step completes. Cumulative score is never stored; it is
//! recomputed from the scorecard and penalty logs on demand.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a participant.
///
/// Ids are derived from the competition seed and the registration slot, so a
/// fixed seed yields the same ids run after run. Ordering follows
/// registration order, which makes "lowest id wins" tie-breaks deterministic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ParticipantId(Uuid);

impl ParticipantId {
    /// Derive the id for the participant registered in `slot` (0-based).
    pub fn from_registration(seed: u64, slot: u32) -> Self {
        Self(Uuid::from_u64_pair(seed, u64::from(slot) + 1))
    }

    /// Wrap an existing uuid (tests, external registries).
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a participant in the competition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantStatus {
    /// Competing normally.
    Active,
    /// Currently lowest-scoring; first candidate at the next elimination.
    AtRisk,
    /// Removed from the competition. Never selected to speak again.
    Eliminated,
}

impl Default for ParticipantStatus {
    fn default() -> Self {
        Self::Active
    }
}

impl ParticipantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::AtRisk => "at_risk",
            Self::Eliminated => "eliminated",
        }
    }

    /// Whether the turn selector may pick this participant.
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Active | Self::AtRisk)
    }
}

/// Score earned for a single turn, before penalties.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurnScore {
    /// Turn index the score was earned on.
    pub turn: u32,
    /// Composite score from the judge ensemble, already scaled.
    pub score: f64,
}

/// One competitor in the contest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Stable identity.
    pub id: ParticipantId,
    /// Human-readable display name.
    pub display_name: String,
    /// Opaque handle naming the external persona adapter backing this
    /// participant. The orchestrator never inspects what it refers to.
    pub persona_ref: String,
    /// Ordered per-turn scores (scored turns only).
    pub turn_scores: Vec<TurnScore>,
    /// Current status.
    pub status: ParticipantStatus,
    /// Turn index of the most recent utterance, if any.
    pub last_spoke_turn: Option<u32>,
    /// Number of turns taken so far.
    pub turns_taken: u32,
}

impl Participant {
    pub fn new(id: ParticipantId, display_name: impl Into<String>, persona_ref: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            persona_ref: persona_ref.into(),
            turn_scores: Vec::new(),
            status: ParticipantStatus::default(),
            last_spoke_turn: None,
            turns_taken: 0,
        }
    }

    /// Sum of per-turn scores. Penalties are accounted separately by
    /// [`CompetitionState::cumulative_score`](super::competition::CompetitionState::cumulative_score).
    pub fn score_sum(&self) -> f64 {
        self.turn_scores.iter().map(|s| s.score).sum()
    }

    /// Record that this participant produced the utterance for `turn`.
    pub fn mark_spoke(&mut self, turn: u32) {
        self.last_spoke_turn = Some(turn);
        self.turns_taken += 1;
    }

    /// Record the ensemble score for `turn`.
    pub fn record_score(&mut self, turn: u32, score: f64) {
        self.turn_scores.push(TurnScore { turn, score });
    }

    /// Turns elapsed since this participant last spoke, as seen from
    /// `current_turn`. A participant that never spoke is maximally stale.
    pub fn turns_since_spoke(&self, current_turn: u32) -> u32 {
        match self.last_spoke_turn {
            Some(last) => current_turn.saturating_sub(last),
            None => current_turn + 1,
        }
    }

    pub fn is_eligible(&self) -> bool {
        self.status.is_eligible()
    }

    /// Mark eliminated. Elimination is monotonic; there is no way back.
    pub fn eliminate(&mut self) {
        self.status = ParticipantStatus::Eliminated;
    }
}
