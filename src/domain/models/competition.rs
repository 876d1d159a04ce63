//! Competition state: the single root object.
//!
//! Created at competition start, mutated once per turn by the orchestrator's
//! control thread only, frozen into the final report at a terminal phase. No
//! other component holds a long-lived reference to it; components receive
//! snapshots or immutable borrows for the duration of one decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{EngineError, EngineResult};

use super::config::CompetitionConfig;
use super::participant::{Participant, ParticipantId, ParticipantStatus};
use super::penalty::Penalty;
use super::phase::Phase;
use super::scorecard::Scorecard;
use super::transcript::Transcript;

/// A non-fatal fault recorded in the final report instead of being raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultEntry {
    pub turn: u32,
    /// Machine-readable tag ([`EngineError::kind`]).
    pub kind: String,
    /// The operation that faulted (e.g. `speak:<participant>`).
    pub label: String,
    pub detail: String,
}

/// One row of the standings table, recomputed on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standing {
    pub participant: ParticipantId,
    pub display_name: String,
    pub status: ParticipantStatus,
    pub score: f64,
}

/// The root state object for one competition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitionState {
    pub id: Uuid,
    pub topic: String,
    pub participants: Vec<Participant>,
    pub transcript: Transcript,
    pub phase: Phase,
    /// Strictly increasing orchestrator turn counter.
    pub turn: u32,
    /// Turn at which the current phase was entered; lets pure phase
    /// decisions tell whether everyone has spoken within this phase.
    pub phase_entered_turn: u32,
    pub config: CompetitionConfig,
    pub penalties: Vec<Penalty>,
    pub scorecards: Vec<Scorecard>,
    pub faults: Vec<FaultEntry>,
    pub started_at: DateTime<Utc>,
}

impl CompetitionState {
    pub fn new(topic: impl Into<String>, config: CompetitionConfig) -> Self {
        // Competition id is derived from the seed so that identical seeds
        // yield identical frozen reports.
        let id = Uuid::from_u64_pair(config.seed, 0);
        Self {
            id,
            topic: topic.into(),
            participants: Vec::new(),
            transcript: Transcript::new(),
            phase: Phase::default(),
            turn: 0,
            phase_entered_turn: 0,
            config,
            penalties: Vec::new(),
            scorecards: Vec::new(),
            faults: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Register a participant during `Initialization`. Ids follow
    /// registration order.
    pub fn register(
        &mut self,
        display_name: impl Into<String>,
        persona_ref: impl Into<String>,
    ) -> EngineResult<ParticipantId> {
        if self.phase != Phase::Initialization {
            return Err(EngineError::InvalidTransition {
                from: self.phase.as_str().to_string(),
                to: self.phase.as_str().to_string(),
                turn: self.turn,
                detail: "registration is only allowed during initialization".to_string(),
            });
        }
        let slot = u32::try_from(self.participants.len()).unwrap_or(u32::MAX);
        let id = ParticipantId::from_registration(self.config.seed, slot);
        self.participants
            .push(Participant::new(id, display_name, persona_ref));
        Ok(id)
    }

    pub fn participant(&self, id: ParticipantId) -> EngineResult<&Participant> {
        self.participants
            .iter()
            .find(|p| p.id == id)
            .ok_or(EngineError::UnknownParticipant(id.as_uuid()))
    }

    pub fn participant_mut(&mut self, id: ParticipantId) -> EngineResult<&mut Participant> {
        self.participants
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(EngineError::UnknownParticipant(id.as_uuid()))
    }

    /// Participants the turn selector may choose from.
    pub fn eligible(&self) -> Vec<&Participant> {
        self.participants.iter().filter(|p| p.is_eligible()).collect()
    }

    /// Count of non-eliminated participants.
    pub fn eligible_count(&self) -> usize {
        self.participants.iter().filter(|p| p.is_eligible()).count()
    }

    /// Cumulative score: sum of per-turn scores plus penalty deltas,
    /// recomputed every time. Never stored, so it cannot drift.
    pub fn cumulative_score(&self, id: ParticipantId) -> f64 {
        let turn_sum: f64 = self
            .participants
            .iter()
            .find(|p| p.id == id)
            .map(Participant::score_sum)
            .unwrap_or(0.0);
        let penalty_sum: f64 = self
            .penalties
            .iter()
            .filter(|p| p.participant == id)
            .map(|p| p.magnitude)
            .sum();
        turn_sum + penalty_sum
    }

    /// Current standings, best first; ties resolved by lowest id so the
    /// ordering is stable across runs.
    pub fn standings(&self) -> Vec<Standing> {
        let mut rows: Vec<Standing> = self
            .participants
            .iter()
            .map(|p| Standing {
                participant: p.id,
                display_name: p.display_name.clone(),
                status: p.status,
                score: self.cumulative_score(p.id),
            })
            .collect();
        rows.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.participant.cmp(&b.participant))
        });
        rows
    }

    /// The eligible participant with the lowest cumulative score (ties to
    /// the lowest id). Candidate for at-risk marking and elimination.
    pub fn lowest_eligible(&self) -> Option<ParticipantId> {
        self.eligible()
            .iter()
            .map(|p| (p.id, self.cumulative_score(p.id)))
            .min_by(|a, b| {
                a.1.partial_cmp(&b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| a.0.cmp(&b.0))
            })
            .map(|(id, _)| id)
    }

    /// Move to `next`, enforcing the monotonic transition rules.
    pub fn advance_phase(&mut self, next: Phase) -> EngineResult<()> {
        if !self.phase.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                from: self.phase.as_str().to_string(),
                to: next.as_str().to_string(),
                turn: self.turn,
                detail: format!(
                    "legal successors of {} are {:?}",
                    self.phase.as_str(),
                    self.phase
                        .valid_transitions()
                        .iter()
                        .map(Phase::as_str)
                        .collect::<Vec<_>>()
                ),
            });
        }
        self.phase = next;
        self.phase_entered_turn = self.turn;
        Ok(())
    }

    pub fn record_fault(&mut self, turn: u32, error: &EngineError, label: impl Into<String>) {
        self.faults.push(FaultEntry {
            turn,
            kind: error.kind().to_string(),
            label: label.into(),
            detail: error.to_string(),
        });
    }
}
