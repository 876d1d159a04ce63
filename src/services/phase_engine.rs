//! Phase state machine decisions.
//!
//! Pure decisions over [`CompetitionState`]: what kind of turn the current
//! phase calls for, and whether a transition should fire. The engine never
//! mutates participant status itself; it signals the orchestrator, which
//! applies eliminations and advances the phase.

use serde::{Deserialize, Serialize};

use crate::domain::errors::EngineResult;
use crate::domain::models::competition::CompetitionState;
use crate::domain::models::config::EliminationConfig;
use crate::domain::models::participant::Participant;
use crate::domain::models::phase::Phase;
use crate::domain::ports::TurnKind;

/// Why an elimination round was entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EliminationTrigger {
    /// The configured discussion interval elapsed.
    Interval,
    /// The lowest cumulative score fell below the floor.
    ScoreFloor,
    /// The turn ceiling was reached; wind down without cutting.
    MaxTurns,
    /// The field already collapsed to one speaker.
    LastStanding,
}

impl EliminationTrigger {
    /// Whether the orchestrator should actually cut a participant, as
    /// opposed to passing through elimination on the way to the close.
    pub fn cuts(&self) -> bool {
        matches!(self, Self::Interval | Self::ScoreFloor)
    }
}

/// A transition decision handed to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseChange {
    pub to: Phase,
    pub reason: String,
    /// Present when `to == Phase::Elimination`.
    pub trigger: Option<EliminationTrigger>,
}

pub struct PhaseEngine {
    elimination: EliminationConfig,
    max_turns: u32,
}

impl PhaseEngine {
    pub fn new(elimination: EliminationConfig, max_turns: u32) -> Self {
        Self {
            elimination,
            max_turns,
        }
    }

    /// What kind of utterance the current phase asks for. `None` for
    /// non-speaking phases.
    pub fn turn_kind(&self, state: &CompetitionState) -> Option<TurnKind> {
        match state.phase {
            Phase::OpeningStatements => Some(TurnKind::Opening),
            Phase::Discussion => Some(TurnKind::Discussion),
            Phase::FinalWords => Some(TurnKind::FinalWords),
            Phase::Initialization
            | Phase::Elimination
            | Phase::ClosingSynthesis
            | Phase::Complete
            | Phase::Aborted => None,
        }
    }

    /// Decide whether a transition should fire right now. Pure; the caller
    /// applies the change via [`CompetitionState::advance_phase`].
    pub fn evaluate(&self, state: &CompetitionState) -> EngineResult<Option<PhaseChange>> {
        let change = match state.phase {
            Phase::Initialization => {
                if state.participants.len() >= 2 {
                    Some(PhaseChange {
                        to: Phase::OpeningStatements,
                        reason: format!("{} participants registered", state.participants.len()),
                        trigger: None,
                    })
                } else {
                    None
                }
            }
            Phase::OpeningStatements => {
                if self.everyone_spoke_this_phase(state) {
                    Some(PhaseChange {
                        to: Phase::Discussion,
                        reason: "every participant delivered an opening statement".to_string(),
                        trigger: None,
                    })
                } else {
                    None
                }
            }
            Phase::Discussion => self.discussion_exit(state),
            Phase::Elimination => {
                let survivors = state.eligible_count();
                if survivors >= self.elimination.min_active && state.turn < self.max_turns {
                    Some(PhaseChange {
                        to: Phase::Discussion,
                        reason: format!("{survivors} participants remain active"),
                        trigger: None,
                    })
                } else {
                    Some(PhaseChange {
                        to: Phase::FinalWords,
                        reason: if state.turn >= self.max_turns {
                            format!("turn ceiling {} reached", self.max_turns)
                        } else {
                            format!("field reduced to {survivors}")
                        },
                        trigger: None,
                    })
                }
            }
            Phase::FinalWords => {
                if self.everyone_spoke_this_phase(state) {
                    Some(PhaseChange {
                        to: Phase::ClosingSynthesis,
                        reason: "final words delivered".to_string(),
                        trigger: None,
                    })
                } else {
                    None
                }
            }
            Phase::ClosingSynthesis => Some(PhaseChange {
                to: Phase::Complete,
                reason: "closing synthesis appended".to_string(),
                trigger: None,
            }),
            Phase::Complete | Phase::Aborted => None,
        };
        Ok(change)
    }

    fn discussion_exit(&self, state: &CompetitionState) -> Option<PhaseChange> {
        if state.eligible_count() < 2 {
            return Some(PhaseChange {
                to: Phase::Elimination,
                reason: "fewer than two active participants".to_string(),
                trigger: Some(EliminationTrigger::LastStanding),
            });
        }
        if state.turn >= self.max_turns {
            return Some(PhaseChange {
                to: Phase::Elimination,
                reason: format!("turn ceiling {} reached", self.max_turns),
                trigger: Some(EliminationTrigger::MaxTurns),
            });
        }
        if let Some(floor) = self.elimination.score_floor {
            if let Some(lowest) = state.lowest_eligible() {
                let score = state.cumulative_score(lowest);
                if score < floor {
                    return Some(PhaseChange {
                        to: Phase::Elimination,
                        reason: format!("lowest score {score:.2} fell below floor {floor:.2}"),
                        trigger: Some(EliminationTrigger::ScoreFloor),
                    });
                }
            }
        }
        let stint = state.turn.saturating_sub(state.phase_entered_turn);
        if self.elimination.interval > 0 && stint >= self.elimination.interval {
            return Some(PhaseChange {
                to: Phase::Elimination,
                reason: format!("{stint} discussion turns since last elimination"),
                trigger: Some(EliminationTrigger::Interval),
            });
        }
        None
    }

    /// Whether every eligible participant has spoken since the current
    /// phase was entered.
    fn everyone_spoke_this_phase(&self, state: &CompetitionState) -> bool {
        let spoke = |p: &&Participant| {
            p.last_spoke_turn
                .is_some_and(|t| t >= state.phase_entered_turn)
        };
        let eligible = state.eligible();
        !eligible.is_empty() && eligible.iter().all(spoke)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::CompetitionConfig;

    fn engine() -> PhaseEngine {
        PhaseEngine::new(EliminationConfig::default(), 40)
    }

    fn state_in_phase(phase: Phase, participants: u32) -> CompetitionState {
        let mut state = CompetitionState::new("phases", CompetitionConfig::default());
        for i in 0..participants {
            state.register(format!("P{i}"), format!("persona-{i}")).unwrap();
        }
        // Walk the legal path up to the requested phase.
        let path = [
            Phase::OpeningStatements,
            Phase::Discussion,
            Phase::Elimination,
            Phase::FinalWords,
            Phase::ClosingSynthesis,
            Phase::Complete,
        ];
        for next in path {
            if state.phase == phase {
                break;
            }
            state.advance_phase(next).unwrap();
        }
        state
    }

    #[test]
    fn test_initialization_waits_for_registration() {
        let state = state_in_phase(Phase::Initialization, 1);
        assert!(engine().evaluate(&state).unwrap().is_none());

        let state = state_in_phase(Phase::Initialization, 3);
        let change = engine().evaluate(&state).unwrap().unwrap();
        assert_eq!(change.to, Phase::OpeningStatements);
    }

    #[test]
    fn test_opening_completes_when_all_spoke() {
        let mut state = state_in_phase(Phase::OpeningStatements, 2);
        assert!(engine().evaluate(&state).unwrap().is_none());

        let ids: Vec<_> = state.participants.iter().map(|p| p.id).collect();
        for (i, id) in ids.iter().enumerate() {
            state
                .participant_mut(*id)
                .unwrap()
                .mark_spoke(u32::try_from(i).unwrap());
        }
        state.turn = 2;
        let change = engine().evaluate(&state).unwrap().unwrap();
        assert_eq!(change.to, Phase::Discussion);
    }

    #[test]
    fn test_discussion_interval_triggers_elimination() {
        let mut state = state_in_phase(Phase::Discussion, 3);
        state.phase_entered_turn = 3;
        state.turn = 3 + EliminationConfig::default().interval;
        let change = engine().evaluate(&state).unwrap().unwrap();
        assert_eq!(change.to, Phase::Elimination);
        assert_eq!(change.trigger, Some(EliminationTrigger::Interval));
        assert!(change.trigger.unwrap().cuts());
    }

    #[test]
    fn test_score_floor_triggers_before_interval() {
        let eng = PhaseEngine::new(
            EliminationConfig {
                interval: 100,
                score_floor: Some(0.0),
                min_active: 2,
            },
            40,
        );
        let mut state = state_in_phase(Phase::Discussion, 2);
        let low = state.participants[0].id;
        state.participant_mut(low).unwrap().record_score(1, -2.0);
        state.turn = 2;

        let change = eng.evaluate(&state).unwrap().unwrap();
        assert_eq!(change.trigger, Some(EliminationTrigger::ScoreFloor));
    }

    #[test]
    fn test_max_turns_winds_down_without_cutting() {
        let eng = PhaseEngine::new(EliminationConfig::default(), 10);
        let mut state = state_in_phase(Phase::Discussion, 3);
        state.turn = 10;
        let change = eng.evaluate(&state).unwrap().unwrap();
        assert_eq!(change.to, Phase::Elimination);
        assert_eq!(change.trigger, Some(EliminationTrigger::MaxTurns));
        assert!(!change.trigger.unwrap().cuts());
    }

    #[test]
    fn test_elimination_returns_to_discussion_with_enough_survivors() {
        let mut state = state_in_phase(Phase::Elimination, 3);
        state.turn = 5;
        let change = engine().evaluate(&state).unwrap().unwrap();
        assert_eq!(change.to, Phase::Discussion);
    }

    #[test]
    fn test_elimination_exits_to_final_words_when_field_collapses() {
        let mut state = state_in_phase(Phase::Elimination, 3);
        let ids: Vec<_> = state.participants.iter().skip(1).map(|p| p.id).collect();
        for id in ids {
            state.participant_mut(id).unwrap().eliminate();
        }
        let change = engine().evaluate(&state).unwrap().unwrap();
        assert_eq!(change.to, Phase::FinalWords);
    }

    #[test]
    fn test_terminal_phases_stay_put() {
        let state = state_in_phase(Phase::Complete, 2);
        assert!(engine().evaluate(&state).unwrap().is_none());
    }

    #[test]
    fn test_turn_kinds_by_phase() {
        let eng = engine();
        assert_eq!(
            eng.turn_kind(&state_in_phase(Phase::OpeningStatements, 2)),
            Some(TurnKind::Opening)
        );
        assert_eq!(
            eng.turn_kind(&state_in_phase(Phase::Discussion, 2)),
            Some(TurnKind::Discussion)
        );
        assert_eq!(eng.turn_kind(&state_in_phase(Phase::Elimination, 2)), None);
        assert_eq!(
            eng.turn_kind(&state_in_phase(Phase::FinalWords, 2)),
            Some(TurnKind::FinalWords)
        );
    }
}
