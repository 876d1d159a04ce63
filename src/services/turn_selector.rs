//! Urgency-based turn selection.
//!
//! Chooses the next speaker among Active and AtRisk participants by
//! combining inverse recency, a fairness term against over-speaking, and a
//! strategic-position term that gives weaker participants more chances. A
//! hard `max_turn_gap` bound forces starved participants to the front
//! regardless of urgency, which keeps scheduling unfairness bounded.

use tracing::debug;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::competition::CompetitionState;
use crate::domain::models::config::SelectorConfig;
use crate::domain::models::participant::ParticipantId;

use super::rng::SeededRng;

pub struct TurnSelector {
    config: SelectorConfig,
}

impl TurnSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    /// Pick the next speaker. Ties are broken by lowest participant id so
    /// the choice is deterministic and stable.
    pub fn select_next(
        &self,
        state: &CompetitionState,
        rng: &mut SeededRng,
    ) -> EngineResult<ParticipantId> {
        let eligible = state.eligible();
        if eligible.is_empty() {
            return Err(EngineError::NoEligibleParticipants { turn: state.turn });
        }

        // Hard fairness bound: anyone starved past max_turn_gap goes first.
        let starved = eligible
            .iter()
            .filter(|p| p.turns_since_spoke(state.turn) > self.config.max_turn_gap)
            .max_by_key(|p| (p.turns_since_spoke(state.turn), std::cmp::Reverse(p.id)));
        if let Some(p) = starved {
            debug!(participant = %p.id, gap = p.turns_since_spoke(state.turn), "forced selection past max_turn_gap");
            return Ok(p.id);
        }

        let mean_turns = eligible.iter().map(|p| f64::from(p.turns_taken)).sum::<f64>()
            / eligible.len() as f64;
        let scores: Vec<f64> = eligible
            .iter()
            .map(|p| state.cumulative_score(p.id))
            .collect();
        let min_score = scores.iter().copied().fold(f64::INFINITY, f64::min);
        let max_score = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let range = max_score - min_score;

        let mut best: Option<(ParticipantId, f64)> = None;
        // Candidates are visited in id order so the seeded jitter draws are
        // reproducible and ties resolve to the lowest id.
        let mut ordered: Vec<_> = eligible.iter().collect();
        ordered.sort_by_key(|p| p.id);
        for p in ordered {
            let score = state.cumulative_score(p.id);
            let deficit = if range > f64::EPSILON {
                (max_score - score) / range
            } else {
                0.0
            };
            let jitter = rng.jitter(self.config.jitter);
            let urgency = self.urgency(
                p.turns_since_spoke(state.turn),
                f64::from(p.turns_taken),
                mean_turns,
                deficit,
                jitter,
            );
            if best.is_none_or(|(_, b)| urgency > b) {
                best = Some((p.id, urgency));
            }
        }

        let (id, urgency) = best.expect("eligible is non-empty");
        debug!(participant = %id, urgency, turn = state.turn, "speaker selected");
        Ok(id)
    }

    /// The urgency value for one candidate. Public so the scheduling
    /// benchmark can drive it directly.
    pub fn urgency(
        &self,
        gap: u32,
        turns_taken: f64,
        mean_turns: f64,
        score_deficit: f64,
        jitter: f64,
    ) -> f64 {
        let recency = self.config.recency_weight * f64::from(gap);
        let fairness = self.config.fairness_weight * (turns_taken - mean_turns).max(0.0);
        let strategic = self.config.strategic_weight * score_deficit;
        recency - fairness + strategic + jitter
    }
}
