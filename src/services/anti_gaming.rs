//! Anti-gaming detection.
//!
//! Inspects a fresh utterance against recent history and emits penalties for
//! paraphrase, repetition, stalling, orbiting, and unsupported claims. The
//! detector holds no mutable state between calls: all history is passed in
//! by the orchestrator from the transcript, and similarity/classification
//! come from external services as plain numbers.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;

use crate::domain::errors::EngineResult;
use crate::domain::models::config::DetectorConfig;
use crate::domain::models::penalty::{Penalty, PenaltyKind};
use crate::domain::models::transcript::Utterance;
use crate::domain::ports::{SimilarityProvider, StallClassifier};

/// Signal returned to the orchestrator alongside penalties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intervention {
    /// The discussion is circling; force a topic shift on the next turn.
    TopicShift,
}

/// Result of inspecting one utterance.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub penalties: Vec<Penalty>,
    pub intervention: Option<Intervention>,
    /// Whether the external classifier judged this utterance generic. The
    /// orchestrator uses it to maintain the per-participant streak it passes
    /// back in on the next call.
    pub is_generic: bool,
}

pub struct AntiGamingDetector {
    config: DetectorConfig,
    similarity: Arc<dyn SimilarityProvider>,
    classifier: Arc<dyn StallClassifier>,
}

impl AntiGamingDetector {
    pub fn new(
        config: DetectorConfig,
        similarity: Arc<dyn SimilarityProvider>,
        classifier: Arc<dyn StallClassifier>,
    ) -> Self {
        Self {
            config,
            similarity,
            classifier,
        }
    }

    /// Inspect `utterance` against the `window` of recent utterances (any
    /// author, oldest first, not yet containing `utterance`).
    /// `generic_streak` is how many consecutive generic turns this
    /// participant had before this one.
    pub async fn inspect(
        &self,
        utterance: &Utterance,
        window: &[Utterance],
        generic_streak: u32,
    ) -> EngineResult<Inspection> {
        let mut penalties = Vec::new();
        let mut intervention = None;

        self.check_unsupported_claims(utterance, &mut penalties);
        self.check_paraphrase(utterance, window, &mut penalties).await?;
        self.check_repetition(utterance, window, &mut penalties);
        let is_generic = self
            .check_stall(utterance, generic_streak, &mut penalties)
            .await?;
        if self.check_orbiting(utterance, window, &mut penalties).await? {
            intervention = Some(Intervention::TopicShift);
        }

        if !penalties.is_empty() {
            debug!(
                participant = %utterance.participant,
                turn = utterance.turn,
                count = penalties.len(),
                "anti-gaming penalties emitted"
            );
        }

        Ok(Inspection {
            penalties,
            intervention,
            is_generic,
        })
    }

    fn check_unsupported_claims(&self, utterance: &Utterance, out: &mut Vec<Penalty>) {
        if !self.config.unsupported_claim.enabled {
            return;
        }
        for claim in utterance.unsupported_claims() {
            out.push(Penalty::new(
                PenaltyKind::UnsupportedClaim,
                self.config.unsupported_claim.penalty_per_claim,
                utterance.participant,
                utterance.turn,
                format!("factual claim without evidence: \"{}\"", claim.text),
            ));
        }
    }

    async fn check_paraphrase(
        &self,
        utterance: &Utterance,
        window: &[Utterance],
        out: &mut Vec<Penalty>,
    ) -> EngineResult<()> {
        let check = &self.config.paraphrase;
        if !check.enabled {
            return Ok(());
        }
        let mut worst: Option<(f64, u32)> = None;
        for prior in window {
            let score = self.similarity.similarity(&utterance.text, &prior.text).await?;
            if worst.is_none_or(|(best, _)| score > best) {
                worst = Some((score, prior.turn));
            }
        }
        if let Some((score, turn)) = worst {
            if score >= check.threshold {
                out.push(Penalty::new(
                    PenaltyKind::Paraphrase,
                    check.penalty,
                    utterance.participant,
                    utterance.turn,
                    format!("similarity {score:.2} to utterance at turn {turn}"),
                ));
            }
        }
        Ok(())
    }

    fn check_repetition(
        &self,
        utterance: &Utterance,
        window: &[Utterance],
        out: &mut Vec<Penalty>,
    ) {
        let check = &self.config.repetition;
        if !check.enabled {
            return;
        }
        let own: Vec<&Utterance> = window
            .iter()
            .filter(|u| u.participant == utterance.participant)
            .collect();
        let start = own.len().saturating_sub(check.own_history);
        let mut history = HashSet::new();
        for prior in &own[start..] {
            history.extend(ngrams(&prior.text, check.ngram));
        }
        let ratio = overlap_ratio(&utterance.text, check.ngram, &history);
        if ratio >= check.threshold {
            out.push(Penalty::new(
                PenaltyKind::Repetition,
                check.penalty,
                utterance.participant,
                utterance.turn,
                format!(
                    "{:.0}% of {}-grams repeat the participant's own recent turns",
                    ratio * 100.0,
                    check.ngram
                ),
            ));
        }
    }

    async fn check_stall(
        &self,
        utterance: &Utterance,
        generic_streak: u32,
        out: &mut Vec<Penalty>,
    ) -> EngineResult<bool> {
        let check = &self.config.stall;
        if !check.enabled {
            return Ok(false);
        }
        let is_generic = self.classifier.is_generic(&utterance.text).await?;
        if is_generic && generic_streak + 1 > check.max_consecutive_generic_turns {
            out.push(Penalty::new(
                PenaltyKind::Stall,
                check.penalty,
                utterance.participant,
                utterance.turn,
                format!(
                    "{} consecutive generic turns (limit {})",
                    generic_streak + 1,
                    check.max_consecutive_generic_turns
                ),
            ));
        }
        Ok(is_generic)
    }

    /// Returns true when an orbiting intervention should fire.
    async fn check_orbiting(
        &self,
        utterance: &Utterance,
        window: &[Utterance],
        out: &mut Vec<Penalty>,
    ) -> EngineResult<bool> {
        let check = &self.config.orbiting;
        if !check.enabled || check.window < 2 {
            return Ok(false);
        }
        // The plateau is measured over the newest `window` utterances
        // including the one under inspection.
        if window.len() + 1 < check.window {
            return Ok(false);
        }
        let mut texts: Vec<&str> = window
            .iter()
            .skip(window.len() + 1 - check.window)
            .map(|u| u.text.as_str())
            .collect();
        texts.push(&utterance.text);

        let mut total = 0.0;
        let mut pairs = 0u32;
        for i in 0..texts.len() {
            for j in (i + 1)..texts.len() {
                total += self.similarity.similarity(texts[i], texts[j]).await?;
                pairs += 1;
            }
        }
        let mean = total / f64::from(pairs);
        if mean >= check.threshold {
            out.push(Penalty::new(
                PenaltyKind::Orbiting,
                check.penalty,
                utterance.participant,
                utterance.turn,
                format!(
                    "mean pairwise similarity {:.2} across last {} utterances",
                    mean, check.window
                ),
            ));
            return Ok(true);
        }
        Ok(false)
    }
}

/// Word n-grams of `text`, joined with single spaces.
fn ngrams(text: &str, n: usize) -> HashSet<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if n == 0 || words.len() < n {
        return HashSet::new();
    }
    words.windows(n).map(|w| w.join(" ")).collect()
}

/// Fraction of `text`'s n-grams present in `history`. Zero when the text is
/// too short to form a single n-gram.
fn overlap_ratio(text: &str, n: usize, history: &HashSet<String>) -> f64 {
    let own = ngrams(text, n);
    if own.is_empty() || history.is_empty() {
        return 0.0;
    }
    let hits = own.iter().filter(|g| history.contains(*g)).count();
    hits as f64 / own.len() as f64
}
