//! Lexical heuristic judge backend.
//!
//! Scores utterances from surface features only: vocabulary novelty against
//! the context, lexical overlap with other speakers, richness, and a small
//! rhetoric wordlist for manipulation. Temperature adds a deterministic
//! perturbation derived from the utterance text, so identical inputs always
//! produce identical scores.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::errors::EngineResult;
use crate::domain::models::scorecard::{DimensionScores, Rubric};
use crate::domain::models::transcript::TranscriptFragment;
use crate::domain::ports::JudgeBackend;
use crate::services::SeededRng;

const RHETORIC: [&str; 8] = [
    "obviously", "clearly", "everyone", "always", "never", "must", "undeniable", "trust",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicJudge;

impl HeuristicJudge {
    fn words(text: &str) -> Vec<String> {
        text.split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| !w.is_empty())
            .collect()
    }
}

#[async_trait]
impl JudgeBackend for HeuristicJudge {
    async fn score(
        &self,
        fragment: &TranscriptFragment,
        _rubric: &Rubric,
        temperature: f64,
    ) -> EngineResult<DimensionScores> {
        let words = Self::words(&fragment.utterance.text);
        if words.is_empty() {
            return Ok(DimensionScores::default());
        }
        let own: HashSet<&String> = words.iter().collect();

        let mut context_vocab: HashSet<String> = HashSet::new();
        let mut other_vocab: HashSet<String> = HashSet::new();
        for prior in &fragment.context {
            for w in Self::words(&prior.text) {
                if prior.participant != fragment.utterance.participant {
                    other_vocab.insert(w.clone());
                }
                context_vocab.insert(w);
            }
        }

        let fresh = own.iter().filter(|w| !context_vocab.contains(**w)).count();
        let novelty = fresh as f64 / own.len() as f64;

        let shared_with_others = own.iter().filter(|w| other_vocab.contains(**w)).count();
        let builds_on_others = if other_vocab.is_empty() {
            0.3
        } else {
            (shared_with_others as f64 / own.len() as f64).min(1.0)
        };

        let richness = own.len() as f64 / words.len() as f64;
        let solves_subproblem = (richness * 0.6 + novelty * 0.4).min(1.0);
        let radical_idea = (novelty * richness).min(1.0);

        let rhetoric_hits = words.iter().filter(|w| RHETORIC.contains(&w.as_str())).count();
        let manipulation = (rhetoric_hits as f64 / words.len() as f64 * 4.0).min(1.0);

        // Temperature perturbation seeded from the text so runs replay.
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in fragment.utterance.text.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        let mut rng = SeededRng::new(hash ^ temperature.to_bits());
        let amp = temperature * 0.05;
        let jitter = |v: f64, rng: &mut SeededRng| (v + rng.jitter(amp)).clamp(0.0, 1.0);

        Ok(DimensionScores {
            novelty: jitter(novelty, &mut rng),
            builds_on_others: jitter(builds_on_others, &mut rng),
            solves_subproblem: jitter(solves_subproblem, &mut rng),
            radical_idea: jitter(radical_idea, &mut rng),
            manipulation: jitter(manipulation, &mut rng),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::participant::ParticipantId;
    use crate::domain::models::transcript::{Utterance, UtteranceDraft};

    fn fragment(text: &str, context: &[(u32, &str)]) -> TranscriptFragment {
        let a = ParticipantId::from_registration(3, 0);
        let b = ParticipantId::from_registration(3, 1);
        TranscriptFragment {
            utterance: Utterance::from_draft(UtteranceDraft::new(text), a, 5, 1),
            context: context
                .iter()
                .map(|(turn, t)| {
                    Utterance::from_draft(UtteranceDraft::new(*t), b, *turn, 1)
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_scores_are_deterministic() {
        let judge = HeuristicJudge;
        let frag = fragment("a genuinely new framing of the question", &[(0, "prior art")]);
        let rubric = Rubric::for_topic("t");
        let one = judge.score(&frag, &rubric, 0.7).await.unwrap();
        let two = judge.score(&frag, &rubric, 0.7).await.unwrap();
        assert_eq!(one, two);
    }

    #[tokio::test]
    async fn test_fresh_text_scores_higher_novelty() {
        let judge = HeuristicJudge;
        let rubric = Rubric::for_topic("t");
        let fresh = judge
            .score(&fragment("entirely unrelated vocabulary here", &[(0, "the old discussion")]), &rubric, 0.0)
            .await
            .unwrap();
        let stale = judge
            .score(&fragment("the old discussion", &[(0, "the old discussion")]), &rubric, 0.0)
            .await
            .unwrap();
        assert!(fresh.novelty > stale.novelty);
    }

    #[tokio::test]
    async fn test_rhetoric_raises_manipulation() {
        let judge = HeuristicJudge;
        let rubric = Rubric::for_topic("t");
        let pushy = judge
            .score(&fragment("obviously everyone must trust this always", &[]), &rubric, 0.0)
            .await
            .unwrap();
        let neutral = judge
            .score(&fragment("here is a measured technical proposal", &[]), &rubric, 0.0)
            .await
            .unwrap();
        assert!(pushy.manipulation > neutral.manipulation);
    }
}
