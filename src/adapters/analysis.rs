//! Lexical similarity and stall classification.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::domain::errors::EngineResult;
use crate::domain::ports::{SimilarityProvider, StallClassifier};

/// Word-set Jaccard similarity. A crude stand-in for an embedding service,
/// but monotone in lexical overlap and fully deterministic.
#[derive(Debug, Clone, Copy, Default)]
pub struct JaccardSimilarity;

fn word_set(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

#[async_trait]
impl SimilarityProvider for JaccardSimilarity {
    async fn similarity(&self, a: &str, b: &str) -> EngineResult<f64> {
        let sa = word_set(a);
        let sb = word_set(b);
        if sa.is_empty() && sb.is_empty() {
            return Ok(1.0);
        }
        if sa.is_empty() || sb.is_empty() {
            return Ok(0.0);
        }
        let intersection = sa.intersection(&sb).count();
        let union = sa.union(&sb).count();
        Ok(intersection as f64 / union as f64)
    }
}

const FILLER: [&str; 14] = [
    "interesting", "good", "point", "agree", "yes", "indeed", "think", "maybe", "perhaps",
    "thanks", "great", "nice", "sure", "well",
];

/// Flags utterances as generic when they are short or dominated by filler
/// vocabulary.
#[derive(Debug, Clone, Copy)]
pub struct StopwordStallClassifier {
    /// Below this many words an utterance is generic outright.
    pub min_words: usize,
    /// Filler-word fraction at or above which an utterance is generic.
    pub filler_ratio: f64,
}

impl Default for StopwordStallClassifier {
    fn default() -> Self {
        Self {
            min_words: 4,
            filler_ratio: 0.5,
        }
    }
}

#[async_trait]
impl StallClassifier for StopwordStallClassifier {
    async fn is_generic(&self, text: &str) -> EngineResult<bool> {
        let words: Vec<String> = text
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        if words.len() < self.min_words {
            return Ok(true);
        }
        let filler = words.iter().filter(|w| FILLER.contains(&w.as_str())).count();
        Ok(filler as f64 / words.len() as f64 >= self.filler_ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_jaccard_extremes() {
        let sim = JaccardSimilarity;
        assert!((sim.similarity("a b c", "a b c").await.unwrap() - 1.0).abs() < f64::EPSILON);
        assert!((sim.similarity("a b c", "x y z").await.unwrap() - 0.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_jaccard_ignores_case_and_punctuation() {
        let sim = JaccardSimilarity;
        let s = sim.similarity("Caching, fixes latency.", "caching fixes latency").await.unwrap();
        assert!((s - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_stall_classifier() {
        let clf = StopwordStallClassifier::default();
        assert!(clf.is_generic("good point").await.unwrap());
        assert!(clf.is_generic("interesting, I agree, great point indeed").await.unwrap());
        assert!(!clf
            .is_generic("sharding the index by tenant halves the lookup latency")
            .await
            .unwrap());
    }
}
