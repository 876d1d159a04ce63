//! Ports for similarity and generic-text classification services.
//!
//! The anti-gaming detector consumes these as plain numeric/boolean inputs;
//! whether they are backed by embeddings, a classifier model, or a lexical
//! heuristic is the adapter's business.

use async_trait::async_trait;

use crate::domain::errors::EngineResult;

/// Supplies semantic similarity scores in `[0, 1]`.
#[async_trait]
pub trait SimilarityProvider: Send + Sync {
    async fn similarity(&self, a: &str, b: &str) -> EngineResult<f64>;
}

/// Classifies an utterance as generic/non-substantive.
#[async_trait]
pub trait StallClassifier: Send + Sync {
    async fn is_generic(&self, text: &str) -> EngineResult<bool>;
}
