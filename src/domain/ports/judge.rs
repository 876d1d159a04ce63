//! Port for the judge backend.
//!
//! The ensemble treats a juror as an opaque, possibly-failing remote call:
//! hand it a transcript fragment and a rubric, get raw dimension scores back.

use async_trait::async_trait;

use crate::domain::errors::EngineResult;
use crate::domain::models::scorecard::{DimensionScores, Rubric};
use crate::domain::models::transcript::TranscriptFragment;

/// A scoring function callable once per juror per turn.
#[async_trait]
pub trait JudgeBackend: Send + Sync {
    /// Score `fragment` against `rubric`. `temperature` is the juror's
    /// stochastic-diversity setting; backends that have no notion of it may
    /// ignore it.
    async fn score(
        &self,
        fragment: &TranscriptFragment,
        rubric: &Rubric,
        temperature: f64,
    ) -> EngineResult<DimensionScores>;
}
