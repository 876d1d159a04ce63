//! Judge ensemble: independent jurors, outlier-robust aggregation, and
//! deterministic tie-breaking.
//!
//! Jurors run concurrently and are joined before aggregation; a slow juror
//! is cancelled by its own budget without blocking the others. Flagged
//! outliers are excluded from the aggregate for that dimension only and stay
//! visible in the scorecard.

use std::cmp::Ordering;
use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::config::{BudgetLimits, JuryConfig, RubricWeights};
use crate::domain::models::participant::ParticipantId;
use crate::domain::models::scorecard::{
    AggregationMethod, Dimension, DimensionScores, JurorReturn, Rubric, Scorecard,
};
use crate::domain::models::transcript::TranscriptFragment;
use crate::domain::ports::JudgeBackend;

use super::budget_enforcer::BudgetEnforcer;
use super::rng::SeededRng;

pub struct JudgeEnsemble {
    backend: Arc<dyn JudgeBackend>,
    enforcer: Arc<BudgetEnforcer>,
    jury: JuryConfig,
    weights: RubricWeights,
    judge_budget: BudgetLimits,
}

impl JudgeEnsemble {
    pub fn new(
        backend: Arc<dyn JudgeBackend>,
        enforcer: Arc<BudgetEnforcer>,
        jury: JuryConfig,
        weights: RubricWeights,
        judge_budget: BudgetLimits,
    ) -> Self {
        Self {
            backend,
            enforcer,
            jury,
            weights,
            judge_budget,
        }
    }

    /// Score one turn. Fails with [`EngineError::InsufficientJurors`] when
    /// fewer than the quorum return within budget.
    pub async fn score(
        &self,
        turn: u32,
        participant: ParticipantId,
        fragment: &TranscriptFragment,
        rubric: &Rubric,
    ) -> EngineResult<Scorecard> {
        let calls = (0..self.jury.jurors).map(|i| {
            let temperature = self.jury.temperature_for(i);
            let label = format!("juror:{i}");
            async move {
                let result = self
                    .enforcer
                    .timebox(turn, &label, self.judge_budget, async {
                        self.backend.score(fragment, rubric, temperature).await
                    })
                    .await;
                (i, temperature, result)
            }
        });

        let mut returned: Vec<(usize, f64, DimensionScores)> = Vec::new();
        for (i, temperature, result) in join_all(calls).await {
            match result {
                Ok(outcome) => returned.push((i, temperature, outcome.output)),
                Err(err) => {
                    warn!(juror = i, error = %err, "juror failed, excluded from aggregate");
                }
            }
        }

        let quorum = self.jury.effective_quorum();
        if returned.len() < quorum {
            return Err(EngineError::InsufficientJurors {
                returned: returned.len(),
                quorum,
            });
        }

        let mut jurors: Vec<JurorReturn> = returned
            .iter()
            .map(|(i, temperature, scores)| JurorReturn {
                juror: *i,
                temperature: *temperature,
                scores: *scores,
                outlier_dimensions: Vec::new(),
            })
            .collect();

        let mut aggregated = DimensionScores::default();
        for dim in Dimension::ALL {
            let values: Vec<(usize, f64)> = returned
                .iter()
                .map(|(i, _, scores)| (*i, scores.get(dim)))
                .collect();
            let (value, flagged) = aggregate_dimension(&values, self.jury.method);
            aggregated.set(dim, value);
            for juror_idx in flagged {
                if let Some(j) = jurors.iter_mut().find(|j| j.juror == juror_idx) {
                    j.outlier_dimensions.push(dim);
                }
            }
        }

        let composite = self.composite(&aggregated);
        debug!(
            turn,
            participant = %participant,
            composite,
            jurors = jurors.len(),
            "scorecard aggregated"
        );

        Ok(Scorecard {
            participant,
            turn,
            jurors,
            aggregated,
            composite,
            method: self.jury.method,
        })
    }

    /// Weighted composite on the configured scale. The manipulation weight
    /// subtracts; the result is normalized by the positive weight sum so the
    /// full `[0, scale]` range is attainable.
    fn composite(&self, aggregated: &DimensionScores) -> f64 {
        let mut raw = 0.0;
        for dim in Dimension::ALL {
            let term = self.weights.weight(dim) * aggregated.get(dim);
            if dim.is_deduction() {
                raw -= term;
            } else {
                raw += term;
            }
        }
        let normalizer = self.weights.positive_weight_sum();
        if normalizer <= 0.0 {
            return 0.0;
        }
        (raw / normalizer).clamp(0.0, 1.0) * self.weights.scale
    }
}

/// Collapse one dimension's juror values into an aggregate, flagging IQR
/// outliers (outside `median ± 1.5×IQR`) and excluding them from the
/// aggregate for this dimension only.
fn aggregate_dimension(
    values: &[(usize, f64)],
    method: AggregationMethod,
) -> (f64, Vec<usize>) {
    if values.is_empty() {
        return (0.0, Vec::new());
    }
    let raw: Vec<f64> = values.iter().map(|(_, v)| *v).collect();
    let med = median(&raw);
    let iqr = interquartile_range(&raw);
    let fence = 1.5 * iqr;

    let flagged: Vec<usize> = values
        .iter()
        .filter(|(_, v)| (v - med).abs() > fence)
        .map(|(i, _)| *i)
        .collect();

    let kept: Vec<f64> = values
        .iter()
        .filter(|(i, _)| !flagged.contains(i))
        .map(|(_, v)| *v)
        .collect();
    // All jurors flagged can only happen with degenerate input; keep the
    // full set rather than aggregating nothing.
    let kept = if kept.is_empty() { raw } else { kept };

    let value = match method {
        AggregationMethod::Median => median(&kept),
        AggregationMethod::Mean => mean(&kept),
        AggregationMethod::TrimmedMean => trimmed_mean(&kept),
    };
    (value, flagged)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut v = values.to_vec();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    v
}

fn median(values: &[f64]) -> f64 {
    let v = sorted(values);
    if v.is_empty() {
        return 0.0;
    }
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        (v[mid - 1] + v[mid]) / 2.0
    } else {
        v[mid]
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean after dropping the single lowest and highest value.
fn trimmed_mean(values: &[f64]) -> f64 {
    if values.len() <= 2 {
        return mean(values);
    }
    let v = sorted(values);
    mean(&v[1..v.len() - 1])
}

/// IQR via Tukey hinges: the median splits the sorted values into halves
/// (the median itself joins both halves when the count is odd), and the
/// quartiles are the halves' medians.
fn interquartile_range(values: &[f64]) -> f64 {
    let v = sorted(values);
    if v.len() < 2 {
        return 0.0;
    }
    let half = v.len().div_ceil(2);
    let q1 = median(&v[..half]);
    let q3 = median(&v[v.len() - half..]);
    q3 - q1
}

/// Inputs to ranking tie-breaks, computed by the orchestrator from the
/// transcript and score history.
#[derive(Debug, Clone, PartialEq)]
pub struct TieBreakInput {
    pub participant: ParticipantId,
    pub composite: f64,
    /// Fraction of the participant's factual claims carrying evidence.
    pub evidence_consistency: f64,
    /// Inverse variability of per-turn scores; a steadier persona wins.
    pub steadiness: f64,
}

/// The draw consumed from the seeded stream when criteria cannot separate
/// two tied participants. Returned so the caller can log it.
#[derive(Debug, Clone, PartialEq)]
pub struct TieBreakDraw {
    pub a: ParticipantId,
    pub b: ParticipantId,
    pub value: f64,
}

/// Ordered tie-break protocol: composite (within epsilon), evidence
/// consistency, steadiness, then a seeded random draw.
#[derive(Debug, Clone)]
pub struct TieBreaker {
    pub epsilon: f64,
}

impl Default for TieBreaker {
    fn default() -> Self {
        Self { epsilon: 1e-6 }
    }
}

impl TieBreaker {
    /// Compare two participants for ranking, best first. A `Some` draw means
    /// the random criterion was consumed and must be logged.
    pub fn compare(
        &self,
        a: &TieBreakInput,
        b: &TieBreakInput,
        rng: &mut SeededRng,
    ) -> (Ordering, Option<TieBreakDraw>) {
        if (a.composite - b.composite).abs() > self.epsilon {
            // Higher composite ranks first.
            return (
                b.composite
                    .partial_cmp(&a.composite)
                    .unwrap_or(Ordering::Equal),
                None,
            );
        }
        if (a.evidence_consistency - b.evidence_consistency).abs() > self.epsilon {
            return (
                b.evidence_consistency
                    .partial_cmp(&a.evidence_consistency)
                    .unwrap_or(Ordering::Equal),
                None,
            );
        }
        if (a.steadiness - b.steadiness).abs() > self.epsilon {
            return (
                b.steadiness
                    .partial_cmp(&a.steadiness)
                    .unwrap_or(Ordering::Equal),
                None,
            );
        }
        let value = rng.next_f64();
        let ordering = if value < 0.5 {
            Ordering::Less
        } else {
            Ordering::Greater
        };
        (
            ordering,
            Some(TieBreakDraw {
                a: a.participant,
                b: b.participant,
                value,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::domain::models::transcript::{Utterance, UtteranceDraft};
    use crate::services::audit_log::AuditLog;

    /// Backend returning canned novelty per juror call order is not
    /// observable, so scores are keyed off temperature instead.
    struct CannedJudge {
        by_temperature: Vec<(f64, DimensionScores)>,
    }

    #[async_trait]
    impl JudgeBackend for CannedJudge {
        async fn score(
            &self,
            _fragment: &TranscriptFragment,
            _rubric: &Rubric,
            temperature: f64,
        ) -> EngineResult<DimensionScores> {
            self.by_temperature
                .iter()
                .find(|(t, _)| (t - temperature).abs() < 1e-9)
                .map(|(_, s)| *s)
                .ok_or_else(|| EngineError::adapter("judge", "unknown temperature"))
        }
    }

    struct FailingJudge;

    #[async_trait]
    impl JudgeBackend for FailingJudge {
        async fn score(
            &self,
            _fragment: &TranscriptFragment,
            _rubric: &Rubric,
            _temperature: f64,
        ) -> EngineResult<DimensionScores> {
            Err(EngineError::adapter("judge", "backend unavailable"))
        }
    }

    fn fragment() -> TranscriptFragment {
        let id = ParticipantId::from_registration(11, 0);
        TranscriptFragment {
            utterance: Utterance::from_draft(UtteranceDraft::new("a novel idea"), id, 0, 1),
            context: Vec::new(),
        }
    }

    fn uniform(v: f64) -> DimensionScores {
        DimensionScores::clamped(v, v, v, v, 0.0)
    }

    fn ensemble(backend: Arc<dyn JudgeBackend>, jury: JuryConfig) -> JudgeEnsemble {
        JudgeEnsemble::new(
            backend,
            Arc::new(BudgetEnforcer::new(Arc::new(AuditLog::default()))),
            jury,
            RubricWeights::default(),
            BudgetLimits::default(),
        )
    }

    #[test]
    fn test_iqr_outlier_example() {
        // Juror scores [0.2, 0.8, 0.81]: median 0.8, IQR 0.305, so 0.2 is
        // flagged and the aggregate is the median of {0.8, 0.81} = 0.805.
        let values = vec![(0, 0.2), (1, 0.8), (2, 0.81)];
        let (aggregate, flagged) = aggregate_dimension(&values, AggregationMethod::Median);
        assert_eq!(flagged, vec![0]);
        assert!((aggregate - 0.805).abs() < 1e-9);
    }

    #[test]
    fn test_aggregation_methods() {
        let values = vec![(0, 0.4), (1, 0.5), (2, 0.6), (3, 0.9)];
        let (med, _) = aggregate_dimension(&values, AggregationMethod::Median);
        assert!((med - 0.55).abs() < 1e-9);

        let flat = vec![(0, 0.2), (1, 0.4), (2, 0.6)];
        let (mean_v, _) = aggregate_dimension(&flat, AggregationMethod::Mean);
        assert!((mean_v - 0.4).abs() < 1e-9);
        let (trimmed, _) = aggregate_dimension(&flat, AggregationMethod::TrimmedMean);
        assert!((trimmed - 0.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_ensemble_scores_and_flags_outliers() {
        let backend = CannedJudge {
            by_temperature: vec![
                (0.2, uniform(0.2)),
                (0.7, uniform(0.8)),
                (1.0, uniform(0.81)),
            ],
        };
        let ens = ensemble(Arc::new(backend), JuryConfig::default());
        let card = ens
            .score(1, ParticipantId::from_registration(11, 0), &fragment(), &Rubric::for_topic("t"))
            .await
            .unwrap();

        assert_eq!(card.jurors.len(), 3);
        assert!((card.aggregated.novelty - 0.805).abs() < 1e-9);
        // Juror 0 flagged on every positive dimension.
        let flagged = card.jurors.iter().find(|j| j.juror == 0).unwrap();
        assert!(flagged.outlier_dimensions.contains(&Dimension::Novelty));
        // Composite: all positive dimensions 0.805, manipulation 0 →
        // raw = 0.805 * 0.85, normalized → 0.805, scaled → 8.05.
        assert!((card.composite - 8.05).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_quorum_failure() {
        let ens = ensemble(Arc::new(FailingJudge), JuryConfig::default());
        let err = ens
            .score(1, ParticipantId::from_registration(11, 0), &fragment(), &Rubric::for_topic("t"))
            .await
            .unwrap_err();
        match err {
            EngineError::InsufficientJurors { returned, quorum } => {
                assert_eq!(returned, 0);
                assert_eq!(quorum, 2);
            }
            other => panic!("expected InsufficientJurors, got {other:?}"),
        }
    }

    #[test]
    fn test_tie_break_criteria_order() {
        let breaker = TieBreaker::default();
        let mut rng = SeededRng::new(1);
        let a = TieBreakInput {
            participant: ParticipantId::from_registration(1, 0),
            composite: 5.0,
            evidence_consistency: 0.9,
            steadiness: 0.5,
        };
        let b = TieBreakInput {
            evidence_consistency: 0.4,
            ..a.clone()
        };
        let b = TieBreakInput {
            participant: ParticipantId::from_registration(1, 1),
            ..b
        };

        // Equal composite: evidence consistency decides, no draw consumed.
        let (ordering, draw) = breaker.compare(&a, &b, &mut rng);
        assert_eq!(ordering, Ordering::Less);
        assert!(draw.is_none());
    }

    #[test]
    fn test_tie_break_random_draw_is_seeded() {
        let breaker = TieBreaker::default();
        let a = TieBreakInput {
            participant: ParticipantId::from_registration(1, 0),
            composite: 5.0,
            evidence_consistency: 0.5,
            steadiness: 0.5,
        };
        let b = TieBreakInput {
            participant: ParticipantId::from_registration(1, 1),
            ..a.clone()
        };

        let mut rng1 = SeededRng::new(42);
        let mut rng2 = SeededRng::new(42);
        let (o1, d1) = breaker.compare(&a, &b, &mut rng1);
        let (o2, d2) = breaker.compare(&a, &b, &mut rng2);
        assert_eq!(o1, o2);
        let (d1, d2) = (d1.unwrap(), d2.unwrap());
        assert!((d1.value - d2.value).abs() < f64::EPSILON);
    }
}
