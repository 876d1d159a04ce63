//! Judge scoring dimensions and the aggregated scorecard.

use serde::{Deserialize, Serialize};

use super::participant::ParticipantId;

/// The five rubric dimensions every juror scores in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Novelty,
    BuildsOnOthers,
    SolvesSubproblem,
    RadicalIdea,
    /// Scored like the others but its weight is applied as a deduction.
    Manipulation,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Novelty,
        Dimension::BuildsOnOthers,
        Dimension::SolvesSubproblem,
        Dimension::RadicalIdea,
        Dimension::Manipulation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Novelty => "novelty",
            Self::BuildsOnOthers => "builds_on_others",
            Self::SolvesSubproblem => "solves_subproblem",
            Self::RadicalIdea => "radical_idea",
            Self::Manipulation => "manipulation",
        }
    }

    /// Whether this dimension's weight subtracts from the composite.
    pub fn is_deduction(&self) -> bool {
        matches!(self, Self::Manipulation)
    }
}

/// Raw per-dimension scores from one juror (or the aggregate of several).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub novelty: f64,
    pub builds_on_others: f64,
    pub solves_subproblem: f64,
    pub radical_idea: f64,
    pub manipulation: f64,
}

impl DimensionScores {
    /// Build with every value clamped to `[0, 1]`.
    pub fn clamped(
        novelty: f64,
        builds_on_others: f64,
        solves_subproblem: f64,
        radical_idea: f64,
        manipulation: f64,
    ) -> Self {
        Self {
            novelty: novelty.clamp(0.0, 1.0),
            builds_on_others: builds_on_others.clamp(0.0, 1.0),
            solves_subproblem: solves_subproblem.clamp(0.0, 1.0),
            radical_idea: radical_idea.clamp(0.0, 1.0),
            manipulation: manipulation.clamp(0.0, 1.0),
        }
    }

    pub fn get(&self, dim: Dimension) -> f64 {
        match dim {
            Dimension::Novelty => self.novelty,
            Dimension::BuildsOnOthers => self.builds_on_others,
            Dimension::SolvesSubproblem => self.solves_subproblem,
            Dimension::RadicalIdea => self.radical_idea,
            Dimension::Manipulation => self.manipulation,
        }
    }

    pub fn set(&mut self, dim: Dimension, value: f64) {
        let slot = match dim {
            Dimension::Novelty => &mut self.novelty,
            Dimension::BuildsOnOthers => &mut self.builds_on_others,
            Dimension::SolvesSubproblem => &mut self.solves_subproblem,
            Dimension::RadicalIdea => &mut self.radical_idea,
            Dimension::Manipulation => &mut self.manipulation,
        };
        *slot = value;
    }
}

/// How juror scores are collapsed into one value per dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMethod {
    Median,
    Mean,
    /// Mean after dropping the single lowest and highest value.
    TrimmedMean,
}

impl Default for AggregationMethod {
    fn default() -> Self {
        Self::Median
    }
}

impl AggregationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Median => "median",
            Self::Mean => "mean",
            Self::TrimmedMean => "trimmed_mean",
        }
    }
}

/// What one juror returned, kept verbatim in the scorecard even when some of
/// its dimensions were excluded from the aggregate as outliers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JurorReturn {
    /// Juror index within the ensemble.
    pub juror: usize,
    /// Stochastic-diversity setting the juror ran with.
    pub temperature: f64,
    pub scores: DimensionScores,
    /// Dimensions where this juror was flagged as an IQR outlier.
    #[serde(default)]
    pub outlier_dimensions: Vec<Dimension>,
}

/// What the judges handed down for one turn. One scorecard per scored turn
/// per participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    pub participant: ParticipantId,
    pub turn: u32,
    /// Every juror that returned within budget, raw scores intact.
    pub jurors: Vec<JurorReturn>,
    /// Per-dimension aggregate after outlier exclusion.
    pub aggregated: DimensionScores,
    /// Weighted composite on the configured scale.
    pub composite: f64,
    pub method: AggregationMethod,
}

/// What judges are asked to evaluate against. Weights live in configuration;
/// the rubric is the prompt-side contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rubric {
    pub topic: String,
    /// Free-text guidance forwarded verbatim to the judge backend.
    pub guidance: String,
}

impl Rubric {
    pub fn for_topic(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            guidance: "Score novelty, synthesis with prior turns, sub-problem progress, \
                       radical framing, and manipulative rhetoric, each in [0, 1]."
                .to_string(),
        }
    }
}
