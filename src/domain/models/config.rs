//! Competition configuration.
//!
//! Everything the engine consumes at start: per-operation budgets, rubric
//! weights, elimination thresholds, juror count and temperatures, anti-gaming
//! thresholds and penalties, selector weights, turn ceiling, and the random
//! seed. All sections carry serde defaults so a partial YAML file or a bare
//! `CompetitionConfig::default()` is a valid, runnable configuration.

use serde::{Deserialize, Serialize};

use super::scorecard::{AggregationMethod, Dimension};

/// Token/time ceiling applied to one external call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BudgetLimits {
    /// Maximum whitespace tokens in the output before truncation.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Wall-clock ceiling; overruns cancel the call.
    #[serde(default = "default_max_seconds")]
    pub max_seconds: u64,
}

const fn default_max_tokens() -> u32 {
    400
}

const fn default_max_seconds() -> u64 {
    30
}

impl Default for BudgetLimits {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            max_seconds: default_max_seconds(),
        }
    }
}

/// Budgets per operation kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BudgetsConfig {
    /// Applied to persona `speak` calls.
    #[serde(default)]
    pub speak: BudgetLimits,
    /// Applied to each individual juror call.
    #[serde(default)]
    pub judge: BudgetLimits,
    /// Deduction applied when an utterance had to be truncated.
    #[serde(default = "default_overrun_penalty")]
    pub overrun_penalty: f64,
}

const fn default_overrun_penalty() -> f64 {
    -0.5
}

impl Default for BudgetsConfig {
    fn default() -> Self {
        Self {
            speak: BudgetLimits::default(),
            judge: BudgetLimits::default(),
            overrun_penalty: default_overrun_penalty(),
        }
    }
}

/// Retry policy configuration, applied uniformly to retryable faults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Total attempts including the first (2 = retry once, then degrade).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Initial backoff delay in milliseconds.
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Ceiling for the exponential backoff delay.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_attempts() -> u32 {
    2
}

const fn default_initial_backoff_ms() -> u64 {
    200
}

const fn default_max_backoff_ms() -> u64 {
    5_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Judge ensemble configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JuryConfig {
    /// Number of independent jurors per scored turn.
    #[serde(default = "default_jurors")]
    pub jurors: usize,
    /// Stochastic-diversity settings, one per juror. Cycled if shorter than
    /// `jurors`.
    #[serde(default = "default_temperatures")]
    pub temperatures: Vec<f64>,
    /// Minimum successful juror returns for a valid scorecard. `None` means
    /// majority of `jurors`.
    #[serde(default)]
    pub quorum: Option<usize>,
    /// Per-dimension aggregation method.
    #[serde(default)]
    pub method: AggregationMethod,
    /// Retry a failed ensemble once before marking the turn unscored.
    #[serde(default = "default_true")]
    pub retry_once: bool,
}

const fn default_jurors() -> usize {
    3
}

fn default_temperatures() -> Vec<f64> {
    vec![0.2, 0.7, 1.0]
}

const fn default_true() -> bool {
    true
}

impl Default for JuryConfig {
    fn default() -> Self {
        Self {
            jurors: default_jurors(),
            temperatures: default_temperatures(),
            quorum: None,
            method: AggregationMethod::default(),
            retry_once: default_true(),
        }
    }
}

impl JuryConfig {
    /// Effective quorum: configured value, or a strict majority of jurors.
    pub fn effective_quorum(&self) -> usize {
        self.quorum.unwrap_or(self.jurors / 2 + 1)
    }

    /// Temperature for juror `index`, cycling the configured list.
    pub fn temperature_for(&self, index: usize) -> f64 {
        if self.temperatures.is_empty() {
            0.7
        } else {
            self.temperatures[index % self.temperatures.len()]
        }
    }
}

/// Rubric weights for the composite score. The manipulation weight is
/// applied as a deduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RubricWeights {
    #[serde(default = "default_novelty_weight")]
    pub novelty: f64,
    #[serde(default = "default_builds_weight")]
    pub builds_on_others: f64,
    #[serde(default = "default_solves_weight")]
    pub solves_subproblem: f64,
    #[serde(default = "default_radical_weight")]
    pub radical_idea: f64,
    #[serde(default = "default_manipulation_weight")]
    pub manipulation: f64,
    /// Upper bound of the composite range (scores land in `[0, scale]`).
    #[serde(default = "default_scale")]
    pub scale: f64,
}

const fn default_novelty_weight() -> f64 {
    0.25
}

const fn default_builds_weight() -> f64 {
    0.20
}

const fn default_solves_weight() -> f64 {
    0.25
}

const fn default_radical_weight() -> f64 {
    0.15
}

const fn default_manipulation_weight() -> f64 {
    0.15
}

const fn default_scale() -> f64 {
    10.0
}

impl Default for RubricWeights {
    fn default() -> Self {
        Self {
            novelty: default_novelty_weight(),
            builds_on_others: default_builds_weight(),
            solves_subproblem: default_solves_weight(),
            radical_idea: default_radical_weight(),
            manipulation: default_manipulation_weight(),
            scale: default_scale(),
        }
    }
}

impl RubricWeights {
    pub fn weight(&self, dim: Dimension) -> f64 {
        match dim {
            Dimension::Novelty => self.novelty,
            Dimension::BuildsOnOthers => self.builds_on_others,
            Dimension::SolvesSubproblem => self.solves_subproblem,
            Dimension::RadicalIdea => self.radical_idea,
            Dimension::Manipulation => self.manipulation,
        }
    }

    /// Sum of the non-deduction weights; the composite normalizer.
    pub fn positive_weight_sum(&self) -> f64 {
        Dimension::ALL
            .iter()
            .filter(|d| !d.is_deduction())
            .map(|d| self.weight(*d))
            .sum()
    }
}

/// One thresholded anti-gaming check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CheckConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Similarity (or ratio) at or above which the check fires.
    pub threshold: f64,
    /// Signed score delta applied when the check fires (negative).
    pub penalty: f64,
}

/// Repetition check: n-gram overlap against the participant's own history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RepetitionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// N-gram size for overlap measurement.
    #[serde(default = "default_ngram")]
    pub ngram: usize,
    /// How many of the participant's own prior utterances to compare against.
    #[serde(default = "default_own_history")]
    pub own_history: usize,
    /// Overlap ratio at or above which the check fires.
    #[serde(default = "default_repetition_threshold")]
    pub threshold: f64,
    #[serde(default = "default_repetition_penalty")]
    pub penalty: f64,
}

const fn default_ngram() -> usize {
    3
}

const fn default_own_history() -> usize {
    3
}

const fn default_repetition_threshold() -> f64 {
    0.5
}

const fn default_repetition_penalty() -> f64 {
    -0.5
}

impl Default for RepetitionConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            ngram: default_ngram(),
            own_history: default_own_history(),
            threshold: default_repetition_threshold(),
            penalty: default_repetition_penalty(),
        }
    }
}

/// Stall check: consecutive generic turns per participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StallConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Generic turns in a row tolerated before the penalty fires.
    #[serde(default = "default_max_consecutive_generic")]
    pub max_consecutive_generic_turns: u32,
    #[serde(default = "default_stall_penalty")]
    pub penalty: f64,
}

const fn default_max_consecutive_generic() -> u32 {
    2
}

const fn default_stall_penalty() -> f64 {
    -0.4
}

impl Default for StallConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_consecutive_generic_turns: default_max_consecutive_generic(),
            penalty: default_stall_penalty(),
        }
    }
}

/// Orbiting check: similarity plateau over the recent window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OrbitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Window size measured in utterances, any author.
    #[serde(default = "default_orbit_window")]
    pub window: usize,
    /// Mean pairwise similarity at or above which orbiting is declared.
    #[serde(default = "default_orbit_threshold")]
    pub threshold: f64,
    #[serde(default = "default_orbit_penalty")]
    pub penalty: f64,
}

const fn default_orbit_window() -> usize {
    4
}

const fn default_orbit_threshold() -> f64 {
    0.8
}

const fn default_orbit_penalty() -> f64 {
    -0.3
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            window: default_orbit_window(),
            threshold: default_orbit_threshold(),
            penalty: default_orbit_penalty(),
        }
    }
}

/// Unsupported-claim check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClaimConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Deduction per unsupported factual claim.
    #[serde(default = "default_claim_penalty")]
    pub penalty_per_claim: f64,
}

const fn default_claim_penalty() -> f64 {
    -0.25
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            penalty_per_claim: default_claim_penalty(),
        }
    }
}

/// Anti-gaming detector configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DetectorConfig {
    /// Utterances (any author) handed to the detector as recent history.
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_paraphrase_check")]
    pub paraphrase: CheckConfig,
    #[serde(default)]
    pub repetition: RepetitionConfig,
    #[serde(default)]
    pub stall: StallConfig,
    #[serde(default)]
    pub orbiting: OrbitConfig,
    #[serde(default)]
    pub unsupported_claim: ClaimConfig,
}

const fn default_window() -> usize {
    5
}

fn default_paraphrase_check() -> CheckConfig {
    CheckConfig {
        enabled: true,
        threshold: 0.9,
        penalty: -0.6,
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            paraphrase: default_paraphrase_check(),
            repetition: RepetitionConfig::default(),
            stall: StallConfig::default(),
            orbiting: OrbitConfig::default(),
            unsupported_claim: ClaimConfig::default(),
        }
    }
}

/// Turn selector urgency weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SelectorConfig {
    /// Weight on turns-since-last-spoke.
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,
    /// Weight penalizing participants above the mean turn count.
    #[serde(default = "default_fairness_weight")]
    pub fairness_weight: f64,
    /// Weight favoring lower cumulative scores.
    #[serde(default = "default_strategic_weight")]
    pub strategic_weight: f64,
    /// Amplitude of seeded jitter added to urgency.
    #[serde(default = "default_jitter")]
    pub jitter: f64,
    /// Hard fairness bound: a gap beyond this forces selection.
    #[serde(default = "default_max_turn_gap")]
    pub max_turn_gap: u32,
}

const fn default_recency_weight() -> f64 {
    1.0
}

const fn default_fairness_weight() -> f64 {
    0.5
}

const fn default_strategic_weight() -> f64 {
    0.75
}

const fn default_jitter() -> f64 {
    0.05
}

const fn default_max_turn_gap() -> u32 {
    6
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            recency_weight: default_recency_weight(),
            fairness_weight: default_fairness_weight(),
            strategic_weight: default_strategic_weight(),
            jitter: default_jitter(),
            max_turn_gap: default_max_turn_gap(),
        }
    }
}

/// When and how participants are cut.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EliminationConfig {
    /// Discussion turns between elimination rounds.
    #[serde(default = "default_elimination_interval")]
    pub interval: u32,
    /// Optional floor: a cumulative score below this triggers elimination
    /// regardless of the interval.
    #[serde(default)]
    pub score_floor: Option<f64>,
    /// Competition continues while this many participants remain active.
    #[serde(default = "default_min_active")]
    pub min_active: usize,
}

const fn default_elimination_interval() -> u32 {
    6
}

const fn default_min_active() -> usize {
    2
}

impl Default for EliminationConfig {
    fn default() -> Self {
        Self {
            interval: default_elimination_interval(),
            score_floor: None,
            min_active: default_min_active(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format: json or pretty.
    #[serde(default = "default_log_format")]
    pub format: String,
    /// Optional directory for rolling file output.
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
        }
    }
}

/// Root configuration for one competition run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CompetitionConfig {
    /// Seed for the single random stream threaded through the run.
    #[serde(default)]
    pub seed: u64,
    /// Hard ceiling on orchestrator turns.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// Optional overall wall-clock deadline in seconds.
    #[serde(default)]
    pub max_duration_secs: Option<u64>,
    #[serde(default)]
    pub budgets: BudgetsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub jury: JuryConfig,
    #[serde(default)]
    pub rubric: RubricWeights,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub selector: SelectorConfig,
    #[serde(default)]
    pub elimination: EliminationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

const fn default_max_turns() -> u32 {
    40
}

impl Default for CompetitionConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            max_turns: default_max_turns(),
            max_duration_secs: None,
            budgets: BudgetsConfig::default(),
            retry: RetryConfig::default(),
            jury: JuryConfig::default(),
            rubric: RubricWeights::default(),
            detector: DetectorConfig::default(),
            selector: SelectorConfig::default(),
            elimination: EliminationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
