//! Port for the external persona/agent collaborator.
//!
//! The orchestrator only knows this contract: produce an utterance, accept
//! feedback, supply evidence, report a snapshot. How the persona decides
//! what to say is out of scope; concrete implementations are swappable
//! without touching the orchestrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::errors::EngineResult;
use crate::domain::models::penalty::Penalty;
use crate::domain::models::phase::Phase;
use crate::domain::models::transcript::{EvidenceRef, Utterance, UtteranceDraft};

/// What kind of contribution the current turn calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnKind {
    /// One-time opening statement.
    Opening,
    /// Regular discussion contribution.
    Discussion,
    /// Last statement before the closing synthesis.
    FinalWords,
}

impl TurnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Opening => "opening",
            Self::Discussion => "discussion",
            Self::FinalWords => "final_words",
        }
    }
}

/// Everything a persona gets to see before speaking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnContext {
    pub topic: String,
    pub phase: Phase,
    pub turn: u32,
    pub kind: TurnKind,
    /// Recent utterances from any participant, oldest first.
    pub recent: Vec<Utterance>,
    /// Set when the anti-gaming detector requested an intervention (e.g. a
    /// forced topic shift after orbiting).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directive: Option<String>,
}

/// Feedback pushed to a persona after its turn was scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEvent {
    pub turn: u32,
    /// Composite score, absent when the turn went unscored.
    pub score: Option<f64>,
    pub penalties: Vec<Penalty>,
    pub phase: Phase,
    /// Whether this participant was eliminated this turn.
    pub eliminated: bool,
}

/// Bounded two-dimensional mood state. Owned by the persona adapter and
/// exposed only through [`PersonaSnapshot`]; the orchestrator treats it as
/// opaque diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MoodVector {
    pub valence: f64,
    pub arousal: f64,
}

impl MoodVector {
    pub fn new(valence: f64, arousal: f64) -> Self {
        Self {
            valence: valence.clamp(-1.0, 1.0),
            arousal: arousal.clamp(-1.0, 1.0),
        }
    }

    /// Shift both dimensions, clamping back into `[-1, 1]`.
    pub fn shift(&self, dv: f64, da: f64) -> Self {
        Self::new(self.valence + dv, self.arousal + da)
    }
}

/// Opaque state snapshot returned by `state()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaSnapshot {
    pub name: String,
    pub mood: MoodVector,
    /// Adapter-defined extras; never inspected by the engine.
    #[serde(default)]
    pub detail: serde_json::Value,
}

/// The persona/agent adapter contract.
#[async_trait]
pub trait PersonaAdapter: Send + Sync {
    /// Produce this turn's contribution. Called through the budget enforcer.
    async fn speak(&self, ctx: &TurnContext) -> EngineResult<UtteranceDraft>;

    /// Digest the outcome of a scored turn.
    async fn reflect(&self, event: &MatchEvent) -> EngineResult<()>;

    /// Fetch supporting evidence for a query from the retrieval backend.
    async fn retrieve(&self, query: &str, tags: &[String]) -> EngineResult<Vec<EvidenceRef>>;

    /// Report the current opaque snapshot.
    async fn state(&self) -> PersonaSnapshot;
}
