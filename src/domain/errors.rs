//! Domain errors for the competition engine.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the orchestration core.
///
/// The split between recoverable and fatal kinds drives the centralized
/// retry policy: anything tied to a single external call is retried once and
/// then degraded (zero score, unscored turn), while state-machine integrity
/// violations abort the competition with full diagnostic context.
#[derive(Debug, Error)]
pub enum EngineError {
    /// An external call did not return within its time budget. The call is
    /// cancelled and no partial output is used.
    #[error("operation '{label}' timed out after {limit_secs}s")]
    Timeout { label: String, limit_secs: u64 },

    /// Fewer jurors than the configured quorum returned a valid score.
    #[error("insufficient jurors: {returned} returned, quorum is {quorum}")]
    InsufficientJurors { returned: usize, quorum: usize },

    /// The phase state machine was asked to perform an illegal transition.
    /// Indicates corrupted state and is never locally recovered.
    #[error("invalid phase transition {from} -> {to} at turn {turn}: {detail}")]
    InvalidTransition {
        from: String,
        to: String,
        turn: u32,
        detail: String,
    },

    /// External abort signal or competition deadline observed at the top of
    /// a turn loop.
    #[error("competition aborted at turn {turn}: {reason}")]
    AbortRequested { turn: u32, reason: String },

    /// The turn selector found no Active or AtRisk participant.
    #[error("no eligible participant at turn {turn}")]
    NoEligibleParticipants { turn: u32 },

    /// A participant id that is not registered in the competition.
    #[error("unknown participant: {0}")]
    UnknownParticipant(Uuid),

    /// Opaque failure reported by an external collaborator (persona, judge
    /// backend, similarity service).
    #[error("adapter '{label}' failed: {message}")]
    Adapter { label: String, message: String },

    /// Invalid configuration detected after loading.
    #[error("configuration error: {0}")]
    Config(String),

    /// Serialization failure while freezing or persisting a report.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EngineError {
    /// Construct an adapter failure.
    pub fn adapter(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Adapter {
            label: label.into(),
            message: message.into(),
        }
    }

    /// Whether the retry policy may re-attempt the failed call.
    ///
    /// Only faults tied to a single external call qualify. Integrity and
    /// abort errors are terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::InsufficientJurors { .. } | Self::Adapter { .. }
        )
    }

    /// Short machine-readable tag used in fault entries and audit records.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::InsufficientJurors { .. } => "insufficient_jurors",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::AbortRequested { .. } => "abort_requested",
            Self::NoEligibleParticipants { .. } => "no_eligible_participants",
            Self::UnknownParticipant(_) => "unknown_participant",
            Self::Adapter { .. } => "adapter",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
