//! Port trait definitions (Hexagonal Architecture).
//!
//! Async trait interfaces the external collaborators must implement:
//! - `PersonaAdapter`: produce utterances, digest feedback, supply evidence
//! - `JudgeBackend`: raw dimension scoring of transcript fragments
//! - `SimilarityProvider` / `StallClassifier`: numeric/boolean text analysis
//! - `ReportSink`: consumes the frozen final report
//!
//! These contracts keep the orchestration core independent of any concrete
//! model, persona, or storage implementation.

pub mod analysis;
pub mod judge;
pub mod persona;
pub mod report;

pub use analysis::{SimilarityProvider, StallClassifier};
pub use judge::JudgeBackend;
pub use persona::{
    MatchEvent, MoodVector, PersonaAdapter, PersonaSnapshot, TurnContext, TurnKind,
};
pub use report::{NullReportSink, ReportSink};
