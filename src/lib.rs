//! Agon - Competition Orchestration Engine
//!
//! Agon drives a multi-participant, turn-based contest to completion:
//! selecting who acts next, enforcing per-turn resource budgets, collecting
//! independent judge evaluations, aggregating them with outlier rejection,
//! and detecting participants that try to game the scoring.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Pure models, errors, and port contracts
//! - **Service Layer** (`services`): The orchestration core — budget
//!   enforcement, anti-gaming detection, judge ensemble, turn selection,
//!   phase state machine, orchestrator
//! - **Infrastructure Layer** (`infrastructure`): Configuration loading and
//!   logging setup
//! - **Adapters** (`adapters`): Deterministic local implementations of the
//!   ports (scripted personas, heuristic judge, JSON report sink)
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use agon::services::CompetitionOrchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Build an orchestrator, register personas, run to a report.
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{EngineError, EngineResult};
pub use domain::models::{
    CompetitionConfig, CompetitionState, Dimension, FinalReport, Participant, ParticipantId,
    ParticipantStatus, Penalty, PenaltyKind, Phase, Scorecard, Transcript, Utterance,
};
pub use domain::ports::{
    JudgeBackend, PersonaAdapter, ReportSink, SimilarityProvider, StallClassifier,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    AntiGamingDetector, BudgetEnforcer, CompetitionOrchestrator, JudgeEnsemble, PhaseEngine,
    RetryPolicy, SeededRng, TurnSelector,
};
