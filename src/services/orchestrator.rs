//! The competition orchestrator.
//!
//! Top-level driver owning the root state. Each step it asks the phase
//! engine what kind of turn this is, asks the selector who speaks, runs the
//! persona through the budget enforcer, inspects and scores the result
//! concurrently, applies the outcome, and consults the phase engine for
//! transitions. Turn production is strictly sequential because every later
//! decision depends on the previous utterance's outcome; only the
//! within-turn work (jurors, anti-gaming) is concurrent.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::competition::CompetitionState;
use crate::domain::models::config::CompetitionConfig;
use crate::domain::models::participant::{ParticipantId, ParticipantStatus};
use crate::domain::models::penalty::{Penalty, PenaltyKind};
use crate::domain::models::phase::Phase;
use crate::domain::models::report::FinalReport;
use crate::domain::models::scorecard::{Rubric, Scorecard};
use crate::domain::models::transcript::{TranscriptFragment, Utterance};
use crate::domain::ports::{
    JudgeBackend, MatchEvent, PersonaAdapter, SimilarityProvider, StallClassifier, TurnContext,
    TurnKind,
};

use super::anti_gaming::{AntiGamingDetector, Inspection, Intervention};
use super::audit_log::{AuditCategory, AuditLog};
use super::budget_enforcer::BudgetEnforcer;
use super::judge_ensemble::{JudgeEnsemble, TieBreakInput, TieBreaker};
use super::phase_engine::{PhaseChange, PhaseEngine};
use super::retry::RetryPolicy;
use super::rng::SeededRng;
use super::turn_selector::TurnSelector;

pub struct CompetitionOrchestrator {
    state: CompetitionState,
    personas: HashMap<ParticipantId, Arc<dyn PersonaAdapter>>,
    detector: AntiGamingDetector,
    ensemble: JudgeEnsemble,
    selector: TurnSelector,
    engine: PhaseEngine,
    enforcer: Arc<BudgetEnforcer>,
    retry: RetryPolicy,
    audit: Arc<AuditLog>,
    rng: SeededRng,
    rubric: Rubric,
    tie_breaker: TieBreaker,
    abort_rx: Option<watch::Receiver<bool>>,
    /// Consecutive generic turns per participant, fed back to the detector.
    generic_streaks: HashMap<ParticipantId, u32>,
    /// Directive for the next speaker, set by an orbiting intervention.
    pending_directive: Option<String>,
}

impl CompetitionOrchestrator {
    pub fn new(
        topic: impl Into<String>,
        config: CompetitionConfig,
        judge_backend: Arc<dyn JudgeBackend>,
        similarity: Arc<dyn SimilarityProvider>,
        classifier: Arc<dyn StallClassifier>,
    ) -> Self {
        let topic = topic.into();
        let audit = Arc::new(AuditLog::default());
        let enforcer = Arc::new(BudgetEnforcer::new(Arc::clone(&audit)));
        let ensemble = JudgeEnsemble::new(
            judge_backend,
            Arc::clone(&enforcer),
            config.jury.clone(),
            config.rubric.clone(),
            config.budgets.judge,
        );
        let detector = AntiGamingDetector::new(config.detector.clone(), similarity, classifier);
        let selector = TurnSelector::new(config.selector.clone());
        let engine = PhaseEngine::new(config.elimination.clone(), config.max_turns);
        let retry = RetryPolicy::new(config.retry.clone());
        let rng = SeededRng::new(config.seed);
        let rubric = Rubric::for_topic(topic.clone());
        let state = CompetitionState::new(topic, config);

        Self {
            state,
            personas: HashMap::new(),
            detector,
            ensemble,
            selector,
            engine,
            enforcer,
            retry,
            audit,
            rng,
            rubric,
            tie_breaker: TieBreaker::default(),
            abort_rx: None,
            generic_streaks: HashMap::new(),
            pending_directive: None,
        }
    }

    /// Register a participant and its persona adapter. Only valid before the
    /// competition leaves `Initialization`.
    pub fn add_participant(
        &mut self,
        display_name: impl Into<String>,
        persona: Arc<dyn PersonaAdapter>,
    ) -> EngineResult<ParticipantId> {
        let display_name = display_name.into();
        let persona_ref = format!("persona:{display_name}");
        let id = self.state.register(display_name, persona_ref)?;
        self.personas.insert(id, persona);
        Ok(id)
    }

    /// Attach an external abort signal, checked at the top of every turn.
    pub fn with_abort(mut self, abort_rx: watch::Receiver<bool>) -> Self {
        self.abort_rx = Some(abort_rx);
        self
    }

    pub fn state(&self) -> &CompetitionState {
        &self.state
    }

    pub fn audit(&self) -> Arc<AuditLog> {
        Arc::clone(&self.audit)
    }

    /// Drive the competition to a terminal phase and freeze the report.
    ///
    /// The run always terminates with a report: non-fatal faults degrade
    /// into fault entries, the abort signal and deadline end it gracefully,
    /// and a hard step bound backstops the phase machine so there is no
    /// infinite discussion loop even under misconfiguration.
    #[instrument(skip(self), fields(competition = %self.state.id))]
    pub async fn run(&mut self) -> EngineResult<FinalReport> {
        let deadline = self
            .state
            .config
            .max_duration_secs
            .map(|s| tokio::time::Instant::now() + Duration::from_secs(s));
        let participants = u32::try_from(self.state.participants.len()).unwrap_or(u32::MAX);
        // Every participant speaks once in opening and final words, plus one
        // orchestrator step per transition.
        let step_bound = self.state.config.max_turns + 2 * participants + 8;

        let mut steps: u32 = 0;
        while !self.state.phase.is_terminal() {
            steps += 1;
            if steps > step_bound {
                self.abort("orchestrator step bound exceeded").await?;
                break;
            }
            if self.abort_requested() {
                self.abort("external abort signal").await?;
                break;
            }
            if let Some(deadline) = deadline {
                if tokio::time::Instant::now() >= deadline {
                    self.abort("competition deadline reached").await?;
                    break;
                }
            }

            if let Some(change) = self.engine.evaluate(&self.state)? {
                self.apply_change(change).await?;
                continue;
            }

            let Some(kind) = self.engine.turn_kind(&self.state) else {
                // Neither a turn nor a transition: the machine is stuck.
                return Err(EngineError::InvalidTransition {
                    from: self.state.phase.as_str().to_string(),
                    to: self.state.phase.as_str().to_string(),
                    turn: self.state.turn,
                    detail: "no turn kind and no transition available".to_string(),
                });
            };
            self.take_turn(kind).await?;
        }

        // Final persona snapshots go to the audit trail; the engine treats
        // their contents as opaque.
        for p in &self.state.participants {
            if let Some(persona) = self.personas.get(&p.id) {
                let snapshot = persona.state().await;
                self.audit
                    .record(
                        self.state.turn,
                        AuditCategory::Invocation,
                        format!("state:{}", p.display_name),
                        serde_json::to_string(&snapshot).unwrap_or_default(),
                    )
                    .await;
            }
        }

        info!(
            phase = self.state.phase.as_str(),
            turns = self.state.turn,
            faults = self.state.faults.len(),
            "competition finished"
        );
        Ok(FinalReport::freeze(self.state.clone()))
    }

    fn abort_requested(&self) -> bool {
        self.abort_rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    async fn abort(&mut self, reason: &str) -> EngineResult<()> {
        warn!(reason, turn = self.state.turn, "aborting competition");
        let err = EngineError::AbortRequested {
            turn: self.state.turn,
            reason: reason.to_string(),
        };
        self.state.record_fault(self.state.turn, &err, "abort");
        self.state
            .transcript
            .push_system(self.state.turn, format!("competition aborted: {reason}"));
        self.state.advance_phase(Phase::Aborted)?;
        self.audit
            .record(self.state.turn, AuditCategory::Transition, "abort", reason)
            .await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase transitions
    // ------------------------------------------------------------------

    async fn apply_change(&mut self, change: PhaseChange) -> EngineResult<()> {
        let from = self.state.phase;
        info!(
            from = from.as_str(),
            to = change.to.as_str(),
            reason = %change.reason,
            "phase transition"
        );

        if change.to == Phase::ClosingSynthesis {
            self.append_synthesis();
        }
        self.state.advance_phase(change.to)?;
        self.state.transcript.push_system(
            self.state.turn,
            format!("phase: {} -> {} ({})", from.as_str(), change.to.as_str(), change.reason),
        );
        self.audit
            .record(
                self.state.turn,
                AuditCategory::Transition,
                format!("{}->{}", from.as_str(), change.to.as_str()),
                change.reason.clone(),
            )
            .await;

        if change.to == Phase::Elimination {
            let cuts = change.trigger.is_some_and(|t| t.cuts());
            if cuts && self.state.eligible_count() > 1 {
                self.apply_elimination().await?;
            }
        }
        Ok(())
    }

    /// Cut the worst-ranked eligible participant, using the tie-break
    /// protocol when scores are equal within epsilon.
    async fn apply_elimination(&mut self) -> EngineResult<()> {
        let inputs: Vec<TieBreakInput> = self
            .state
            .eligible()
            .iter()
            .map(|p| self.tie_break_input(p.id))
            .collect();

        let mut worst = inputs[0].clone();
        for candidate in &inputs[1..] {
            let (ordering, draw) = self.tie_breaker.compare(&worst, candidate, &mut self.rng);
            if let Some(draw) = draw {
                self.audit
                    .record(
                        self.state.turn,
                        AuditCategory::TieBreak,
                        "elimination",
                        format!("{} vs {}: draw {:.6}", draw.a, draw.b, draw.value),
                    )
                    .await;
            }
            // `compare` orders best-first; keep whichever ranks behind.
            if ordering == std::cmp::Ordering::Less {
                worst = candidate.clone();
            }
        }

        let victim = worst.participant;
        let name = self.state.participant(victim)?.display_name.clone();
        self.state.participant_mut(victim)?.eliminate();
        self.state.transcript.push_system(
            self.state.turn,
            format!("{name} eliminated with score {:.2}", worst.composite),
        );
        self.audit
            .record(
                self.state.turn,
                AuditCategory::Elimination,
                name.clone(),
                format!("score {:.2}", worst.composite),
            )
            .await;

        // The eliminated persona hears about it once, outside scoring.
        let event = MatchEvent {
            turn: self.state.turn,
            score: None,
            penalties: Vec::new(),
            phase: self.state.phase,
            eliminated: true,
        };
        if let Some(persona) = self.personas.get(&victim) {
            if let Err(err) = persona.reflect(&event).await {
                self.state.record_fault(self.state.turn, &err, format!("reflect:{name}"));
            }
        }

        self.refresh_at_risk();
        Ok(())
    }

    fn tie_break_input(&self, id: ParticipantId) -> TieBreakInput {
        let composite = self.state.cumulative_score(id);

        let (mut factual, mut supported) = (0u32, 0u32);
        for utterance in self.state.transcript.utterances().filter(|u| u.participant == id) {
            for claim in &utterance.claims {
                if claim.kind == crate::domain::models::transcript::ClaimKind::Factual {
                    factual += 1;
                    if !claim.evidence.is_empty() {
                        supported += 1;
                    }
                }
            }
        }
        let evidence_consistency = if factual == 0 {
            1.0
        } else {
            f64::from(supported) / f64::from(factual)
        };

        let scores: Vec<f64> = self
            .state
            .participant(id)
            .map(|p| p.turn_scores.iter().map(|s| s.score).collect())
            .unwrap_or_default();
        let steadiness = if scores.len() < 2 {
            0.0
        } else {
            let mean = scores.iter().sum::<f64>() / scores.len() as f64;
            let var =
                scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;
            1.0 / (1.0 + var.sqrt())
        };

        TieBreakInput {
            participant: id,
            composite,
            evidence_consistency,
            steadiness,
        }
    }

    /// Flag the lowest-cumulative eligible participant as AtRisk and restore
    /// everyone else to Active.
    fn refresh_at_risk(&mut self) {
        let lowest = self.state.lowest_eligible();
        // Only meaningful once there is scoring history to be lowest in.
        let has_history = self.state.scorecards.len() > 1;
        for p in &mut self.state.participants {
            if p.status == ParticipantStatus::Eliminated {
                continue;
            }
            p.status = if Some(p.id) == lowest && has_history {
                ParticipantStatus::AtRisk
            } else {
                ParticipantStatus::Active
            };
        }
    }

    fn append_synthesis(&mut self) {
        let standings = self.state.standings();
        let summary = standings
            .iter()
            .map(|s| format!("{} {:.2} ({})", s.display_name, s.score, s.status.as_str()))
            .collect::<Vec<_>>()
            .join("; ");
        let leader = standings
            .first()
            .map(|s| s.display_name.clone())
            .unwrap_or_default();
        self.state.transcript.push_system(
            self.state.turn,
            format!("closing synthesis: {leader} leads. Standings: {summary}"),
        );
    }

    // ------------------------------------------------------------------
    // One speaking turn
    // ------------------------------------------------------------------

    async fn take_turn(&mut self, kind: TurnKind) -> EngineResult<()> {
        let turn = self.state.turn;
        let speaker = self.selector.select_next(&self.state, &mut self.rng)?;
        let name = self.state.participant(speaker)?.display_name.clone();
        let label = format!("speak:{name}");
        let persona = self
            .personas
            .get(&speaker)
            .cloned()
            .ok_or(EngineError::UnknownParticipant(speaker.as_uuid()))?;

        let ctx = TurnContext {
            topic: self.state.topic.clone(),
            phase: self.state.phase,
            turn,
            kind,
            recent: self.state.transcript.recent_window(self.state.config.detector.window),
            directive: self.pending_directive.take(),
        };

        let speak_budget = self.state.config.budgets.speak;
        let enforcer = Arc::clone(&self.enforcer);
        let spoken = self
            .retry
            .run(&label, || {
                let persona = Arc::clone(&persona);
                let ctx = ctx.clone();
                let enforcer = Arc::clone(&enforcer);
                let label = label.clone();
                async move {
                    enforcer
                        .execute(turn, &label, speak_budget, async { persona.speak(&ctx).await })
                        .await
                }
            })
            .await;

        let outcome = match spoken {
            Ok(outcome) => outcome,
            Err(err) => {
                // Retry already happened; degrade to a skipped, zero-score
                // turn with a logged fault.
                warn!(participant = %name, error = %err, "speak failed, skipping turn");
                self.state.record_fault(turn, &err, label.clone());
                self.audit
                    .record(turn, AuditCategory::Fault, label.clone(), err.to_string())
                    .await;
                self.state
                    .transcript
                    .push_system(turn, format!("{name} skipped turn {turn}: {}", err.kind()));
                let participant = self.state.participant_mut(speaker)?;
                participant.mark_spoke(turn);
                participant.record_score(turn, 0.0);
                self.state.turn += 1;
                return Ok(());
            }
        };

        let utterance =
            Utterance::from_draft(outcome.output, speaker, turn, outcome.elapsed_ms);
        let window = self
            .state
            .transcript
            .recent_window(self.state.config.detector.window);
        let streak = self.generic_streaks.get(&speaker).copied().unwrap_or(0);

        // Anti-gaming and judging consume disjoint inputs; run them
        // concurrently and join before applying anything.
        let fragment = TranscriptFragment {
            utterance: utterance.clone(),
            context: window.clone(),
        };
        let (inspection, scorecard) = tokio::join!(
            self.detector.inspect(&utterance, &window, streak),
            self.score_with_retry(turn, speaker, &fragment),
        );

        let inspection = match inspection {
            Ok(inspection) => inspection,
            Err(err) => {
                self.state.record_fault(turn, &err, "anti_gaming");
                Inspection {
                    penalties: Vec::new(),
                    intervention: None,
                    is_generic: false,
                }
            }
        };

        self.apply_turn_outcome(turn, speaker, utterance, outcome.truncated, inspection, scorecard)
            .await?;
        Ok(())
    }

    async fn score_with_retry(
        &self,
        turn: u32,
        speaker: ParticipantId,
        fragment: &TranscriptFragment,
    ) -> EngineResult<Scorecard> {
        if self.state.config.jury.retry_once {
            self.retry
                .run("ensemble", || async {
                    self.ensemble.score(turn, speaker, fragment, &self.rubric).await
                })
                .await
        } else {
            self.ensemble.score(turn, speaker, fragment, &self.rubric).await
        }
    }

    /// Apply everything a finished turn produced. This is the single point
    /// where participant and transcript state changes.
    async fn apply_turn_outcome(
        &mut self,
        turn: u32,
        speaker: ParticipantId,
        utterance: Utterance,
        truncated: bool,
        inspection: Inspection,
        scorecard: EngineResult<Scorecard>,
    ) -> EngineResult<()> {
        let name = self.state.participant(speaker)?.display_name.clone();

        self.state.transcript.push_utterance(utterance);
        self.state.participant_mut(speaker)?.mark_spoke(turn);

        let mut turn_penalties = inspection.penalties;
        if truncated {
            turn_penalties.push(Penalty::new(
                PenaltyKind::BudgetExceeded,
                self.state.config.budgets.overrun_penalty,
                speaker,
                turn,
                "utterance truncated at token budget",
            ));
        }
        for penalty in &turn_penalties {
            self.audit
                .record(
                    turn,
                    AuditCategory::Penalty,
                    format!("{}:{name}", penalty.kind.as_str()),
                    penalty.justification.clone(),
                )
                .await;
        }
        self.state.penalties.extend(turn_penalties.iter().cloned());

        let streak = if inspection.is_generic {
            self.generic_streaks.get(&speaker).copied().unwrap_or(0) + 1
        } else {
            0
        };
        self.generic_streaks.insert(speaker, streak);

        if let Some(Intervention::TopicShift) = inspection.intervention {
            self.pending_directive = Some(
                "the discussion is circling; take it to an aspect nobody has touched yet"
                    .to_string(),
            );
        }

        let score = match scorecard {
            Ok(card) => {
                let composite = card.composite;
                self.state.scorecards.push(card);
                self.state.participant_mut(speaker)?.record_score(turn, composite);
                Some(composite)
            }
            Err(err) => {
                // Unscored turn: flagged for manual review via the fault log.
                warn!(participant = %name, error = %err, "turn left unscored");
                self.state.record_fault(turn, &err, format!("ensemble:{name}"));
                self.audit
                    .record(turn, AuditCategory::Fault, format!("ensemble:{name}"), err.to_string())
                    .await;
                None
            }
        };

        self.refresh_at_risk();

        let event = MatchEvent {
            turn,
            score,
            penalties: turn_penalties,
            phase: self.state.phase,
            eliminated: false,
        };
        if let Some(persona) = self.personas.get(&speaker) {
            if let Err(err) = persona.reflect(&event).await {
                self.state.record_fault(turn, &err, format!("reflect:{name}"));
            }
        }

        self.state.turn += 1;
        Ok(())
    }
}
