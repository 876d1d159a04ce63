//! Scripted persona adapter.
//!
//! Cycles through a fixed list of lines, which makes orchestrator runs fully
//! reproducible. Mood is a bounded two-dimensional vector nudged by scoring
//! feedback and exposed only through the snapshot.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::domain::errors::EngineResult;
use crate::domain::models::transcript::{Claim, EvidenceRef, UtteranceDraft};
use crate::domain::ports::{
    MatchEvent, MoodVector, PersonaAdapter, PersonaSnapshot, TurnContext,
};

/// One scripted contribution.
#[derive(Debug, Clone)]
pub struct ScriptedLine {
    pub text: String,
    pub claims: Vec<Claim>,
}

impl ScriptedLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            claims: Vec::new(),
        }
    }

    pub fn with_claim(mut self, claim: Claim) -> Self {
        self.claims.push(claim);
        self
    }
}

struct Inner {
    cursor: usize,
    mood: MoodVector,
    last_event: Option<u32>,
}

/// Persona that replays a script.
pub struct ScriptedPersona {
    name: String,
    lines: Vec<ScriptedLine>,
    /// Artificial latency per `speak`, for exercising time budgets.
    delay: Option<Duration>,
    inner: Mutex<Inner>,
}

impl ScriptedPersona {
    pub fn new(name: impl Into<String>, lines: Vec<ScriptedLine>) -> Self {
        Self {
            name: name.into(),
            lines,
            delay: None,
            inner: Mutex::new(Inner {
                cursor: 0,
                mood: MoodVector::default(),
                last_event: None,
            }),
        }
    }

    /// Convenience constructor from plain strings.
    pub fn from_texts(name: impl Into<String>, texts: &[&str]) -> Self {
        Self::new(
            name,
            texts.iter().map(|t| ScriptedLine::new(*t)).collect(),
        )
    }

    /// Sleep this long before answering each `speak` call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl PersonaAdapter for ScriptedPersona {
    async fn speak(&self, ctx: &TurnContext) -> EngineResult<UtteranceDraft> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let line = {
            let mut inner = self.inner.lock().expect("persona lock");
            let line = self.lines[inner.cursor % self.lines.len()].clone();
            inner.cursor += 1;
            line
        };
        let mut draft = UtteranceDraft::new(line.text);
        draft.claims = line.claims;
        // A directive overrides the script's drift without changing claims.
        if let Some(directive) = &ctx.directive {
            draft.text = format!("{} (noting: {directive})", draft.text);
        }
        Ok(draft)
    }

    async fn reflect(&self, event: &MatchEvent) -> EngineResult<()> {
        let mut inner = self.inner.lock().expect("persona lock");
        inner.last_event = Some(event.turn);
        // Good scores lift valence; penalties push arousal up.
        let dv = event.score.map_or(-0.05, |s| (s / 10.0 - 0.5) * 0.2);
        let da = 0.1 * event.penalties.len() as f64;
        inner.mood = inner.mood.shift(dv, da);
        Ok(())
    }

    async fn retrieve(&self, query: &str, tags: &[String]) -> EngineResult<Vec<EvidenceRef>> {
        // Deterministic canned evidence keyed by the query.
        let mut evidence = vec![EvidenceRef::new(format!("scripted:{query}"))];
        for tag in tags {
            evidence.push(EvidenceRef::new(format!("scripted:{query}#{tag}")));
        }
        Ok(evidence)
    }

    async fn state(&self) -> PersonaSnapshot {
        let inner = self.inner.lock().expect("persona lock");
        PersonaSnapshot {
            name: self.name.clone(),
            mood: inner.mood,
            detail: json!({
                "script_len": self.lines.len(),
                "cursor": inner.cursor,
                "last_event_turn": inner.last_event,
            }),
        }
    }
}
