//! Utterances, claims, and the append-only transcript.
//!
//! The transcript is the single source of history for the competition. The
//! orchestrator is its only writer; every other component receives slices or
//! snapshots.

use serde::{Deserialize, Serialize};

use super::participant::ParticipantId;

/// Opaque reference to a piece of supporting evidence supplied by the
/// external retrieval collaborator. The engine never dereferences it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRef {
    /// Identifier understood by the retrieval backend.
    pub source: String,
    /// Optional locator within the source (page, span, node id).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
}

impl EvidenceRef {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            locator: None,
        }
    }
}

/// Classification of a claim made inside an utterance. Extraction is done by
/// an external collaborator; the engine only consumes the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimKind {
    /// A checkable statement of fact. Requires attached evidence.
    Factual,
    /// A reading or framing of prior discussion.
    Interpretation,
    /// A suggested course of action.
    Proposal,
}

/// A single claim with its attached evidence references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub text: String,
    pub kind: ClaimKind,
    #[serde(default)]
    pub evidence: Vec<EvidenceRef>,
}

impl Claim {
    pub fn factual(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind: ClaimKind::Factual,
            evidence: Vec::new(),
        }
    }

    pub fn with_evidence(mut self, evidence: EvidenceRef) -> Self {
        self.evidence.push(evidence);
        self
    }

    /// A factual claim with no evidence attached draws an
    /// `UnsupportedClaim` penalty.
    pub fn is_unsupported(&self) -> bool {
        self.kind == ClaimKind::Factual && self.evidence.is_empty()
    }
}

/// What a persona returns from `speak` before the orchestrator stamps turn
/// metadata onto it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtteranceDraft {
    pub text: String,
    #[serde(default)]
    pub claims: Vec<Claim>,
}

impl UtteranceDraft {
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

/// One participant's single-turn contribution. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub participant: ParticipantId,
    pub turn: u32,
    pub text: String,
    /// Whitespace-token count of `text`, after any budget truncation.
    pub token_count: u32,
    /// Wall-clock duration of the producing call, for audit only. Excluded
    /// from the canonical report fingerprint.
    pub duration_ms: u64,
    #[serde(default)]
    pub claims: Vec<Claim>,
}

impl Utterance {
    /// Stamp a draft with turn metadata.
    pub fn from_draft(
        draft: UtteranceDraft,
        participant: ParticipantId,
        turn: u32,
        duration_ms: u64,
    ) -> Self {
        let token_count = count_tokens(&draft.text);
        Self {
            participant,
            turn,
            text: draft.text,
            token_count,
            duration_ms,
            claims: draft.claims,
        }
    }

    /// Claims that would draw an `UnsupportedClaim` penalty.
    pub fn unsupported_claims(&self) -> impl Iterator<Item = &Claim> {
        self.claims.iter().filter(|c| c.is_unsupported())
    }
}

/// Count whitespace-delimited tokens. This is the unit the budget enforcer
/// truncates on.
pub fn count_tokens(text: &str) -> u32 {
    u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX)
}

/// Truncate `text` to at most `max_tokens` whitespace tokens, preserving the
/// original separators up to the cut point.
pub fn truncate_tokens(text: &str, max_tokens: u32) -> String {
    let mut remaining = max_tokens;
    let mut end = 0usize;
    let mut in_token = false;
    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            in_token = false;
        } else if !in_token {
            if remaining == 0 {
                break;
            }
            remaining -= 1;
            in_token = true;
            end = idx + ch.len_utf8();
        } else {
            end = idx + ch.len_utf8();
        }
    }
    text[..end].to_string()
}

/// A non-participant entry written by the orchestrator (phase transitions,
/// eliminations, closing synthesis).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemNote {
    pub turn: u32,
    pub text: String,
}

/// One entry in the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum TranscriptEntry {
    Utterance(Utterance),
    System(SystemNote),
}

/// Append-only ordered record of the competition. The orchestrator is the
/// sole writer; nothing is ever mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_utterance(&mut self, utterance: Utterance) {
        self.entries.push(TranscriptEntry::Utterance(utterance));
    }

    pub fn push_system(&mut self, turn: u32, text: impl Into<String>) {
        self.entries.push(TranscriptEntry::System(SystemNote {
            turn,
            text: text.into(),
        }));
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All utterances in order, skipping system notes.
    pub fn utterances(&self) -> impl Iterator<Item = &Utterance> {
        self.entries.iter().filter_map(|e| match e {
            TranscriptEntry::Utterance(u) => Some(u),
            TranscriptEntry::System(_) => None,
        })
    }

    /// The last `n` utterances from any participant, oldest first.
    pub fn recent_window(&self, n: usize) -> Vec<Utterance> {
        let all: Vec<&Utterance> = self.utterances().collect();
        let start = all.len().saturating_sub(n);
        all[start..].iter().map(|u| (*u).clone()).collect()
    }

    /// The last `n` utterances by one participant, oldest first.
    pub fn recent_by(&self, participant: ParticipantId, n: usize) -> Vec<Utterance> {
        let own: Vec<&Utterance> = self
            .utterances()
            .filter(|u| u.participant == participant)
            .collect();
        let start = own.len().saturating_sub(n);
        own[start..].iter().map(|u| (*u).clone()).collect()
    }

    /// How many utterances reference `turn`. The scorecard invariant
    /// requires exactly one.
    pub fn utterance_count_for_turn(&self, turn: u32) -> usize {
        self.utterances().filter(|u| u.turn == turn).count()
    }
}

/// The slice of transcript handed to judges: the utterance under evaluation
/// plus the context that preceded it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptFragment {
    pub utterance: Utterance,
    pub context: Vec<Utterance>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid() -> ParticipantId {
        ParticipantId::from_registration(7, 0)
    }

    #[test]
    fn test_count_and_truncate_tokens() {
        assert_eq!(count_tokens("one two  three"), 3);
        assert_eq!(count_tokens(""), 0);

        assert_eq!(truncate_tokens("one two three four", 2), "one two");
        assert_eq!(truncate_tokens("one two", 5), "one two");
        assert_eq!(truncate_tokens("  padded   words here", 2), "  padded   words");
        assert_eq!(truncate_tokens("anything", 0), "");
    }

    #[test]
    fn test_unsupported_claims() {
        let supported = Claim::factual("water boils at 100C")
            .with_evidence(EvidenceRef::new("phys-handbook"));
        let unsupported = Claim::factual("the moon is shrinking");
        let opinion = Claim {
            text: "we should split the problem".to_string(),
            kind: ClaimKind::Proposal,
            evidence: Vec::new(),
        };

        let draft = UtteranceDraft::new("claims ahoy")
            .with_claim(supported)
            .with_claim(unsupported)
            .with_claim(opinion);
        let utterance = Utterance::from_draft(draft, pid(), 3, 12);

        assert_eq!(utterance.unsupported_claims().count(), 1);
    }

    #[test]
    fn test_transcript_windows() {
        let mut transcript = Transcript::new();
        let a = ParticipantId::from_registration(7, 0);
        let b = ParticipantId::from_registration(7, 1);

        for turn in 0..6u32 {
            let who = if turn % 2 == 0 { a } else { b };
            let draft = UtteranceDraft::new(format!("utterance {turn}"));
            transcript.push_utterance(Utterance::from_draft(draft, who, turn, 1));
        }
        transcript.push_system(6, "phase change");

        let window = transcript.recent_window(3);
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].turn, 3);
        assert_eq!(window[2].turn, 5);

        let own = transcript.recent_by(a, 2);
        assert_eq!(own.len(), 2);
        assert!(own.iter().all(|u| u.participant == a));

        assert_eq!(transcript.utterance_count_for_turn(4), 1);
        assert_eq!(transcript.utterance_count_for_turn(99), 0);
        assert_eq!(transcript.len(), 7);
    }
}
