//! The frozen output bundle of a competition.
//!
//! A run always terminates with a report, even under partial external-service
//! failure: faults are carried as structured entries instead of being raised.
//! The canonical fingerprint covers only deterministic content (no wall-clock
//! timings), so two runs with the same seed and the same external-call
//! outputs produce the same fingerprint.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::competition::{CompetitionState, Standing};
use super::participant::{ParticipantId, ParticipantStatus};
use super::phase::Phase;
use super::transcript::TranscriptEntry;

/// Immutable result bundle handed to the report sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalReport {
    /// The frozen root state, verbatim.
    pub competition: CompetitionState,
    /// Final standings, best first.
    pub standings: Vec<Standing>,
    /// Winner, when the competition ran to `Complete`. Aborted runs carry
    /// partial standings but no winner.
    pub winner: Option<ParticipantId>,
    /// FNV-1a hash over the canonical (timing-free) content.
    pub fingerprint: String,
}

impl FinalReport {
    /// Freeze `state` into a report. The state must be in a terminal phase.
    pub fn freeze(state: CompetitionState) -> Self {
        let standings = state.standings();
        let winner = if state.phase == Phase::Complete {
            standings
                .iter()
                .find(|s| s.status != ParticipantStatus::Eliminated)
                .map(|s| s.participant)
        } else {
            None
        };
        let fingerprint = fingerprint(&state);
        Self {
            competition: state,
            standings,
            winner,
            fingerprint,
        }
    }
}

/// Canonical JSON view of the state with all nondeterministic fields
/// (durations, wall-clock timestamps) removed.
fn canonical(state: &CompetitionState) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = state
        .transcript
        .entries()
        .iter()
        .map(|entry| match entry {
            TranscriptEntry::Utterance(u) => json!({
                "utterance": {
                    "participant": u.participant,
                    "turn": u.turn,
                    "text": u.text,
                    "token_count": u.token_count,
                    "claims": u.claims,
                }
            }),
            TranscriptEntry::System(note) => json!({ "system": note }),
        })
        .collect();

    json!({
        "id": state.id,
        "topic": state.topic,
        "phase": state.phase,
        "turn": state.turn,
        "transcript": entries,
        "scorecards": state.scorecards,
        "penalties": state.penalties,
        "faults": state.faults,
        "standings": state.standings(),
    })
}

/// 64-bit FNV-1a over the canonical JSON rendering.
pub fn fingerprint(state: &CompetitionState) -> String {
    let text = canonical(state).to_string();
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in text.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    format!("{hash:016x}")
}
