//! Repetition control: rejects utterances that rerun what was already said.

use std::collections::HashSet;
use std::fmt;

use colloquy_types::config::GateConfig;

use crate::text::{has_banned_pattern, has_repetitive_pattern, phrase_overlap, similarity};

/// Recent conversation a candidate utterance is compared against.
#[derive(Debug, Clone, Copy)]
pub struct RepetitionWindow<'a> {
    /// Non-event utterances by anyone, oldest first.
    pub recent: &'a [String],
    /// The speaker's own utterances, oldest first.
    pub own: &'a [String],
    /// Text of the last log entry when it is an utterance.
    pub last_utterance: Option<&'a str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepetitionIssue {
    BannedPhrase,
    ExactRepeat,
    EchoesLast,
    SimilarToRecent,
    SimilarToOwn,
    SameOpening,
    RepetitivePattern,
    AlreadyDone,
}

impl fmt::Display for RepetitionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            RepetitionIssue::BannedPhrase => "stock phrase",
            RepetitionIssue::ExactRepeat => "exact repeat of own line",
            RepetitionIssue::EchoesLast => "echoes the previous line",
            RepetitionIssue::SimilarToRecent => "too close to a recent line",
            RepetitionIssue::SimilarToOwn => "too close to an own line",
            RepetitionIssue::SameOpening => "same opening as an own line",
            RepetitionIssue::RepetitivePattern => "repetitive pattern",
            RepetitionIssue::AlreadyDone => "action already done",
        };
        f.write_str(reason)
    }
}

const RECENT_COMPARED: usize = 30;
const OPENINGS_COMPARED: usize = 20;
const OPENING_WORDS: usize = 5;

fn opening(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .take(OPENING_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Check `text` against the window; `already_done` is the speaker's own
/// record of similar completed actions.
pub fn check_repetition(
    text: &str,
    window: &RepetitionWindow<'_>,
    gates: &GateConfig,
    already_done: bool,
) -> Result<(), RepetitionIssue> {
    if has_banned_pattern(text) {
        return Err(RepetitionIssue::BannedPhrase);
    }

    let normalized = text.trim().to_lowercase();
    if window
        .own
        .iter()
        .any(|old| old.trim().to_lowercase() == normalized)
    {
        return Err(RepetitionIssue::ExactRepeat);
    }

    if window.last_utterance == Some(text) {
        return Err(RepetitionIssue::EchoesLast);
    }

    let start = window.recent.len().saturating_sub(RECENT_COMPARED);
    if window.recent[start..]
        .iter()
        .any(|old| similarity(text, old) > gates.shared_similarity)
    {
        return Err(RepetitionIssue::SimilarToRecent);
    }

    if window
        .own
        .iter()
        .any(|old| similarity(text, old) > gates.own_similarity)
    {
        return Err(RepetitionIssue::SimilarToOwn);
    }

    let first = opening(text);
    if first.chars().count() > 10 {
        let start = window.own.len().saturating_sub(OPENINGS_COMPARED);
        if window.own[start..].iter().any(|old| opening(old) == first) {
            return Err(RepetitionIssue::SameOpening);
        }
    }

    if has_repetitive_pattern(text, window.own) {
        return Err(RepetitionIssue::RepetitivePattern);
    }

    if already_done {
        return Err(RepetitionIssue::AlreadyDone);
    }

    Ok(())
}

/// Whether a retry differs enough from the rejected text to be accepted.
pub fn is_novel(retry: &str, rejected: &str, gates: &GateConfig) -> bool {
    similarity(retry, rejected) < gates.retry_novelty
}

/// Whether consecutive utterances of one persona count as "similar".
pub fn is_consecutive_repeat(
    previous: &HashSet<String>,
    current: &HashSet<String>,
    text: &str,
    gates: &GateConfig,
) -> bool {
    !previous.is_empty()
        && (phrase_overlap(current, previous) > gates.consecutive_overlap
            || has_banned_pattern(text))
}
