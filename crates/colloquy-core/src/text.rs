//! Text heuristics shared by the gates and the memory subsystem.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use colloquy_types::llm::Message;

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z]+").expect("valid regex"));

/// Rough token count: one token per three characters.
pub fn estimate_tokens(text: &str) -> usize {
    if text.is_empty() {
        0
    } else {
        (text.chars().count() / 3).max(1)
    }
}

/// Token estimate of a chat request including per-message framing.
pub fn estimate_message_tokens(messages: &[Message]) -> usize {
    messages
        .iter()
        .map(|m| 4 + estimate_tokens(&m.content))
        .sum::<usize>()
        + 2
}

/// Lowercase `[a-z]+` words of `text`.
pub fn words(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD_RE
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Ratcliff/Obershelp similarity of two strings in [0, 1].
///
/// Comparison is case-insensitive and ignores surrounding whitespace.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.trim().to_lowercase().chars().collect();
    let b: Vec<char> = b.trim().to_lowercase().chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

fn matching_chars(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (start_a, start_b, len) = longest_common_block(a, b);
    if len == 0 {
        return 0;
    }
    len + matching_chars(&a[..start_a], &b[..start_b])
        + matching_chars(&a[start_a + len..], &b[start_b + len..])
}

/// Leftmost longest common substring as `(start_a, start_b, len)`.
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    let mut row = vec![0usize; b.len() + 1];
    for i in 0..a.len() {
        for j in 0..b.len() {
            row[j + 1] = if a[i] == b[j] { prev[j] + 1 } else { 0 };
            let len = row[j + 1];
            if len > best.2 {
                best = (i + 1 - len, j + 1 - len, len);
            }
        }
        std::mem::swap(&mut prev, &mut row);
    }
    best
}

/// Word 3-grams of `text`; texts shorter than three words yield their words.
pub fn extract_phrases(text: &str) -> HashSet<String> {
    let words = words(text);
    if words.len() < 3 {
        return words.into_iter().collect();
    }
    words.windows(3).map(|w| w.join(" ")).collect()
}

/// Share of `new` phrases that also appear in `old`.
pub fn phrase_overlap(new: &HashSet<String>, old: &HashSet<String>) -> f64 {
    if new.is_empty() {
        return 0.0;
    }
    new.intersection(old).count() as f64 / new.len() as f64
}

/// Stock filler phrases that make every persona sound alike.
pub const BANNED_PATTERNS: &[&str] = &[
    "we need to stick together",
    "we must stay together",
    "we should stay calm",
    "let's not panic",
    "everything will be fine",
    "we will get through this",
    "we'll get through this",
    "together we are stronger",
    "together we can do it",
    "we need a plan",
    "we must find a way",
    "the most important thing is",
    "what do you all think",
    "what do you think we should do",
    "i have an idea",
    "i agree with everyone",
    "as i said before",
];

/// Openers that persona after persona tends to reuse.
pub const REPETITIVE_STARTS: &[&str] = &[
    "listen,",
    "listen ",
    "look,",
    "you know,",
    "well,",
    "so,",
    "okay,",
    "ok,",
    "guys,",
    "friends,",
    "honestly,",
    "i think",
    "i believe",
    "i suggest",
    "in my opinion",
    "you're right",
    "i agree",
];

pub fn has_banned_pattern(text: &str) -> bool {
    let lower = text.to_lowercase();
    BANNED_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Whether `text` reads as a rerun of one of the `recent` utterances.
pub fn has_repetitive_pattern(text: &str, recent: &[String]) -> bool {
    if has_banned_pattern(text) {
        return true;
    }

    let phrases = extract_phrases(text);
    let recent_tail = &recent[recent.len().saturating_sub(6)..];
    for old in recent_tail {
        if phrase_overlap(&phrases, &extract_phrases(old)) > 0.35 {
            return true;
        }
    }

    let lower = text.trim().to_lowercase();
    let Some(start) = REPETITIVE_STARTS.iter().find(|s| lower.starts_with(*s)) else {
        return false;
    };
    recent[recent.len().saturating_sub(4)..]
        .iter()
        .any(|old| old.trim().to_lowercase().starts_with(start))
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimates() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("hi"), 1);
        assert_eq!(estimate_tokens("abcdefghi"), 3);
        let messages = vec![Message::system("abcdef"), Message::user("abc")];
        assert_eq!(estimate_message_tokens(&messages), (4 + 2) + (4 + 1) + 2);
    }

    #[test]
    fn similarity_matches_known_ratios() {
        assert_eq!(similarity("abcd", "abcd"), 1.0);
        assert_eq!(similarity("abcd", "wxyz"), 0.0);
        assert!((similarity("abcd", "bcde") - 0.75).abs() < 1e-9);
        assert_eq!(similarity("  Hello ", "hello"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn phrases_are_word_trigrams() {
        let phrases = extract_phrases("We build the raft today");
        assert_eq!(phrases.len(), 3);
        assert!(phrases.contains("build the raft"));
        assert_eq!(extract_phrases("Go now").len(), 2);
    }

    #[test]
    fn banned_phrase_is_repetitive() {
        assert!(has_repetitive_pattern("Honestly we need a plan right now", &[]));
    }

    #[test]
    fn shared_trigrams_are_repetitive() {
        let recent = vec!["We should build the raft near the rocks".to_string()];
        assert!(has_repetitive_pattern(
            "Build the raft near the rocks, quickly",
            &recent
        ));
        assert!(!has_repetitive_pattern(
            "I am going fishing at dawn",
            &recent
        ));
    }

    #[test]
    fn shared_opener_is_repetitive() {
        let recent = vec!["Listen, the fire is dying".to_string()];
        assert!(has_repetitive_pattern("Listen, I saw tracks by the creek", &recent));
        assert!(!has_repetitive_pattern("Tracks by the creek worry me", &recent));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
