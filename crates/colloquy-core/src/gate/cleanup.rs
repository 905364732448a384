//! Normalization of raw generated text into a single clean utterance.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use crate::llm::strip_think_tags;
use crate::text::truncate_chars;

static SYSTEM_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"\[(?:event|result|summary|world|action result)\]\s*:?|\[[^\]]{0,6}ent\]\s*")
        .case_insensitive(true)
        .build()
        .expect("valid regex")
});

static STAGE_DIRECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]{5,80}\)|\*[^*]{3,80}\*").expect("valid regex"));

static LEADING_JUNK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[\]:\-]+\s*").expect("valid regex"));

static NARRATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"(?:^|\s)(?:narrator|game master)[,:]?\s*")
        .case_insensitive(true)
        .build()
        .expect("valid regex")
});

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

static SENTENCE_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?…]\s+([A-Z])").expect("valid regex"));

static CAPITALIZED_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[,\s]\s*)([A-Z][a-z])").expect("valid regex"));

const MIN_CHARS: usize = 5;

fn is_stop(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

/// Clean a raw reply for `speaker`.
///
/// Returns `None` when nothing usable is left. `others` are the current
/// display names of every other persona.
pub fn clean_response(raw: &str, speaker: &str, others: &[String], max_chars: usize) -> Option<String> {
    let text = strip_think_tags(raw);
    let text = SYSTEM_TAG_RE.replace_all(&text, "");
    let text = STAGE_DIRECTION_RE.replace_all(&text, "");
    let text = LEADING_JUNK_RE.replace(&text, "");
    let text = NARRATOR_RE.replace_all(&text, " ");
    let text = WHITESPACE_RE.replace_all(text.trim(), " ");
    let mut text = strip_speaker_prefix(text.trim(), speaker).to_string();
    if text.chars().count() < MIN_CHARS {
        return None;
    }

    text = repair_truncated_start(&text);
    if text.chars().count() < MIN_CHARS {
        return None;
    }
    text = strip_speaker_prefix(&text, speaker).to_string();
    text = strip_other_speech(&text, others);
    text = limit_length(&text, max_chars);
    text = close_sentence(&text);

    (text.chars().count() >= MIN_CHARS).then_some(text)
}

/// Drop a leading `Name:` written by any persona in `names`.
pub fn strip_any_prefix(text: &str, names: &[String]) -> String {
    names
        .iter()
        .find_map(|name| {
            text.strip_prefix(name.as_str())
                .and_then(|rest| rest.strip_prefix(':'))
        })
        .map(|rest| rest.trim().to_string())
        .unwrap_or_else(|| text.to_string())
}

fn strip_speaker_prefix<'a>(text: &'a str, speaker: &str) -> &'a str {
    if speaker.is_empty() {
        return text;
    }
    text.strip_prefix(speaker)
        .and_then(|rest| rest.strip_prefix(':'))
        .map(str::trim)
        .unwrap_or(text)
}

/// Cut the reply where it starts speaking as another persona.
pub fn strip_other_speech(text: &str, others: &[String]) -> String {
    let names: Vec<&str> = others
        .iter()
        .map(String::as_str)
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        return text.to_string();
    }

    let mut text = text.to_string();
    let alternation = names
        .iter()
        .map(|n| regex::escape(n))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(r"(?:\n|\. |! |\? |^)\s*(?:{alternation})\s*[:\-]");
    if let Ok(re) = Regex::new(&pattern)
        && let Some(m) = re.find(&text)
        && m.start() > 10
    {
        let cut = if text[m.start()..].starts_with(is_stop) {
            m.start() + 1
        } else {
            m.start()
        };
        text = text[..cut].trim().to_string();
    }

    for name in names {
        if let Some(idx) = text.find(&format!("{name}:"))
            && idx > 15
        {
            text = text[..idx].trim().to_string();
            break;
        }
    }
    text
}

/// Replies that begin mid-word or lowercase are trimmed to the first
/// proper sentence when one starts nearby.
fn repair_truncated_start(text: &str) -> String {
    if !text.chars().next().is_some_and(char::is_lowercase) {
        return text.to_string();
    }
    if let Some(caps) = SENTENCE_START_RE.captures(text)
        && let Some(m) = caps.get(1)
    {
        return text[m.start()..].to_string();
    }
    if let Some(caps) = CAPITALIZED_WORD_RE.captures(text)
        && let Some(m) = caps.get(1)
        && m.start() < 30
    {
        return text[m.start()..].to_string();
    }
    text.to_string()
}

fn limit_length(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut = truncate_chars(text, max_chars);
    let floor = max_chars * 3 / 10;
    if let Some(p) = cut.rfind(is_stop)
        && cut[..p].chars().count() > floor
    {
        return cut[..=p].trim().to_string();
    }
    match cut.rfind(' ') {
        Some(s) if cut[..s].chars().count() > floor => format!("{}...", cut[..s].trim()),
        _ => format!("{}...", cut.trim()),
    }
}

/// Trim a dangling half-sentence back to the last full stop.
fn close_sentence(text: &str) -> String {
    let Some(last) = text.chars().last() else {
        return String::new();
    };
    if ".!?…\"'".contains(last) {
        return text.to_string();
    }
    let len = text.len();
    if let Some(p) = text.rfind(is_stop)
        && p * 10 > len * 3
    {
        return text[..=p].trim().to_string();
    }
    if let Some(s) = text.rfind(' ')
        && s * 2 > len
    {
        return format!("{}...", text[..s].trim());
    }
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn others() -> Vec<String> {
        vec!["Boris".into(), "Clara".into()]
    }

    #[test]
    fn strips_tags_and_stage_directions() {
        let cleaned = clean_response(
            "<think>plan</think>[EVENT] Alice: (looks around nervously) We should move the camp uphill.",
            "Alice",
            &others(),
            250,
        );
        assert_eq!(cleaned.as_deref(), Some("We should move the camp uphill."));
    }

    #[test]
    fn cuts_speech_written_for_others() {
        let cleaned = clean_response(
            "I will check the radio tonight. Boris: Good idea, I will help.",
            "Alice",
            &others(),
            250,
        );
        assert_eq!(cleaned.as_deref(), Some("I will check the radio tonight."));
    }

    #[test]
    fn repairs_truncated_opening() {
        let cleaned = clean_response("ing the nets. We need fish before dark!", "Alice", &[], 250);
        assert_eq!(cleaned.as_deref(), Some("We need fish before dark!"));
    }

    #[test]
    fn long_replies_end_on_sentence_boundary() {
        let text = format!("{} And then more words follow here", "Short sentence here. ".repeat(20));
        let cleaned = clean_response(&text, "Alice", &[], 100).unwrap();
        assert!(cleaned.chars().count() <= 100);
        assert!(cleaned.ends_with('.'));
    }

    #[test]
    fn tiny_or_empty_replies_are_dropped() {
        assert_eq!(clean_response("<think>only thoughts</think>", "Alice", &[], 250), None);
        assert_eq!(clean_response("Alice: ok", "Alice", &[], 250), None);
    }

    #[test]
    fn strip_any_prefix_handles_other_names() {
        assert_eq!(
            strip_any_prefix("Clara: fine by me", &others()),
            "fine by me"
        );
        assert_eq!(strip_any_prefix("fine by me", &others()), "fine by me");
    }
}
