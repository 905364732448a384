//! Structural quality checks on a cleaned utterance.

use std::fmt;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

/// Harmful actions rejected in any context.
const DANGEROUS_ALWAYS: &[&str] = &[
    "cut myself",
    "amputate",
    "cut off my",
    "slit my",
    "let my blood",
    "break my own",
    "gouge",
    "blood ritual",
    "human sacrifice",
    "kill myself",
    "hang myself",
    "drown myself",
];

/// "curse" only counts as dangerous next to one of these.
const CURSE_CONTEXT: &[&str] = &["ritual", "blood", "sacrific", "myself", "i will curse", "hex"];

const FOURTH_WALL: &[&str] = &[
    r"\bnarrator",
    r"\bgame.?master",
    r"\bthe system\b",
    r"\bthe author\b",
    r"\bthe creator",
    r"\bplayer\b",
];

const THIRD_PERSON_VERBS: &[&str] = &[
    "found", "managed", "tried", "decided", "did", "saw", "went", "grabbed",
];

const RESULT_COPY: &[&str] = &[
    "partial success",
    "full success",
    "failure.",
    "result:",
    "outcome:",
    "action result",
    "unexpected twist",
];

const STAGE_ACTIONS: &[&str] = &[
    r"\bi turn to\s",
    r"\bi turn around\s",
    r"\bi walk (?:up )?to\s",
    r"\bi pick up\s",
    r"\bi stand up\b",
    r"\bi sit down\b",
    r"\bi lie down\b",
    r"\bi lean\s",
    r"\bi hand\s",
    r"\bi look at\s",
    r"\bi nod\b",
    r"\bi shake my head\b",
    r"\bi sigh\b",
    r"\bi frown\b",
];

const SYSTEM_TAGS: &[&str] = &[
    "event]",
    "result]",
    "summary]",
    "[world]",
    "important events from the past",
    "your current mood",
    "mood rules",
    "how to talk",
    "forbidden:",
    "critically important",
];

static FOURTH_WALL_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| compile_all(FOURTH_WALL));
static STAGE_ACTION_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| compile_all(STAGE_ACTIONS));

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
}

/// Why an utterance was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualityIssue {
    DangerousAction(String),
    WritesForOther(String),
    SelfAddress(String),
    FourthWall,
    ThirdPerson(String),
    CopiedResult,
    TooShort,
    StageAction,
    SystemTag,
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityIssue::DangerousAction(p) => write!(f, "dangerous action: '{p}'"),
            QualityIssue::WritesForOther(name) => {
                write!(f, "you are writing for {name}; speak only for yourself")
            }
            QualityIssue::SelfAddress(name) => {
                write!(f, "do not address yourself by name; you are {name}")
            }
            QualityIssue::FourthWall => {
                write!(f, "do not address the narrator; talk to the other characters")
            }
            QualityIssue::ThirdPerson(p) => {
                write!(f, "speak in the first person ('I'), not '{p}'")
            }
            QualityIssue::CopiedResult => {
                write!(f, "do not copy the action result text; speak for yourself")
            }
            QualityIssue::TooShort => write!(f, "too short"),
            QualityIssue::StageAction => {
                write!(f, "do not describe physical actions; use words")
            }
            QualityIssue::SystemTag => write!(f, "do not copy system tags; speak for yourself"),
        }
    }
}

/// Validate `text` spoken by `speaker`. `others` are the other display names.
pub fn check_quality(text: &str, speaker: &str, others: &[String]) -> Result<(), QualityIssue> {
    let lower = text.to_lowercase();

    if let Some(p) = DANGEROUS_ALWAYS.iter().find(|p| lower.contains(*p)) {
        return Err(QualityIssue::DangerousAction(p.to_string()));
    }
    if lower.contains("curse") && CURSE_CONTEXT.iter().any(|c| lower.contains(c)) {
        return Err(QualityIssue::DangerousAction("curse".into()));
    }

    if let Some(name) = others.iter().find(|n| text.contains(&format!("{n}:"))) {
        return Err(QualityIssue::WritesForOther(name.clone()));
    }

    if has_self_reference(speaker, text) {
        return Err(QualityIssue::SelfAddress(speaker.to_string()));
    }

    if FOURTH_WALL_RES.iter().any(|re| re.is_match(&lower)) {
        return Err(QualityIssue::FourthWall);
    }

    let speaker_lower = speaker.to_lowercase();
    if !speaker_lower.is_empty()
        && let Some(verb) = THIRD_PERSON_VERBS
            .iter()
            .find(|v| lower.contains(&format!("{speaker_lower} {v}")))
    {
        return Err(QualityIssue::ThirdPerson(format!("{speaker} {verb}")));
    }

    if RESULT_COPY.iter().any(|p| lower.contains(p)) {
        return Err(QualityIssue::CopiedResult);
    }

    if text.split_whitespace().count() < 3 {
        return Err(QualityIssue::TooShort);
    }

    if STAGE_ACTION_RES.iter().any(|re| re.is_match(&lower)) {
        return Err(QualityIssue::StageAction);
    }

    if SYSTEM_TAGS.iter().any(|p| lower.contains(p)) {
        return Err(QualityIssue::SystemTag);
    }

    Ok(())
}

/// Whether `text` has the persona addressing or narrating itself by name.
pub fn has_self_reference(name: &str, text: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    let n = regex::escape(name);
    let patterns = [
        format!(r"\b{n},\s"),
        format!(r"^{n}[,:\s]"),
        format!(r"says\s+{n}\b"),
        format!(r"i turn to {n}\b"),
        format!(r"[—-] {n}\b"),
    ];
    patterns.iter().any(|p| {
        RegexBuilder::new(p)
            .case_insensitive(true)
            .build()
            .is_ok_and(|re| re.is_match(text))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn others() -> Vec<String> {
        vec!["Boris".into(), "Clara".into()]
    }

    #[test]
    fn accepts_ordinary_speech() {
        assert_eq!(
            check_quality("Boris, can you help me gather wood?", "Alice", &others()),
            Ok(())
        );
    }

    #[test]
    fn rejects_dangerous_actions() {
        assert!(matches!(
            check_quality("Maybe I should cut myself free", "Alice", &others()),
            Err(QualityIssue::DangerousAction(_))
        ));
        assert!(matches!(
            check_quality("I curse this island with a blood oath", "Alice", &others()),
            Err(QualityIssue::DangerousAction(_))
        ));
        assert_eq!(
            check_quality("Curse this rain, everything is wet", "Alice", &others()),
            Ok(())
        );
    }

    #[test]
    fn rejects_role_breaks() {
        assert_eq!(
            check_quality("Sure thing. Clara: I agree", "Alice", &others()),
            Err(QualityIssue::WritesForOther("Clara".into()))
        );
        assert_eq!(
            check_quality("Alice, you must keep going", "Alice", &others()),
            Err(QualityIssue::SelfAddress("Alice".into()))
        );
        assert_eq!(
            check_quality("Hey narrator, what happens next?", "Alice", &others()),
            Err(QualityIssue::FourthWall)
        );
        assert!(matches!(
            check_quality("Then alice found a rope by the dock", "Alice", &others()),
            Err(QualityIssue::ThirdPerson(_))
        ));
    }

    #[test]
    fn rejects_copies_and_stage_business() {
        assert_eq!(
            check_quality("Partial success, the door opens", "Alice", &others()),
            Err(QualityIssue::CopiedResult)
        );
        assert_eq!(check_quality("Fine then", "Alice", &others()), Err(QualityIssue::TooShort));
        assert_eq!(
            check_quality("I nod and keep quiet for now", "Alice", &others()),
            Err(QualityIssue::StageAction)
        );
        assert_eq!(
            check_quality("Your current mood says we should rest", "Alice", &others()),
            Err(QualityIssue::SystemTag)
        );
    }
}
