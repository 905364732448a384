//! Keyword tables that classify accepted utterances.

/// Proposals and decisions worth remembering group-wide.
const DECISION_KEYWORDS: &[&str] = &[
    "let's",
    "let us",
    "i propose",
    "i suggest we",
    "decided",
    "plan:",
    "we will",
    "we'll",
    "we need",
    "we must",
    "build",
    "gather",
    "assign",
    "signal",
    "shelter",
    "camp",
    "fire",
    "watch",
    "guard duty",
];

/// First-person actions that get a narrated outcome.
const ACTION_WORDS: &[&str] = &[
    "i'll go",
    "i will go",
    "i'm going",
    "i'll check",
    "i will check",
    "i'll look",
    "i'll search",
    "i'll try",
    "i will try",
    "i'll do",
    "i'll inspect",
    "i'll scout",
    "i'll fix",
    "i'll repair",
    "i'll build",
    "i'll gather",
    "i'll collect",
    "i'll bring",
    "i'll open",
    "i'll barricade",
    "i'll reinforce",
    "i'll run",
    "i'll hide",
    "i'll move",
    "i'll explore",
    "i'll climb",
    "i'll take",
    "i'll grab",
];

/// Openers that take the conversation somewhere new.
const INITIATIVE_WORDS: &[&str] = &[
    "i propose",
    "i suggest",
    "let's",
    "we need",
    "what if",
    "maybe we should",
    "we should",
    "we have to",
    "plan:",
    "idea:",
    "listen",
];

fn contains_any(text: &str, table: &[&str]) -> bool {
    let lower = text.to_lowercase();
    table.iter().any(|k| lower.contains(k))
}

pub fn is_group_decision(text: &str) -> bool {
    contains_any(text, DECISION_KEYWORDS)
}

pub fn is_action(text: &str) -> bool {
    contains_any(text, ACTION_WORDS)
}

pub fn is_initiative(text: &str) -> bool {
    contains_any(text, INITIATIVE_WORDS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_utterances() {
        assert!(is_group_decision("Let's keep the fire going all night"));
        assert!(!is_group_decision("I am tired of this sand"));
        assert!(is_action("I'll check the crates on the beach"));
        assert!(!is_action("The crates look heavy"));
        assert!(is_initiative("What if we swim to the reef?"));
        assert!(!is_initiative("Sure, sounds fine"));
    }
}
