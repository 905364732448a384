//! Dialogue phases of a single topic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered progress of a topic: Discuss, Decide, Act, Conclude, then Complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialoguePhase {
    Discuss,
    Decide,
    Act,
    Conclude,
    Complete,
}

impl DialoguePhase {
    pub fn next(&self) -> DialoguePhase {
        match self {
            DialoguePhase::Discuss => DialoguePhase::Decide,
            DialoguePhase::Decide => DialoguePhase::Act,
            DialoguePhase::Act => DialoguePhase::Conclude,
            DialoguePhase::Conclude | DialoguePhase::Complete => DialoguePhase::Complete,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DialoguePhase::Discuss => "Discussion",
            DialoguePhase::Decide => "Decision",
            DialoguePhase::Act => "Action",
            DialoguePhase::Conclude => "Wrap-up",
            DialoguePhase::Complete => "Topic complete",
        }
    }
}

impl fmt::Display for DialoguePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialoguePhase::Discuss => write!(f, "discuss"),
            DialoguePhase::Decide => write!(f, "decide"),
            DialoguePhase::Act => write!(f, "act"),
            DialoguePhase::Conclude => write!(f, "conclude"),
            DialoguePhase::Complete => write!(f, "complete"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order_ends_in_complete() {
        let mut phase = DialoguePhase::Discuss;
        let mut seen = vec![phase];
        while phase != DialoguePhase::Complete {
            phase = phase.next();
            seen.push(phase);
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(DialoguePhase::Complete.next(), DialoguePhase::Complete);
    }
}
