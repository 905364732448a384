//! Memory types for Colloquy.
//!
//! Each persona keeps its own perspective copy of everything it witnessed:
//! bounded short/long-term buffers of [`MemoryItem`]s plus a retrieval index
//! of [`RetrievalDocument`] projections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::persona::PersonaId;

/// What a memory item records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Something a persona (or the operator) said.
    Speech,
    /// A world or scenario event.
    Event,
    /// The outcome of an action or a world consequence.
    ActionResult,
    /// A compressed episode summary.
    Summary,
}

impl MemoryKind {
    /// Events and action results are protected from ordinary eviction.
    pub fn is_protected(&self) -> bool {
        matches!(self, MemoryKind::Event | MemoryKind::ActionResult)
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryKind::Speech => write!(f, "speech"),
            MemoryKind::Event => write!(f, "event"),
            MemoryKind::ActionResult => write!(f, "action_result"),
            MemoryKind::Summary => write!(f, "summary"),
        }
    }
}

impl FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "speech" => Ok(MemoryKind::Speech),
            "event" => Ok(MemoryKind::Event),
            "action_result" => Ok(MemoryKind::ActionResult),
            "summary" => Ok(MemoryKind::Summary),
            other => Err(format!("invalid memory kind: '{other}'")),
        }
    }
}

/// Immutable record of something a persona witnessed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    pub tick: u64,
    /// Stable id of the speaker, absent for world/system sources.
    pub speaker_id: Option<PersonaId>,
    /// Speaker label at the time the item was recorded.
    pub speaker_label: String,
    pub text: String,
    pub importance: f64,
    pub kind: MemoryKind,
    #[serde(default)]
    pub addressee: Option<PersonaId>,
    pub recorded_at: DateTime<Utc>,
}

/// Text plus metadata projection of a memory item, indexed for search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalDocument {
    pub text: String,
    pub tick: u64,
    pub importance: f64,
    pub is_event: bool,
    pub speaker_label: String,
    #[serde(default)]
    pub speaker_id: Option<PersonaId>,
}

/// A direct question addressed to a persona that it has not answered yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingQuestion {
    pub tick: u64,
    pub from_label: String,
    #[serde(default)]
    pub from_id: Option<PersonaId>,
    pub question: String,
}

/// A decision or proposal the group should stay consistent with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDecision {
    pub tick: u64,
    pub proposer_label: String,
    #[serde(default)]
    pub proposer_id: Option<PersonaId>,
    pub decision: String,
}

/// Serializable state of one persona's memory, saved as a full overwrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    #[serde(default)]
    pub short_term: Vec<MemoryItem>,
    #[serde(default)]
    pub long_term: Vec<MemoryItem>,
    #[serde(default)]
    pub completed_actions: Vec<String>,
    #[serde(default)]
    pub group_decisions: Vec<GroupDecision>,
    #[serde(default)]
    pub documents: Vec<RetrievalDocument>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_kind_roundtrip() {
        for kind in [
            MemoryKind::Speech,
            MemoryKind::Event,
            MemoryKind::ActionResult,
            MemoryKind::Summary,
        ] {
            let parsed: MemoryKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_protected_kinds() {
        assert!(MemoryKind::Event.is_protected());
        assert!(MemoryKind::ActionResult.is_protected());
        assert!(!MemoryKind::Speech.is_protected());
        assert!(!MemoryKind::Summary.is_protected());
    }

    #[test]
    fn test_snapshot_deserializes_from_partial_json() {
        let snapshot: MemorySnapshot =
            serde_json::from_str(r#"{"completed_actions": ["lit the fire"]}"#).unwrap();
        assert!(snapshot.short_term.is_empty());
        assert_eq!(snapshot.completed_actions, vec!["lit the fire".to_string()]);
    }
}
