//! The shared, append-only conversation log.

use serde::{Deserialize, Serialize};

use crate::persona::PersonaId;

/// What produced a conversation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryKind {
    /// An accepted persona utterance.
    Utterance { initiative: bool, new_topic: bool },
    /// A random event drawn from the scenario pool.
    ScenarioEvent,
    /// A world event injected by the operator.
    OperatorEvent,
    /// The world's reaction to an event.
    WorldConsequence,
    /// Outcome of an action a persona announced.
    ActionResult,
    /// A direct message from the operator.
    OperatorMessage,
    /// A new topic chosen after the previous one completed.
    TopicAnnouncement,
    /// A persona joined or left, or a species ability fired.
    Notice,
}

impl EntryKind {
    /// Entries treated as events when building prompts and repetition windows.
    pub fn is_event(&self) -> bool {
        matches!(
            self,
            EntryKind::ScenarioEvent
                | EntryKind::OperatorEvent
                | EntryKind::WorldConsequence
                | EntryKind::ActionResult
                | EntryKind::Notice
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntryKind::Utterance { .. } => "utterance",
            EntryKind::ScenarioEvent => "scenario_event",
            EntryKind::OperatorEvent => "operator_event",
            EntryKind::WorldConsequence => "world_consequence",
            EntryKind::ActionResult => "action_result",
            EntryKind::OperatorMessage => "operator_message",
            EntryKind::TopicAnnouncement => "topic_announcement",
            EntryKind::Notice => "notice",
        }
    }
}

/// One accepted entry of the shared conversation. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub tick: u64,
    /// Persona that produced the entry, absent for world/system/operator sources.
    pub speaker_id: Option<PersonaId>,
    /// Speaker label at the time of the entry.
    pub speaker_label: String,
    pub text: String,
    pub kind: EntryKind,
}

impl ConversationEntry {
    pub fn is_event(&self) -> bool {
        self.kind.is_event()
    }

    pub fn is_from(&self, id: &PersonaId) -> bool {
        self.speaker_id.as_ref() == Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kinds() {
        assert!(EntryKind::ScenarioEvent.is_event());
        assert!(EntryKind::WorldConsequence.is_event());
        assert!(!EntryKind::OperatorMessage.is_event());
        assert!(!EntryKind::TopicAnnouncement.is_event());
        assert!(
            !EntryKind::Utterance {
                initiative: false,
                new_topic: false
            }
            .is_event()
        );
    }

    #[test]
    fn test_entry_kind_serializes_tagged() {
        let kind = EntryKind::Utterance {
            initiative: true,
            new_topic: false,
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "utterance");
        assert_eq!(json["initiative"], true);
    }

    #[test]
    fn test_is_from() {
        let entry = ConversationEntry {
            tick: 1,
            speaker_id: Some(PersonaId::from("agent_1")),
            speaker_label: "Alice".into(),
            text: "Hello there".into(),
            kind: EntryKind::Utterance {
                initiative: false,
                new_topic: false,
            },
        };
        assert!(entry.is_from(&PersonaId::from("agent_1")));
        assert!(!entry.is_from(&PersonaId::from("agent_2")));
    }
}
