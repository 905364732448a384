//! Telemetry record types.
//!
//! A [`TelemetryRecord`] carries full source/target persona snapshots plus
//! the simulation context at the moment of emission. Records are delivered
//! at most once and never acknowledged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::fmt;

use crate::mood::Emotion;
use crate::persona::{Archetype, BigFive, Demographics, PersonaId, Species};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryEventType {
    MessageSent,
    NewTopic,
    EventReaction,
}

impl fmt::Display for TelemetryEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventType::MessageSent => write!(f, "message_sent"),
            TelemetryEventType::NewTopic => write!(f, "new_topic"),
            TelemetryEventType::EventReaction => write!(f, "event_reaction"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodReading {
    pub dominant_emotion: Emotion,
    pub happiness: f64,
    pub energy: f64,
    pub stress: f64,
    pub anger: f64,
    pub fear: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipReading {
    pub value: f64,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityReading {
    pub talkativeness: f64,
    pub ticks_silent: u32,
    pub messages_spoken: u32,
    pub consecutive_similar: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanReading {
    pub goal: String,
    pub current_step: Option<String>,
    pub steps: Vec<String>,
}

/// Point-in-time view of one persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaSnapshot {
    pub agent_id: PersonaId,
    pub name: String,
    pub archetype: Archetype,
    pub species: Species,
    pub big_five: BigFive,
    pub demographics: Demographics,
    pub mood: MoodReading,
    pub relationships: BTreeMap<PersonaId, RelationshipReading>,
    pub activity: ActivityReading,
    pub plan: Option<PlanReading>,
    pub active_event: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentReading {
    pub delta: f64,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageData {
    pub message: String,
    pub mood: Emotion,
    pub tick: u64,
    pub is_initiative: bool,
    pub is_new_topic: bool,
    pub action_result: Option<String>,
    pub sentiments: Option<BTreeMap<PersonaId, SentimentReading>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioContext {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseContext {
    pub current: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationContext {
    pub scenario: ScenarioContext,
    pub active_event: Option<String>,
    pub current_topic: Option<String>,
    pub phase: PhaseContext,
}

/// One record posted to the telemetry sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub event_type: TelemetryEventType,
    pub user_id: String,
    pub source_agent: PersonaSnapshot,
    pub target_agents: Vec<PersonaSnapshot>,
    pub timestamp: DateTime<Utc>,
    pub data: MessageData,
    pub simulation_context: SimulationContext,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_serializes_snake_case() {
        let json = serde_json::to_string(&TelemetryEventType::EventReaction).unwrap();
        assert_eq!(json, "\"event_reaction\"");
        assert_eq!(TelemetryEventType::NewTopic.to_string(), "new_topic");
    }
}
