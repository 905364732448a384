//! Scenario and topic state.

use serde::{Deserialize, Serialize};

use crate::phase::DialoguePhase;

/// A static scenario definition from the preset catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub key: String,
    pub name: String,
    pub description: String,
    pub context: String,
    pub events: Vec<String>,
}

/// Persisted scenario progress for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioState {
    pub scenario_key: String,
    #[serde(default)]
    pub events_triggered: Vec<String>,
}

/// Persisted topic progress for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopicState {
    pub current_topic: Option<String>,
    #[serde(default)]
    pub messages_on_topic: usize,
    #[serde(default)]
    pub discussed_topics: Vec<String>,
    /// Phase of the current topic; records without it restart at Discuss.
    #[serde(default)]
    pub phase: Option<DialoguePhase>,
    #[serde(default)]
    pub ticks_in_phase: u32,
    #[serde(default)]
    pub topic_started_tick: u64,
}
