//! Persona snapshots and telemetry record assembly.

use std::collections::BTreeMap;

use chrono::Utc;

use colloquy_types::persona::PersonaId;
use colloquy_types::phase::DialoguePhase;
use colloquy_types::scenario::Scenario;
use colloquy_types::telemetry::{
    ActivityReading, MessageData, MoodReading, PersonaSnapshot, PhaseContext, PlanReading,
    RelationshipReading, ScenarioContext, SentimentReading, SimulationContext, TelemetryEventType,
    TelemetryRecord,
};

use crate::affect;
use crate::persona::{NameRegistry, Persona};

/// Point-in-time view of `persona` with names resolved through `registry`.
pub fn persona_snapshot(persona: &Persona, registry: &NameRegistry) -> PersonaSnapshot {
    let mood = &persona.mood;
    let relationships = persona
        .relationships()
        .iter()
        .map(|(id, value)| {
            (
                id.clone(),
                RelationshipReading {
                    value: *value,
                    display_name: registry.name_of(id),
                },
            )
        })
        .collect();

    PersonaSnapshot {
        agent_id: persona.id.clone(),
        name: registry.name_of(&persona.id),
        archetype: persona.archetype,
        species: persona.species,
        big_five: persona.traits,
        demographics: persona.demographics.clone(),
        mood: MoodReading {
            dominant_emotion: affect::dominant_emotion(mood),
            happiness: mood.happiness,
            energy: mood.energy,
            stress: mood.stress,
            anger: mood.anger,
            fear: mood.fear,
        },
        relationships,
        activity: ActivityReading {
            talkativeness: persona.talkativeness(),
            ticks_silent: persona.ticks_silent,
            messages_spoken: persona.messages_spoken,
            consecutive_similar: persona.consecutive_similar,
        },
        plan: persona.plan.as_ref().map(|plan| PlanReading {
            goal: plan.goal.clone(),
            current_step: plan.current_step().map(str::to_string),
            steps: plan.steps.clone(),
        }),
        active_event: persona.active_event().map(str::to_string),
    }
}

/// Assembles one [`TelemetryRecord`] for an accepted utterance.
#[derive(Debug)]
pub struct RecordBuilder {
    event_type: TelemetryEventType,
    user_id: String,
    tick: u64,
    message: String,
    is_initiative: bool,
    is_new_topic: bool,
    action_result: Option<String>,
    sentiments: BTreeMap<PersonaId, SentimentReading>,
}

impl RecordBuilder {
    pub fn new(
        event_type: TelemetryEventType,
        user_id: impl Into<String>,
        tick: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            user_id: user_id.into(),
            tick,
            message: message.into(),
            is_initiative: false,
            is_new_topic: false,
            action_result: None,
            sentiments: BTreeMap::new(),
        }
    }

    pub fn initiative(mut self, initiative: bool) -> Self {
        self.is_initiative = initiative;
        self
    }

    pub fn new_topic(mut self, new_topic: bool) -> Self {
        self.is_new_topic = new_topic;
        self
    }

    pub fn action_result(mut self, result: Option<String>) -> Self {
        self.action_result = result;
        self
    }

    pub fn sentiment(mut self, target: PersonaId, delta: f64, reason: impl Into<String>) -> Self {
        self.sentiments.insert(
            target,
            SentimentReading {
                delta,
                reason: reason.into(),
            },
        );
        self
    }

    /// Targets are every other persona in the session.
    pub fn build(
        self,
        source: &Persona,
        everyone: &[Persona],
        registry: &NameRegistry,
        simulation_context: SimulationContext,
    ) -> TelemetryRecord {
        let target_agents = everyone
            .iter()
            .filter(|p| p.id != source.id)
            .map(|p| persona_snapshot(p, registry))
            .collect();

        TelemetryRecord {
            event_type: self.event_type,
            user_id: self.user_id,
            source_agent: persona_snapshot(source, registry),
            target_agents,
            timestamp: Utc::now(),
            data: MessageData {
                message: self.message,
                mood: affect::dominant_emotion(&source.mood),
                tick: self.tick,
                is_initiative: self.is_initiative,
                is_new_topic: self.is_new_topic,
                action_result: self.action_result,
                sentiments: (!self.sentiments.is_empty()).then_some(self.sentiments),
            },
            simulation_context,
        }
    }
}

pub fn simulation_context(
    scenario: &Scenario,
    active_event: Option<&str>,
    current_topic: Option<&str>,
    phase: DialoguePhase,
) -> SimulationContext {
    SimulationContext {
        scenario: ScenarioContext {
            name: scenario.name.clone(),
            description: scenario.description.clone(),
        },
        active_event: active_event.map(str::to_string),
        current_topic: current_topic.map(str::to_string),
        phase: PhaseContext {
            current: phase.to_string(),
            label: phase.label().to_string(),
        },
    }
}
