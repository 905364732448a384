//! The dialogue engine: one session's personas, conversation and tick loop.
//!
//! A tick, in order:
//! 1. expire the active event once its focus window has passed
//! 2. advance the phase machine, rotating the topic when it completes
//! 3. fire a scenario event on the configured interval
//! 4. pick a speaker and generate its utterance through the gates
//! 5. fan an accepted utterance out to the log, memories, plans,
//!    relationships, mood and telemetry
//! 6. persist whatever changed

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::rngs::StdRng;

use colloquy_types::config::EngineConfig;
use colloquy_types::conversation::{ConversationEntry, EntryKind};
use colloquy_types::error::SessionError;
use colloquy_types::event::{SessionEvent, SkipReason};
use colloquy_types::persona::{PersonaId, PersonaProfile};
use colloquy_types::scenario::Scenario;
use colloquy_types::telemetry::TelemetryEventType;

use crate::dialogue::{PhaseMachine, ScenarioRunner, TopicTracker};
use crate::event::EventBus;
use crate::gate::RepetitionWindow;
use crate::llm::LlmExecutor;
use crate::memory::AddOutcome;
use crate::persona::{
    Origin, Persona, PromptContext, SharedRegistry, TurnMode, build_messages, seed_relationships,
};
use crate::scheduler::abilities::{self, Ability, BETRAYAL_ANGER, BETRAYAL_EDGE};
use crate::scheduler::narrator;
use crate::scheduler::rules;
use crate::scheduler::sentiment;
use crate::scheduler::speaker::{SelectionContext, select_speaker};
use crate::scheduler::turn::{TurnRequest, generate_turn};
use crate::storage::BoxRecordStore;
use crate::telemetry::{BoxTelemetrySink, RecordBuilder, emit_detached, simulation_context};
use crate::text::truncate_chars;

pub(crate) const EVENT_LABEL: &str = "Event";
pub(crate) const WORLD_LABEL: &str = "World";
pub(crate) const MODERATOR_LABEL: &str = "Moderator";
pub(crate) const RESULT_LABEL: &str = "Result";

const RECENT_WINDOW: usize = 40;
const OWN_WINDOW: usize = 80;
const PLAN_CONTEXT_ENTRIES: usize = 10;
const EVENT_LOOKBACK: usize = 5;
const DECISION_CHARS: usize = 150;

/// External services the engine talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub llm: LlmExecutor,
    pub store: Arc<BoxRecordStore>,
    pub telemetry: Arc<BoxTelemetrySink>,
}

/// Result of one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Spoke(ConversationEntry),
    Skipped(SkipReason),
}

/// Everything one session owns. Driven by a single actor; never shared.
pub struct DialogueEngine {
    pub(super) owner_id: String,
    pub(super) config: EngineConfig,
    pub(super) services: Collaborators,
    pub(super) bus: EventBus,
    pub(super) registry: SharedRegistry,

    pub(super) personas: Vec<Persona>,
    pub(super) conversation: Vec<ConversationEntry>,
    pub(super) tick: u64,

    pub(super) phases: PhaseMachine,
    pub(super) topics: TopicTracker,
    pub(super) scenario: ScenarioRunner,

    pub(super) active_event: Option<String>,
    pub(super) event_started_tick: u64,
    pub(super) reacted: HashSet<PersonaId>,
    pub(super) last_speaker: Option<PersonaId>,
    pub(super) next_index: usize,
    pub(super) tick_delay: f64,
    pub(super) world_dirty: bool,
    pub(super) rng: StdRng,
}

impl std::fmt::Debug for DialogueEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogueEngine")
            .field("owner_id", &self.owner_id)
            .field("tick", &self.tick)
            .field("personas", &self.personas.len())
            .field("phase", &self.phases.phase())
            .finish_non_exhaustive()
    }
}

impl DialogueEngine {
    /// Build a fresh session around `profiles`, numbered `agent_1..`.
    pub fn new(
        owner_id: impl Into<String>,
        config: EngineConfig,
        scenario: Scenario,
        profiles: &[PersonaProfile],
        services: Collaborators,
        mut rng: StdRng,
    ) -> Result<Self, SessionError> {
        if profiles.len() < 2 {
            return Err(SessionError::TooFewPersonas(profiles.len()));
        }

        let registry = SharedRegistry::new();
        let mut personas = Vec::with_capacity(profiles.len());
        for (i, profile) in profiles.iter().enumerate() {
            let id = PersonaId::numbered(i + 1);
            registry
                .write()
                .register(id.clone(), &profile.name)
                .map_err(|_| SessionError::PersonaExists(profile.name.clone()))?;
            personas.push(Persona::new(id, profile, config.memory.clone(), &mut rng));
        }
        seed_relationships(&mut personas, &config.relationships, &mut rng);

        Ok(Self {
            owner_id: owner_id.into(),
            phases: PhaseMachine::new(config.phases),
            topics: TopicTracker::new(config.scheduler.topic_change_threshold),
            scenario: ScenarioRunner::new(scenario),
            tick_delay: config.scheduler.tick_delay_secs,
            next_index: personas.len(),
            config,
            services,
            bus: EventBus::default(),
            registry,
            personas,
            conversation: Vec::new(),
            tick: 0,
            active_event: None,
            event_started_tick: 0,
            reacted: HashSet::new(),
            last_speaker: None,
            world_dirty: false,
            rng,
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn personas(&self) -> &[Persona] {
        &self.personas
    }

    pub fn conversation(&self) -> &[ConversationEntry] {
        &self.conversation
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn tick_delay(&self) -> f64 {
        self.tick_delay
    }

    pub fn active_event(&self) -> Option<&str> {
        self.active_event.as_deref()
    }

    pub fn phases(&self) -> &PhaseMachine {
        &self.phases
    }

    pub fn topics(&self) -> &TopicTracker {
        &self.topics
    }

    pub fn scenario(&self) -> &ScenarioRunner {
        &self.scenario
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Run one tick of the session.
    #[tracing::instrument(skip(self), fields(owner = %self.owner_id, tick = self.tick + 1))]
    pub async fn tick(&mut self) -> TickOutcome {
        self.tick += 1;
        self.bus.publish(SessionEvent::TickStarted { tick: self.tick });

        self.expire_event();
        self.advance_phase().await;

        let interval = self.config.scheduler.scenario_event_interval;
        if interval > 0 && self.tick % interval == 0 {
            self.fire_scenario_event().await;
        }

        let outcome = self.take_turn().await;
        self.persist_dirty().await;
        outcome
    }

    fn expire_event(&mut self) {
        if self.active_event.is_some()
            && self.tick.saturating_sub(self.event_started_tick)
                > self.config.scheduler.event_focus_ticks
        {
            tracing::debug!("event focus ended");
            self.active_event = None;
            self.reacted.clear();
            for persona in &mut self.personas {
                persona.clear_event();
            }
        }
    }

    async fn advance_phase(&mut self) {
        let (changed, phase) = self.phases.advance_tick();
        if changed {
            self.world_dirty = true;
            tracing::info!(phase = %phase, "phase changed");
            self.bus.publish(SessionEvent::PhaseChanged {
                tick: self.tick,
                phase,
            });
        }

        if self.phases.is_complete() && self.active_event.is_none() {
            let topic = self
                .topics
                .new_topic(&self.services.llm, self.scenario.scenario(), &mut self.rng)
                .await;
            self.phases.start_new_topic(self.tick);
            let text = format!("New topic: {topic}");
            self.append(None, MODERATOR_LABEL, &text, EntryKind::TopicAnnouncement);
            let due = self.remember_all(MODERATOR_LABEL, None, &text, |_| Origin::Other);
            self.compress(due).await;
            self.world_dirty = true;
            self.bus.publish(SessionEvent::TopicChanged {
                tick: self.tick,
                topic,
            });
        }
    }

    async fn fire_scenario_event(&mut self) {
        let Some(event) = self.scenario.trigger_random(&mut self.rng) else {
            return;
        };
        tracing::info!(event = %event, "scenario event");
        self.apply_event(&event, EntryKind::ScenarioEvent).await;
    }

    /// Make `event` the active event: log it, let everyone witness and feel
    /// it, then ask for its consequence on the world.
    pub(super) async fn apply_event(&mut self, event: &str, kind: EntryKind) {
        self.active_event = Some(event.to_string());
        self.event_started_tick = self.tick;
        self.reacted.clear();
        self.world_dirty = true;

        self.append(None, EVENT_LABEL, event, kind);
        let tick = self.tick;
        let due = self.remember_all(EVENT_LABEL, None, event, |_| Origin::Event);
        for persona in &mut self.personas {
            persona.observe(tick, EVENT_LABEL, false, event, Some(event));
            persona.focus_event(event, tick);
            persona.react_to_event(event, &self.config.mood);
        }
        self.compress(due).await;

        let context = self.scenario.context();
        if let Some(consequence) =
            narrator::event_consequence(&self.services.llm, event, &context).await
        {
            self.append(None, WORLD_LABEL, &consequence, EntryKind::WorldConsequence);
            let due = self.remember_all(WORLD_LABEL, None, &consequence, |_| Origin::ActionResult);
            self.compress(due).await;
        }
    }

    fn reaction_window_open(&self) -> bool {
        self.active_event.is_some()
            && self.tick.saturating_sub(self.event_started_tick)
                <= self.config.scheduler.forced_reaction_ticks
    }

    async fn take_turn(&mut self) -> TickOutcome {
        let window_open = self.reaction_window_open();
        let ctx = SelectionContext {
            last_speaker: self.last_speaker.as_ref(),
            reaction_window_open: window_open,
            reacted: &self.reacted,
            gates: &self.config.gates,
        };
        let Some(idx) = select_speaker(&self.personas, &ctx, &mut self.rng) else {
            self.bus.publish(SessionEvent::TurnSkipped {
                tick: self.tick,
                speaker: None,
                reason: SkipReason::NoSpeaker,
            });
            return TickOutcome::Skipped(SkipReason::NoSpeaker);
        };
        let speaker_id = self.personas[idx].id.clone();

        let force_reaction = window_open && !self.reacted.contains(&speaker_id);
        let mode = if self.active_event.is_none()
            && self.topics.should_change(self.personas.len())
            && self.rng.gen_bool(self.config.scheduler.creativity_boost.clamp(0.0, 1.0))
        {
            TurnMode::NewTopic
        } else {
            TurnMode::Normal
        };

        let current_event = self
            .conversation
            .iter()
            .rev()
            .take(EVENT_LOOKBACK)
            .find(|e| e.is_event())
            .map(|e| e.text.clone());
        let recent: Vec<String> = self
            .conversation
            .iter()
            .rev()
            .take(PLAN_CONTEXT_ENTRIES)
            .rev()
            .map(|e| e.text.clone())
            .collect();
        if self.personas[idx].refresh_plan(&recent, current_event.as_deref())
            && let Some(plan) = &self.personas[idx].plan
        {
            tracing::debug!(speaker = %speaker_id, goal = %plan.goal, "plan updated");
        }

        let scenario_context = self.scenario.context();
        let phase_instruction = self.phases.instruction();
        let (speaker_name, others, messages) = {
            let registry = self.registry.read();
            let prompt = PromptContext {
                mode,
                scenario_context: &scenario_context,
                active_event: self.active_event.as_deref(),
                force_event_reaction: force_reaction,
                phase_instruction: &phase_instruction,
                conversation: &self.conversation,
                memory_window: self.config.scheduler.memory_window,
                max_context_tokens: self.config.scheduler.max_context_tokens,
                gates: &self.config.gates,
            };
            let messages = build_messages(&mut self.personas[idx], &registry, &prompt);
            let others: Vec<String> = self
                .personas
                .iter()
                .filter(|p| p.id != speaker_id)
                .map(|p| registry.name_of(&p.id))
                .collect();
            (registry.name_of(&speaker_id), others, messages)
        };

        let (recent_texts, own_texts) = self.repetition_texts(&speaker_id);
        let last_utterance = self
            .conversation
            .last()
            .filter(|e| !e.is_event())
            .map(|e| e.text.as_str());
        let request = TurnRequest {
            speaker: &self.personas[idx],
            speaker_name: &speaker_name,
            others: &others,
            messages: &messages,
            window: RepetitionWindow {
                recent: &recent_texts,
                own: &own_texts,
                last_utterance,
            },
            max_chars: self.config.scheduler.max_response_chars,
            retries: self.config.scheduler.gate_retries,
            gates: &self.config.gates,
        };

        match generate_turn(&self.services.llm, &request, &mut self.rng).await {
            Ok(text) => {
                let turn = AcceptedTurn {
                    idx,
                    speaker_id,
                    speaker_name,
                    text,
                    mode,
                    force_reaction,
                    current_event,
                    scenario_context,
                };
                TickOutcome::Spoke(self.accept(turn).await)
            }
            Err(reason) => {
                tracing::info!(speaker = %speaker_name, reason = %reason, "turn skipped");
                for persona in &mut self.personas {
                    persona.on_silent(&mut self.rng);
                }
                self.bus.publish(SessionEvent::TurnSkipped {
                    tick: self.tick,
                    speaker: Some(speaker_id),
                    reason,
                });
                TickOutcome::Skipped(reason)
            }
        }
    }

    /// Recent non-event texts by anyone, and the speaker's own.
    pub(super) fn repetition_texts(&self, speaker: &PersonaId) -> (Vec<String>, Vec<String>) {
        let tail = |n: usize| &self.conversation[self.conversation.len().saturating_sub(n)..];
        let recent = tail(RECENT_WINDOW)
            .iter()
            .filter(|e| !e.is_event() && !e.text.is_empty())
            .map(|e| e.text.clone())
            .collect();
        let own = tail(OWN_WINDOW)
            .iter()
            .filter(|e| e.is_from(speaker) && !e.is_event())
            .map(|e| e.text.clone())
            .collect();
        (recent, own)
    }

    async fn accept(&mut self, turn: AcceptedTurn) -> ConversationEntry {
        let AcceptedTurn {
            idx,
            speaker_id,
            speaker_name,
            text,
            mode,
            force_reaction,
            current_event,
            scenario_context,
        } = turn;
        let tick = self.tick;

        self.personas[idx].track_phrases(&text, &self.config.gates);
        if self.active_event.is_some() {
            self.reacted.insert(speaker_id.clone());
        }
        self.personas[idx].memory.record_action(&text);

        if let Some(ability) =
            abilities::check(&mut self.personas[idx], self.active_event.as_deref(), &mut self.rng)
        {
            self.apply_ability(idx, &speaker_name, ability);
        }

        self.phases.record_decision(&text);
        self.phases.record_action(&text);

        if rules::is_group_decision(&text) {
            let decision = truncate_chars(&text, DECISION_CHARS);
            for persona in &mut self.personas {
                persona
                    .memory
                    .add_group_decision(tick, &speaker_name, Some(speaker_id.clone()), decision);
            }
        }

        let action_result = if rules::is_action(&text) {
            narrator::action_result(&self.services.llm, &speaker_name, &text, &scenario_context)
                .await
        } else {
            None
        };

        let new_topic = mode == TurnMode::NewTopic;
        if new_topic {
            self.topics.set_topic(text.clone());
            self.phases.start_new_topic(tick);
            self.world_dirty = true;
            self.bus.publish(SessionEvent::TopicChanged {
                tick,
                topic: text.clone(),
            });
        }

        let initiative = new_topic
            || force_reaction
            || (!self.personas[idx].memory.has_pending_questions() && rules::is_initiative(&text));

        let entry = self.append(
            Some(speaker_id.clone()),
            &speaker_name,
            &text,
            EntryKind::Utterance {
                initiative,
                new_topic,
            },
        );
        self.topics.record_message(&speaker_name);
        self.personas[idx].memory.clear_pending_questions();

        let mut due = Vec::new();
        if let Some(result) = &action_result {
            tracing::info!(speaker = %speaker_name, result = %result, "action result");
            self.append(
                None,
                RESULT_LABEL,
                &format!("{speaker_name}: {result}"),
                EntryKind::ActionResult,
            );
            due.extend(self.remember_all(&speaker_name, Some(&speaker_id), result, |_| {
                Origin::ActionResult
            }));
        }

        let mut record = RecordBuilder::new(
            telemetry_event(mode, force_reaction),
            self.owner_id.clone(),
            tick,
            text.clone(),
        )
        .initiative(initiative)
        .new_topic(new_topic)
        .action_result(action_result);
        for change in self.apply_sentiment(idx, &speaker_name, &text) {
            record = record.sentiment(change.target, change.delta, change.reason);
        }

        due.extend(self.remember_all(&speaker_name, Some(&speaker_id), &text, |p| {
            if p.id == speaker_id {
                Origin::Own
            } else {
                Origin::Other
            }
        }));
        for persona in &mut self.personas {
            let is_self = persona.id == speaker_id;
            persona.observe(tick, &speaker_name, is_self, &text, current_event.as_deref());
        }
        self.personas[idx].advance_plan(&text);

        {
            let registry = self.registry.read();
            let context = simulation_context(
                self.scenario.scenario(),
                self.active_event.as_deref(),
                self.topics.current(),
                self.phases.phase(),
            );
            let record = record.build(&self.personas[idx], &self.personas, &registry, context);
            emit_detached(
                Arc::clone(&self.services.telemetry),
                record,
                Duration::from_secs(self.config.telemetry.timeout_secs),
            );
        }

        for persona in &mut self.personas {
            let spoke = persona.id == speaker_id;
            if spoke {
                persona.on_spoke(&mut self.rng);
            } else {
                persona.on_silent(&mut self.rng);
            }
            persona.settle_mood(spoke, &self.config.mood);
        }
        self.last_speaker = Some(speaker_id);

        self.compress(due).await;
        entry
    }

    /// Apply the sentiment of an utterance to both ends of every edge it
    /// touches. Returns what the speaker felt, for telemetry.
    fn apply_sentiment(
        &mut self,
        idx: usize,
        speaker_name: &str,
        text: &str,
    ) -> Vec<sentiment::Sentiment> {
        let scan = {
            let registry = self.registry.read();
            sentiment::analyze(
                text,
                &self.personas[idx],
                &self.personas,
                &registry,
                self.config.relationships.change_rate,
            )
        };
        let tick = self.tick;
        let speaker_id = self.personas[idx].id.clone();
        let factor = self.config.relationships.reciprocal_factor;

        if scan.speaker_anger > 0.0 {
            let mood = &mut self.personas[idx].mood;
            mood.anger += scan.speaker_anger;
            mood.clamp();
        }

        for change in &scan.sentiments {
            let speaker = &mut self.personas[idx];
            speaker.update_relationship(tick, &change.target, change.delta, &change.reason, false);
            speaker.react_to_interaction(change.delta, &self.config.mood);

            if let Some(target) = self.personas.iter_mut().find(|p| p.id == change.target) {
                let reciprocal = change.delta * factor;
                let tone = if change.delta > 0.0 { "positive" } else { "negative" };
                target.update_relationship(
                    tick,
                    &speaker_id,
                    reciprocal,
                    &format!("{tone} from {speaker_name}"),
                    true,
                );
                target.react_to_interaction(reciprocal, &self.config.mood);
            }
            tracing::debug!(
                speaker = %speaker_name,
                target = %change.target,
                delta = change.delta,
                reason = %change.reason,
                "relationship shifted"
            );
        }
        scan.sentiments
    }

    fn apply_ability(&mut self, idx: usize, speaker_name: &str, ability: Ability) {
        let description = ability.describe(speaker_name);
        tracing::info!(speaker = %speaker_name, ability = %description, "species ability");
        if ability != Ability::Betrayal {
            return;
        }
        let tick = self.tick;
        let traitor = self.personas[idx].id.clone();
        for persona in self.personas.iter_mut().filter(|p| p.id != traitor) {
            persona.update_relationship(tick, &traitor, BETRAYAL_EDGE, "betrayal", false);
            persona.mood.anger += BETRAYAL_ANGER;
            persona.mood.clamp();
        }
        self.append(None, MODERATOR_LABEL, &description, EntryKind::Notice);
    }

    // -----------------------------------------------------------------------
    // Shared helpers
    // -----------------------------------------------------------------------

    /// Append to the shared log and announce it.
    pub(super) fn append(
        &mut self,
        speaker_id: Option<PersonaId>,
        label: &str,
        text: &str,
        kind: EntryKind,
    ) -> ConversationEntry {
        let entry = ConversationEntry {
            tick: self.tick,
            speaker_id,
            speaker_label: label.to_string(),
            text: text.to_string(),
            kind,
        };
        self.conversation.push(entry.clone());
        self.bus.publish(SessionEvent::EntryAppended {
            entry: entry.clone(),
        });
        entry
    }

    /// Store `text` in every persona's memory. Returns the indices whose
    /// memory asked for compression.
    pub(super) fn remember_all(
        &mut self,
        label: &str,
        speaker_id: Option<&PersonaId>,
        text: &str,
        origin: impl Fn(&Persona) -> Origin,
    ) -> Vec<usize> {
        let registry = self.registry.read();
        let tick = self.tick;
        self.personas
            .iter_mut()
            .enumerate()
            .filter_map(|(i, persona)| {
                let origin = origin(&*persona);
                let outcome =
                    persona.process_message(tick, label, speaker_id, text, origin, &registry);
                (outcome == AddOutcome::CompressionDue).then_some(i)
            })
            .collect()
    }

    pub(super) async fn compress(&mut self, mut due: Vec<usize>) {
        due.sort_unstable();
        due.dedup();
        for idx in due {
            let Some(persona) = self.personas.get_mut(idx) else {
                continue;
            };
            let report = persona.memory.compress(&self.services.llm).await;
            tracing::debug!(
                persona = %persona.id,
                before = report.before,
                after = report.after,
                summaries = report.summaries,
                failed = report.failed_summaries,
                "memory compressed"
            );
        }
    }

    pub(super) fn find_index(&self, id: &PersonaId) -> Option<usize> {
        self.personas.iter().position(|p| &p.id == id)
    }
}

/// What the gates let through, plus the turn context the fan-out needs.
struct AcceptedTurn {
    idx: usize,
    speaker_id: PersonaId,
    speaker_name: String,
    text: String,
    mode: TurnMode,
    force_reaction: bool,
    current_event: Option<String>,
    scenario_context: String,
}

fn telemetry_event(mode: TurnMode, force_reaction: bool) -> TelemetryEventType {
    match mode {
        TurnMode::NewTopic => TelemetryEventType::NewTopic,
        TurnMode::Normal if force_reaction => TelemetryEventType::EventReaction,
        TurnMode::Normal => TelemetryEventType::MessageSent,
    }
}
