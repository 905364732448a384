//! Dynamic state of a single persona.

use std::collections::{BTreeMap, HashSet, VecDeque};

use rand::Rng;

use colloquy_types::config::{GateConfig, MemoryConfig, MoodConfig};
use colloquy_types::memory::MemoryKind;
use colloquy_types::mood::Mood;
use colloquy_types::persona::{
    Archetype, BigFive, Demographics, PersonaId, PersonaProfile, Species, SpeciesModifiers,
};
use colloquy_types::plan::Plan;
use colloquy_types::relationship::RelationshipChange;

use crate::affect;
use crate::dialogue::derive_plan;
use crate::gate::is_consecutive_repeat;
use crate::memory::{AddOutcome, NewMemory, PersonaMemory};
use crate::persona::registry::NameRegistry;
use crate::text::{extract_phrases, truncate_chars};

const MAX_OBSERVATIONS: usize = 5;
const MAX_RELATIONSHIP_LOG: usize = 10;
const LOGGED_DELTA: f64 = 0.03;

/// Where an incoming memory came from, relative to the persona storing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Own,
    Other,
    Event,
    ActionResult,
}

impl Origin {
    fn base_importance(self) -> f64 {
        match self {
            Origin::Other => 0.4,
            Origin::Own => 0.55,
            Origin::Event => 0.85,
            Origin::ActionResult => 0.7,
        }
    }

    fn kind(self) -> MemoryKind {
        match self {
            Origin::Event => MemoryKind::Event,
            Origin::ActionResult => MemoryKind::ActionResult,
            Origin::Own | Origin::Other => MemoryKind::Speech,
        }
    }
}

/// One persona: static traits plus everything that changes tick to tick.
///
/// The display name lives in the session's [`NameRegistry`]; a persona
/// only knows its stable id.
#[derive(Debug, Clone)]
pub struct Persona {
    pub id: PersonaId,
    pub species: Species,
    pub archetype: Archetype,
    pub traits: BigFive,
    pub demographics: Demographics,
    pub mood: Mood,
    pub memory: PersonaMemory,
    pub plan: Option<Plan>,

    talkativeness: f64,
    recovery_rate: f64,
    depletion_rate: f64,
    pub ticks_silent: u32,
    pub messages_spoken: u32,

    relationships: BTreeMap<PersonaId, f64>,
    relationship_log: VecDeque<RelationshipChange>,

    pub consecutive_similar: u32,
    last_phrases: HashSet<String>,

    observations: Vec<String>,
    last_event: Option<String>,
    active_event: Option<String>,
    event_focus_tick: u64,
}

impl Persona {
    pub fn new<R: Rng>(
        id: PersonaId,
        profile: &PersonaProfile,
        memory_config: MemoryConfig,
        rng: &mut R,
    ) -> Self {
        let base = profile
            .traits
            .unwrap_or_else(|| profile.archetype.default_traits());
        let traits = base.with_offsets(&profile.species.modifiers());
        let memory = PersonaMemory::new(id.clone(), memory_config);
        Self::assemble(id, profile, traits, memory, rng)
    }

    /// Rebuild a persona around memory restored from storage.
    pub fn with_memory<R: Rng>(
        id: PersonaId,
        profile: &PersonaProfile,
        memory: PersonaMemory,
        rng: &mut R,
    ) -> Self {
        let base = profile
            .traits
            .unwrap_or_else(|| profile.archetype.default_traits());
        let traits = base.with_offsets(&profile.species.modifiers());
        Self::assemble(id, profile, traits, memory, rng)
    }

    fn assemble<R: Rng>(
        id: PersonaId,
        profile: &PersonaProfile,
        traits: BigFive,
        memory: PersonaMemory,
        rng: &mut R,
    ) -> Self {
        let e = traits.e();
        let calm = 1.0 - traits.n();
        Self {
            id,
            species: profile.species,
            archetype: profile.archetype,
            traits,
            demographics: profile.demographics.clone(),
            mood: affect::from_traits(&traits),
            memory,
            plan: None,
            talkativeness: (e + rng.gen_range(-0.2..=0.2)).clamp(0.1, 0.7),
            recovery_rate: 0.03 + (e * 0.7 + calm * 0.3) * 0.08,
            depletion_rate: 0.08 + traits.n() * 0.20 + (1.0 - e) * 0.12,
            ticks_silent: 0,
            messages_spoken: 0,
            relationships: BTreeMap::new(),
            relationship_log: VecDeque::new(),
            consecutive_similar: 0,
            last_phrases: HashSet::new(),
            observations: Vec::new(),
            last_event: None,
            active_event: None,
            event_focus_tick: 0,
        }
    }

    pub fn modifiers(&self) -> SpeciesModifiers {
        self.species.modifiers()
    }

    pub fn talkativeness(&self) -> f64 {
        self.talkativeness
    }

    // -----------------------------------------------------------------------
    // Talkativeness
    // -----------------------------------------------------------------------

    /// Recover a little willingness to talk after a silent tick.
    pub fn on_silent<R: Rng>(&mut self, rng: &mut R) {
        self.ticks_silent += 1;
        let mut recovery = if self.ticks_silent < 3 {
            self.recovery_rate * rng.gen_range(0.3..0.7)
        } else {
            let boost = 1.0 + f64::from(self.ticks_silent) * 0.05;
            self.recovery_rate * rng.gen_range(0.8..1.5) * boost
        };
        if self.ticks_silent >= 10 && self.ticks_silent % 10 == 0 && self.talkativeness < 0.5 {
            recovery += rng.gen_range(0.15..0.25);
        }
        self.talkativeness = (self.talkativeness + recovery).min(0.75);
    }

    /// Spend talkativeness after speaking; every fifth message tires more.
    pub fn on_spoke<R: Rng>(&mut self, rng: &mut R) {
        self.ticks_silent = 0;
        self.messages_spoken += 1;
        let introvert = 1.6 - self.traits.e() * 1.2;
        let mut depletion = self.depletion_rate * rng.gen_range(0.8..1.2) * introvert;
        if self.messages_spoken % 5 == 0 {
            depletion += rng.gen_range(0.1..0.2);
        }
        self.talkativeness = (self.talkativeness - depletion).max(0.05);
    }

    /// Probability this persona wants the floor, in [0.3, 0.99].
    pub fn speak_probability<R: Rng>(&self, rng: &mut R) -> f64 {
        if self.memory.has_pending_questions() {
            return 0.95;
        }
        if self.ticks_silent >= 4 {
            return 0.99;
        }
        let base = 0.5 + self.talkativeness * 0.5;
        let silence_boost = f64::from(self.ticks_silent) * 0.2;
        let extraversion = match self.traits.extraversion {
            e if e > 70 => 1.3,
            e if e < 30 => 0.8,
            _ => 1.0,
        };
        let mood = affect::talkativeness_modifier(&self.mood, &self.traits);
        let total = (base + silence_boost) * extraversion * mood;
        (total + rng.gen_range(-0.05..0.10)).clamp(0.30, 0.95)
    }

    // -----------------------------------------------------------------------
    // Mood
    // -----------------------------------------------------------------------

    pub fn react_to_event(&mut self, text: &str, config: &MoodConfig) {
        self.mood = affect::apply_event(&self.mood, text, &self.traits, &self.modifiers(), config);
    }

    pub fn react_to_interaction(&mut self, delta: f64, config: &MoodConfig) {
        self.mood = affect::apply_interaction(&self.mood, delta, &self.traits, config);
    }

    pub fn settle_mood(&mut self, spoke: bool, config: &MoodConfig) {
        if spoke {
            self.mood = affect::apply_speaking(&self.mood, &self.traits);
        }
        self.mood = affect::decay_toward_baseline(&self.mood, &self.traits, config);
    }

    // -----------------------------------------------------------------------
    // Memory intake
    // -----------------------------------------------------------------------

    /// Store something this persona witnessed.
    ///
    /// Importance starts from the origin, shifts with the relationship to the
    /// speaker and with length, and rises when this persona is named. Being
    /// named in a question queues it as pending.
    pub fn process_message(
        &mut self,
        tick: u64,
        speaker_label: &str,
        speaker_id: Option<&PersonaId>,
        text: &str,
        origin: Origin,
        registry: &NameRegistry,
    ) -> AddOutcome {
        let mut importance = origin.base_importance();
        if let Some(id) = speaker_id
            && let Some(value) = self.relationships.get(id)
        {
            importance = (importance + value * 0.05).clamp(0.0, 1.0);
        }
        if text.chars().count() > 100 {
            importance = (importance + 0.05).min(1.0);
        }

        let mut addressee = None;
        let my_name = registry.name_of(&self.id);
        if origin != Origin::Own && text.to_lowercase().contains(&my_name.to_lowercase()) {
            addressee = Some(self.id.clone());
            importance = (importance + 0.15).min(1.0);
            if text.contains('?') {
                self.memory
                    .add_pending_question(tick, speaker_label, speaker_id.cloned(), text);
            }
        }

        let mut new = NewMemory::new(tick, speaker_label, text)
            .importance(importance)
            .kind(origin.kind())
            .addressee(addressee);
        if let Some(id) = speaker_id {
            new = new.speaker(id.clone());
        }
        self.memory.add(new)
    }

    /// Note what others said and latch onto a newly seen event.
    pub fn observe(
        &mut self,
        tick: u64,
        speaker_label: &str,
        is_self: bool,
        message: &str,
        current_event: Option<&str>,
    ) {
        if !is_self {
            self.observations.push(format!(
                "[tick {tick}] {speaker_label}: {}",
                truncate_chars(message, 100)
            ));
            if self.observations.len() > MAX_OBSERVATIONS {
                self.observations.remove(0);
            }
        }
        if let Some(event) = current_event
            && self.last_event.as_deref() != Some(event)
        {
            self.last_event = Some(event.to_string());
            self.focus_event(event, tick);
            if let Some(plan) = self.plan.as_mut() {
                plan.adaptations.push(format!("Event: {event}"));
            }
        }
    }

    pub fn focus_event(&mut self, event: &str, tick: u64) {
        self.active_event = Some(event.to_string());
        self.event_focus_tick = tick;
    }

    pub fn clear_event(&mut self) {
        self.active_event = None;
    }

    pub fn active_event(&self) -> Option<&str> {
        self.active_event.as_deref()
    }

    pub fn last_event(&self) -> Option<&str> {
        self.last_event.as_deref()
    }

    pub fn observations(&self) -> &[String] {
        &self.observations
    }

    pub fn is_event_active(&self, tick: u64, focus_ticks: u64) -> bool {
        self.active_event.is_some() && tick.saturating_sub(self.event_focus_tick) <= focus_ticks
    }

    // -----------------------------------------------------------------------
    // Relationships
    // -----------------------------------------------------------------------

    pub fn relationships(&self) -> &BTreeMap<PersonaId, f64> {
        &self.relationships
    }

    pub fn relationship(&self, other: &PersonaId) -> f64 {
        self.relationships.get(other).copied().unwrap_or(0.0)
    }

    pub fn relationship_log(&self) -> impl Iterator<Item = &RelationshipChange> {
        self.relationship_log.iter()
    }

    /// Seed an edge without logging it.
    pub fn set_relationship(&mut self, other: PersonaId, value: f64) {
        self.relationships.insert(other, value.clamp(-1.0, 1.0));
    }

    pub fn forget(&mut self, other: &PersonaId) {
        self.relationships.remove(other);
        self.relationship_log.retain(|c| &c.other != other);
        self.memory.forget_questions_from(other);
    }

    /// Shift the edge toward `other`. Stubborn species move half as far,
    /// diplomatic ones further. Returns the applied change.
    pub fn update_relationship(
        &mut self,
        tick: u64,
        other: &PersonaId,
        delta: f64,
        reason: &str,
        reciprocal: bool,
    ) -> f64 {
        let mods = self.modifiers();
        let mut delta = delta;
        if mods.stubborn {
            delta *= 0.5;
        }
        if mods.diplomacy_bonus > 0.0 {
            delta *= 1.0 + mods.diplomacy_bonus;
        }
        let before = self.relationship(other);
        let after = (before + delta).clamp(-1.0, 1.0);
        self.relationships.insert(other.clone(), after);
        if delta.abs() >= LOGGED_DELTA {
            self.relationship_log.push_back(RelationshipChange {
                tick,
                other: other.clone(),
                before,
                after,
                reason: reason.to_string(),
                reciprocal,
            });
            while self.relationship_log.len() > MAX_RELATIONSHIP_LOG {
                self.relationship_log.pop_front();
            }
        }
        after - before
    }

    /// Compact `Name:+0.3[~]` list for the prompt.
    pub fn relationship_summary(&self, registry: &NameRegistry) -> String {
        if self.relationships.is_empty() {
            return "no data".to_string();
        }
        self.relationships
            .iter()
            .map(|(id, value)| {
                let mark = match *value {
                    v if v > 0.5 => "[+]",
                    v if v > 0.2 => "[~]",
                    v if v > -0.2 => "[=]",
                    v if v > -0.5 => "[-]",
                    _ => "[!]",
                };
                format!("{}:{value:+.1}{mark}", registry.name_of(id))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    // -----------------------------------------------------------------------
    // Repetition tracking
    // -----------------------------------------------------------------------

    /// Track whether this utterance repeats the previous one.
    pub fn track_phrases(&mut self, text: &str, gates: &GateConfig) {
        let phrases = extract_phrases(text);
        if !self.last_phrases.is_empty() {
            if is_consecutive_repeat(&self.last_phrases, &phrases, text, gates) {
                self.consecutive_similar += 1;
            } else {
                self.consecutive_similar = 0;
            }
        }
        self.last_phrases = phrases;
    }

    pub fn is_repeating(&self, gates: &GateConfig) -> bool {
        self.consecutive_similar >= gates.consecutive_limit
    }

    // -----------------------------------------------------------------------
    // Plans
    // -----------------------------------------------------------------------

    /// Re-derive the plan when there is none, a new event is not reflected
    /// in the goal, or the current plan has run out of steps.
    pub fn refresh_plan(&mut self, recent: &[String], current_event: Option<&str>) -> bool {
        let stale = match (&self.plan, current_event) {
            (None, _) => true,
            (Some(plan), _) if plan.is_complete() => true,
            (Some(plan), Some(event)) => {
                let head: String = event.to_lowercase().chars().take(30).collect();
                !plan.goal.to_lowercase().contains(&head)
            }
            (Some(_), None) => false,
        };
        if !stale {
            return false;
        }
        let old_goal = self.plan.as_ref().map(|p| p.goal.clone());
        if let Some(mut plan) =
            derive_plan(self.plan.as_ref(), self.last_event.as_deref(), recent, self.archetype)
        {
            plan.adaptations = self.observations.clone();
            self.plan = Some(plan);
        }
        self.plan.as_ref().map(|p| p.goal.clone()) != old_goal
    }

    /// Move to the next step when the utterance touches the current one.
    pub fn advance_plan(&mut self, text: &str) {
        let Some(plan) = self.plan.as_mut() else {
            return;
        };
        let Some(step) = plan.current_step() else {
            return;
        };
        let lower = text.to_lowercase();
        let matches_step = step
            .to_lowercase()
            .split_whitespace()
            .filter(|w| w.chars().count() > 3)
            .any(|w| lower.contains(w));
        if matches_step || plan.cursor == 0 {
            plan.advance();
        }
    }
}
