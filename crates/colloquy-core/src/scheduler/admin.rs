//! Operator-facing operations on a running engine.
//!
//! The session actor holds the engine lock for the duration of each call,
//! so none of these interleave with a tick.

use serde::Serialize;

use colloquy_types::conversation::{ConversationEntry, EntryKind};
use colloquy_types::error::{RegistryError, SessionError};
use colloquy_types::event::SessionEvent;
use colloquy_types::llm::{Message, MessageRole};
use colloquy_types::mood::Emotion;
use colloquy_types::persona::{Archetype, Demographics, Gender, PersonaId, PersonaProfile, Species};
use colloquy_types::telemetry::PersonaSnapshot;

use crate::affect;
use crate::gate::RepetitionWindow;
use crate::persona::{Origin, Persona, PromptContext, TurnMode, build_messages, connect_newcomer};
use crate::presets::newcomer_profile;
use crate::scheduler::engine::{DialogueEngine, MODERATOR_LABEL};
use crate::scheduler::turn::{TurnRequest, generate_reply};
use crate::telemetry::persona_snapshot;

pub(crate) const OPERATOR_LABEL: &str = "Operator";
const JOIN_CONTEXT_ENTRIES: usize = 10;

/// Who a direct operator message is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageTarget {
    Everyone,
    Named(Vec<String>),
}

/// A persona's answer to a direct operator message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub persona_id: PersonaId,
    pub name: String,
    pub text: String,
    pub tick: u64,
    pub species: Species,
    pub mood: Emotion,
}

/// Request to add a persona mid-session.
#[derive(Debug, Clone)]
pub struct NewPersona {
    pub name: String,
    pub species: Species,
    pub archetype: Archetype,
    /// Randomized from the species when absent.
    pub demographics: Option<Demographics>,
}

/// Names a persona carried before its current one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormerNames {
    pub persona_id: PersonaId,
    pub name: String,
    /// Oldest first.
    pub former: Vec<String>,
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub owner_id: String,
    pub tick: u64,
    pub tick_delay_secs: f64,
    pub scenario: String,
    pub phase: String,
    pub phase_label: String,
    pub topic: Option<String>,
    pub active_event: Option<String>,
    pub entries: usize,
    pub personas: Vec<PersonaSnapshot>,
    /// Only personas that were renamed appear here.
    pub renamed: Vec<FormerNames>,
}

impl DialogueEngine {
    /// Inject a world event from the operator.
    #[tracing::instrument(skip(self, text), fields(owner = %self.owner_id))]
    pub async fn inject_event(&mut self, text: &str) -> Result<(), SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::InvalidValue("event text is empty".into()));
        }
        tracing::info!(event = %text, "operator event");
        self.scenario.record(text);
        self.apply_event(text, EntryKind::OperatorEvent).await;
        self.persist_dirty().await;
        Ok(())
    }

    /// Send a message straight to some personas and collect their answers.
    ///
    /// Everyone hears the message; only targets answer. A target whose
    /// answer fails generation or the quality gate stays silent.
    #[tracing::instrument(skip(self, text, target), fields(owner = %self.owner_id))]
    pub async fn inject_message(
        &mut self,
        text: &str,
        target: &MessageTarget,
    ) -> Result<Vec<Reply>, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::InvalidValue("message text is empty".into()));
        }
        let targets = self.resolve_targets(target)?;
        let personal = targets.len() == 1;

        self.append(None, OPERATOR_LABEL, text, EntryKind::OperatorMessage);
        let due = self.remember_all(OPERATOR_LABEL, None, text, |_| Origin::Other);
        let tick = self.tick;
        for persona in self.personas.iter_mut().filter(|p| targets.contains(&p.id)) {
            // A question naming the persona was already queued by process_message.
            let queued = persona
                .memory
                .pending_questions()
                .iter()
                .any(|q| q.tick == tick && q.from_id.is_none());
            if !queued {
                persona.memory.add_pending_question(tick, OPERATOR_LABEL, None, text);
            }
        }
        self.compress(due).await;

        let mut replies = Vec::new();
        for id in targets {
            if let Some(reply) = self.answer_operator(&id, text, personal).await {
                replies.push(reply);
            }
        }
        self.persist_dirty().await;
        Ok(replies)
    }

    fn resolve_targets(&self, target: &MessageTarget) -> Result<Vec<PersonaId>, SessionError> {
        match target {
            MessageTarget::Everyone => Ok(self.personas.iter().map(|p| p.id.clone()).collect()),
            MessageTarget::Named(names) => {
                let registry = self.registry.read();
                let mut ids = Vec::with_capacity(names.len());
                for name in names {
                    let id = registry
                        .resolve(name)
                        .ok_or_else(|| SessionError::PersonaNotFound(name.clone()))?;
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
                Ok(ids)
            }
        }
    }

    async fn answer_operator(&mut self, id: &PersonaId, message: &str, personal: bool) -> Option<Reply> {
        let idx = self.find_index(id)?;
        let scenario_context = self.scenario.context();
        let phase_instruction = self.phases.instruction();
        let (name, others, messages) = {
            let registry = self.registry.read();
            let prompt = PromptContext {
                mode: TurnMode::Normal,
                scenario_context: &scenario_context,
                active_event: self.active_event.as_deref(),
                force_event_reaction: false,
                phase_instruction: &phase_instruction,
                conversation: &self.conversation,
                memory_window: self.config.scheduler.memory_window,
                max_context_tokens: self.config.scheduler.max_context_tokens,
                gates: &self.config.gates,
            };
            let mut messages = build_messages(&mut self.personas[idx], &registry, &prompt);
            let name = registry.name_of(id);
            let closing = format!(
                "The operator speaks {}: '{message}'. You are {name}. Answer the operator directly. {} \
                 1-3 sentences. Do not write for others.",
                if personal { "to you personally" } else { "to everyone" },
                if personal {
                    "This is a personal message, answer in detail."
                } else {
                    "Give your opinion."
                },
            );
            if messages.last().is_some_and(|m| m.role == MessageRole::User) {
                messages.pop();
            }
            messages.push(Message::user(closing));
            let others: Vec<String> = self
                .personas
                .iter()
                .filter(|p| &p.id != id)
                .map(|p| registry.name_of(&p.id))
                .collect();
            (name, others, messages)
        };

        let request = TurnRequest {
            speaker: &self.personas[idx],
            speaker_name: &name,
            others: &others,
            messages: &messages,
            window: RepetitionWindow {
                recent: &[],
                own: &[],
                last_utterance: None,
            },
            max_chars: self.config.scheduler.max_response_chars,
            retries: 0,
            gates: &self.config.gates,
        };
        let text = generate_reply(&self.services.llm, &request, message).await?;

        let entry = self.append(
            Some(id.clone()),
            &name,
            &text,
            EntryKind::Utterance {
                initiative: false,
                new_topic: false,
            },
        );
        self.topics.record_message(&name);
        let due = self.remember_all(&name, Some(id), &text, |p| {
            if &p.id == id {
                Origin::Own
            } else {
                Origin::Other
            }
        });
        let persona = &mut self.personas[idx];
        persona.memory.clear_pending_questions();
        persona.on_spoke(&mut self.rng);
        persona.memory.record_action(&text);
        let reply = Reply {
            persona_id: id.clone(),
            name,
            text,
            tick: entry.tick,
            species: persona.species,
            mood: affect::dominant_emotion(&persona.mood),
        };
        self.compress(due).await;
        Some(reply)
    }

    /// Add a persona to the running session.
    #[tracing::instrument(skip(self, request), fields(owner = %self.owner_id, name = %request.name))]
    pub async fn add_persona(&mut self, request: NewPersona) -> Result<PersonaId, SessionError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(SessionError::InvalidValue("persona name is empty".into()));
        }
        if self.registry.read().id_of(&name).is_some() {
            return Err(SessionError::PersonaExists(name));
        }

        let profile = match request.demographics {
            Some(demographics) => PersonaProfile {
                name: name.clone(),
                species: request.species,
                archetype: request.archetype,
                demographics,
                traits: None,
            },
            None => newcomer_profile(&name, request.species, request.archetype, &mut self.rng),
        };

        self.next_index += 1;
        let id = PersonaId::numbered(self.next_index);
        self.registry
            .write()
            .register(id.clone(), &name)
            .map_err(|_| SessionError::PersonaExists(name.clone()))?;

        let mut newcomer = Persona::new(id.clone(), &profile, self.config.memory.clone(), &mut self.rng);
        connect_newcomer(&mut newcomer, &mut self.personas, &self.config.relationships, &mut self.rng);
        {
            let registry = self.registry.read();
            let start = self.conversation.len().saturating_sub(JOIN_CONTEXT_ENTRIES);
            for entry in &self.conversation[start..] {
                let origin = if entry.is_event() {
                    Origin::Event
                } else {
                    Origin::Other
                };
                newcomer.process_message(
                    entry.tick,
                    &entry.speaker_label,
                    entry.speaker_id.as_ref(),
                    &entry.text,
                    origin,
                    &registry,
                );
            }
        }
        self.personas.push(newcomer);

        let gender = match profile.demographics.gender {
            Gender::Male => "M",
            Gender::Female => "F",
        };
        let notice = format!(
            "{name} ({}, {gender}, {} years old) joins the group!",
            profile.species, profile.demographics.age
        );
        self.append(None, MODERATOR_LABEL, &notice, EntryKind::Notice);
        let due = self.remember_all(MODERATOR_LABEL, None, &notice, |_| Origin::Event);
        self.compress(due).await;

        tracing::info!(persona = %id, species = %profile.species, "persona joined");
        self.bus.publish(SessionEvent::PersonaJoined {
            id: id.clone(),
            name,
        });
        self.persist_dirty().await;
        Ok(id)
    }

    /// Remove a persona; at least two must remain.
    #[tracing::instrument(skip(self), fields(owner = %self.owner_id))]
    pub async fn remove_persona(&mut self, name: &str) -> Result<PersonaId, SessionError> {
        let id = self
            .registry
            .resolve(name)
            .ok_or_else(|| SessionError::PersonaNotFound(name.to_string()))?;
        let idx = self
            .find_index(&id)
            .ok_or_else(|| SessionError::PersonaNotFound(name.to_string()))?;
        if self.personas.len() <= 2 {
            return Err(SessionError::TooFewPersonas(self.personas.len()));
        }

        if let Err(e) = self.save_persona(idx).await {
            tracing::warn!(persona = %id, error = %e, "memory save before removal failed");
        }

        let leaving = self.personas.remove(idx);
        let display = self
            .registry
            .write()
            .unregister(&id)
            .unwrap_or_else(|| id.to_string());
        for persona in &mut self.personas {
            persona.forget(&id);
        }
        self.reacted.remove(&id);
        if self.last_speaker.as_ref() == Some(&id) {
            self.last_speaker = None;
        }

        let notice = format!("{display} ({}) leaves the group.", leaving.species);
        self.append(None, MODERATOR_LABEL, &notice, EntryKind::Notice);
        let due = self.remember_all(MODERATOR_LABEL, None, &notice, |_| Origin::Event);
        self.compress(due).await;

        tracing::info!(persona = %id, "persona left");
        self.bus.publish(SessionEvent::PersonaLeft {
            id: id.clone(),
            name: display,
        });
        self.persist_dirty().await;
        Ok(id)
    }

    /// Rename a persona and rewrite every memory that mentions the old name.
    #[tracing::instrument(skip(self), fields(owner = %self.owner_id))]
    pub async fn rename_persona(&mut self, name: &str, new_name: &str) -> Result<(), SessionError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(SessionError::InvalidValue("new name is empty".into()));
        }
        let id = self
            .registry
            .resolve(name)
            .ok_or_else(|| SessionError::PersonaNotFound(name.to_string()))?;
        let old_name = self
            .registry
            .write()
            .rename(&id, new_name)
            .map_err(|e| match e {
                RegistryError::NameTaken(n) => SessionError::PersonaExists(n),
                RegistryError::NotRegistered(n) => SessionError::PersonaNotFound(n),
            })?;

        let mut rewritten = 0;
        for persona in &mut self.personas {
            rewritten += persona
                .memory
                .consolidate_rename(&old_name, new_name, &self.services.llm)
                .await;
        }
        tracing::info!(persona = %id, old = %old_name, new = %new_name, rewritten, "persona renamed");

        self.bus.publish(SessionEvent::PersonaRenamed {
            id,
            old_name,
            new_name: new_name.to_string(),
        });
        self.persist_dirty().await;
        Ok(())
    }

    /// Seconds between ticks; zero pauses the session.
    pub fn set_tick_delay(&mut self, seconds: f64) -> Result<(), SessionError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(SessionError::InvalidValue(format!("invalid tick delay: {seconds}")));
        }
        self.tick_delay = seconds;
        tracing::info!(owner = %self.owner_id, delay = seconds, "tick delay changed");
        Ok(())
    }

    pub fn stats(&self) -> SessionStats {
        let registry = self.registry.read();
        SessionStats {
            owner_id: self.owner_id.clone(),
            tick: self.tick,
            tick_delay_secs: self.tick_delay,
            scenario: self.scenario.scenario().key.clone(),
            phase: self.phases.phase().to_string(),
            phase_label: self.phases.phase().label().to_string(),
            topic: self.topics.current().map(str::to_string),
            active_event: self.active_event.clone(),
            entries: self.conversation.len(),
            personas: self
                .personas
                .iter()
                .map(|p| persona_snapshot(p, &registry))
                .collect(),
            renamed: self
                .personas
                .iter()
                .filter_map(|p| {
                    let mut former = registry.history(&p.id);
                    let name = former.pop()?;
                    (!former.is_empty()).then(|| FormerNames {
                        persona_id: p.id.clone(),
                        name,
                        former,
                    })
                })
                .collect(),
        }
    }

    /// Entries after `after_tick`, oldest first, at most `limit`.
    pub fn entries_after(&self, after_tick: Option<u64>, limit: usize) -> Vec<ConversationEntry> {
        let matching: Vec<&ConversationEntry> = self
            .conversation
            .iter()
            .filter(|e| after_tick.is_none_or(|t| e.tick > t))
            .collect();
        let start = matching.len().saturating_sub(limit);
        matching[start..].iter().map(|e| (*e).clone()).collect()
    }

    /// Save everything and announce the stop.
    pub async fn stop(&mut self) {
        if let Err(e) = self.save_all().await {
            tracing::warn!(owner = %self.owner_id, error = %e, "final save failed");
        }
        tracing::info!(owner = %self.owner_id, tick = self.tick, "session stopped");
        self.bus.publish(SessionEvent::Stopped { tick: self.tick });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colloquy_types::persona::{Archetype, Species};

    use crate::testing::{ScriptedProvider, harness, session_provider};

    fn newcomer(name: &str) -> NewPersona {
        NewPersona {
            name: name.into(),
            species: Species::Dwarf,
            archetype: Archetype::Stoic,
            demographics: Some(Demographics {
                gender: Gender::Male,
                age: 142,
                interests: "forging".into(),
                background: "miner".into(),
            }),
        }
    }

    #[tokio::test]
    async fn named_persona_answers_operator() {
        let mut h = harness(session_provider());
        let replies = h
            .engine
            .inject_message("What do you see out there?", &MessageTarget::Named(vec!["alice".into()]))
            .await
            .unwrap();

        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].name, "Alice");
        assert_eq!(replies[0].persona_id.as_str(), "agent_1");

        let log = h.engine.conversation();
        assert_eq!(log[0].kind, EntryKind::OperatorMessage);
        assert_eq!(log[0].speaker_label, OPERATOR_LABEL);
        assert_eq!(log[0].speaker_id, None);
        assert_eq!(log[1].text, replies[0].text);
        assert!(!h.engine.personas()[0].memory.has_pending_questions());

        let prompt = h.provider.requests().last().unwrap().messages.last().unwrap().content.clone();
        assert!(prompt.contains("to you personally"));
    }

    #[tokio::test]
    async fn everyone_answers_a_broadcast() {
        let mut h = harness(session_provider());
        let replies = h
            .engine
            .inject_message("How is everybody holding up?", &MessageTarget::Everyone)
            .await
            .unwrap();
        assert_eq!(replies.len(), 3);
        assert!(h.engine.personas().iter().all(|p| !p.memory.has_pending_questions()));
    }

    #[tokio::test]
    async fn unknown_target_is_rejected() {
        let mut h = harness(session_provider());
        let err = h
            .engine
            .inject_message("hello there friend", &MessageTarget::Named(vec!["Zed".into()]))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::PersonaNotFound(name) if name == "Zed"));
        assert!(h.engine.conversation().is_empty());
    }

    #[tokio::test]
    async fn failed_reply_stays_silent() {
        let mut h = harness(ScriptedProvider::new(["ok"]));
        let replies = h
            .engine
            .inject_message("Boris, talk to me?", &MessageTarget::Named(vec!["Boris".into()]))
            .await
            .unwrap();
        assert!(replies.is_empty());
        assert_eq!(h.engine.conversation().len(), 1);
    }

    #[tokio::test]
    async fn operator_event_becomes_active() {
        let mut h = harness(session_provider());
        h.engine.inject_event("  A ship appears on the horizon ").await.unwrap();

        assert_eq!(h.engine.active_event(), Some("A ship appears on the horizon"));
        let log = h.engine.conversation();
        assert_eq!(log[0].kind, EntryKind::OperatorEvent);
        assert_eq!(log[1].kind, EntryKind::WorldConsequence);
        assert!(h.engine.scenario().triggered().contains(&"A ship appears on the horizon".to_string()));

        assert!(matches!(
            h.engine.inject_event("   ").await,
            Err(SessionError::InvalidValue(_))
        ));
    }

    #[tokio::test]
    async fn newcomer_joins_with_relationships() {
        let mut h = harness(session_provider());
        h.engine.tick().await;

        let id = h.engine.add_persona(newcomer("Gimli")).await.unwrap();
        assert_eq!(id.as_str(), "agent_4");
        assert_eq!(h.engine.personas().len(), 4);

        let gimli = h.engine.personas().last().unwrap();
        assert_eq!(gimli.relationships().len(), 3);
        assert!(gimli.memory.total_len() >= 1);
        for other in &h.engine.personas()[..3] {
            assert!(other.relationships().contains_key(&id));
        }

        let notice = h.engine.conversation().last().unwrap();
        assert_eq!(notice.kind, EntryKind::Notice);
        assert_eq!(notice.text, "Gimli (dwarf, M, 142 years old) joins the group!");
    }

    #[tokio::test]
    async fn duplicate_newcomer_is_rejected() {
        let mut h = harness(session_provider());
        let err = h.engine.add_persona(newcomer("boris")).await.unwrap_err();
        assert!(matches!(err, SessionError::PersonaExists(_)));
        assert_eq!(h.engine.personas().len(), 3);
    }

    #[tokio::test]
    async fn ids_are_not_reused_after_removal() {
        let mut h = harness(session_provider());
        h.engine.add_persona(newcomer("Gimli")).await.unwrap();
        h.engine.remove_persona("Gimli").await.unwrap();
        let id = h.engine.add_persona(newcomer("Thorin")).await.unwrap();
        assert_eq!(id.as_str(), "agent_5");
    }

    #[tokio::test]
    async fn removal_keeps_two_personas() {
        let mut h = harness(session_provider());
        let gone = h.engine.remove_persona("Vicky").await.unwrap();

        assert_eq!(h.engine.personas().len(), 2);
        for persona in h.engine.personas() {
            assert!(!persona.relationships().contains_key(&gone));
        }
        assert!(h.engine.conversation().last().unwrap().text.contains("leaves the group"));
        assert!(h.store.records().iter().any(|r| r.agent_id == gone.as_str()));

        let err = h.engine.remove_persona("Boris").await.unwrap_err();
        assert!(matches!(err, SessionError::TooFewPersonas(2)));
        assert!(matches!(
            h.engine.remove_persona("Nobody").await,
            Err(SessionError::PersonaNotFound(_))
        ));
    }

    #[tokio::test]
    async fn rename_rewrites_memories() {
        let mut h = harness(session_provider());
        h.engine
            .inject_message("Alice, where is the water?", &MessageTarget::Everyone)
            .await
            .unwrap();

        h.engine.rename_persona("Alice", "Alicia").await.unwrap();

        assert_eq!(h.engine.registry().name_of(&PersonaId::numbered(1)), "Alicia");
        let renamed = h.engine.stats().renamed;
        assert_eq!(renamed.len(), 1);
        assert_eq!(renamed[0].persona_id, PersonaId::numbered(1));
        assert_eq!(renamed[0].name, "Alicia");
        assert_eq!(renamed[0].former, vec!["Alice".to_string()]);
        for persona in h.engine.personas() {
            let stale = persona
                .memory
                .short_term()
                .iter()
                .chain(persona.memory.long_term())
                .any(|m| m.text.contains("Alice") || m.speaker_label == "Alice");
            assert!(!stale, "{} still remembers the old name", persona.id);
        }

        assert!(matches!(
            h.engine.rename_persona("Alicia", "Boris").await,
            Err(SessionError::PersonaExists(_))
        ));
    }

    #[test]
    fn tick_delay_must_be_non_negative() {
        let mut h = harness(session_provider());
        assert!(h.engine.set_tick_delay(0.0).is_ok());
        assert!(h.engine.set_tick_delay(2.5).is_ok());
        assert_eq!(h.engine.tick_delay(), 2.5);
        assert!(matches!(h.engine.set_tick_delay(-1.0), Err(SessionError::InvalidValue(_))));
        assert!(h.engine.set_tick_delay(f64::NAN).is_err());
        assert_eq!(h.engine.tick_delay(), 2.5);
    }

    #[tokio::test]
    async fn entries_after_pages_from_the_tail() {
        let mut h = harness(session_provider());
        for _ in 0..4 {
            h.engine.tick().await;
        }
        let all = h.engine.entries_after(None, 100);
        assert!(!all.is_empty());

        let after_two = h.engine.entries_after(Some(2), 100);
        assert!(after_two.iter().all(|e| e.tick > 2));

        let last = h.engine.entries_after(None, 1);
        assert_eq!(last.len(), 1);
        assert_eq!(last[0], *all.last().unwrap());
    }

    #[tokio::test]
    async fn stats_describe_the_session() {
        let mut h = harness(session_provider());
        h.engine.tick().await;
        let stats = h.engine.stats();
        assert_eq!(stats.owner_id, "user-1");
        assert_eq!(stats.tick, 1);
        assert_eq!(stats.scenario, "desert_island");
        assert_eq!(stats.personas.len(), 3);
        assert!(stats.renamed.is_empty());
    }

    #[tokio::test]
    async fn stop_saves_and_announces() {
        let mut h = harness(session_provider());
        let mut events = h.engine.bus().subscribe();
        h.engine.stop().await;
        assert!(!h.store.records().is_empty());
        assert!(matches!(events.recv().await.unwrap(), SessionEvent::Stopped { tick: 0 }));
    }
}
