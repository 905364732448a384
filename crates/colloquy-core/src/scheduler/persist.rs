//! Saving and restoring a session through the record store.
//!
//! Each persona owns two records: its memory snapshot without the retrieval
//! documents, and the documents on their own. Scenario and topic state live
//! under [`SESSION_SCOPE`]. Every save is a full overwrite.

use colloquy_types::error::RepositoryError;
use colloquy_types::memory::{MemorySnapshot, RetrievalDocument};
use colloquy_types::scenario::{ScenarioState, TopicState};
use colloquy_types::storage::{RecordFilter, RecordKind, SESSION_SCOPE, StoredRecord};

use crate::dialogue::{ScenarioRunner, TopicTracker};
use crate::memory::PersonaMemory;
use crate::persona::Persona;
use crate::scheduler::engine::DialogueEngine;

fn to_payload<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, RepositoryError> {
    serde_json::to_value(value).map_err(|e| RepositoryError::Query(e.to_string()))
}

fn from_payload<T: serde::de::DeserializeOwned>(
    record: &StoredRecord,
) -> Result<T, RepositoryError> {
    serde_json::from_value(record.payload.clone()).map_err(|e| {
        RepositoryError::Query(format!("corrupt {} record: {e}", record.kind))
    })
}

/// The two records holding one persona's memory.
pub fn persona_records(owner_id: &str, persona: &Persona) -> Result<Vec<StoredRecord>, RepositoryError> {
    let mut snapshot = persona.memory.snapshot();
    let documents = std::mem::take(&mut snapshot.documents);
    Ok(vec![
        StoredRecord::new(owner_id, persona.id.as_str(), RecordKind::Memory, to_payload(&snapshot)?),
        StoredRecord::new(
            owner_id,
            persona.id.as_str(),
            RecordKind::RetrievalDocuments,
            to_payload(&documents)?,
        ),
    ])
}

impl DialogueEngine {
    /// Save every persona whose memory changed, plus session state when the
    /// scenario or topic moved. Failures leave the dirty flags set so the
    /// next tick tries again.
    pub(super) async fn persist_dirty(&mut self) {
        for idx in 0..self.personas.len() {
            if self.personas[idx].memory.is_dirty()
                && let Err(e) = self.save_persona(idx).await
            {
                tracing::warn!(persona = %self.personas[idx].id, error = %e, "memory save failed");
            }
        }

        if self.world_dirty {
            match self.save_world().await {
                Ok(()) => self.world_dirty = false,
                Err(e) => tracing::warn!(error = %e, "session state save failed"),
            }
        }
    }

    pub(super) async fn save_persona(&mut self, idx: usize) -> Result<(), RepositoryError> {
        let records = persona_records(&self.owner_id, &self.personas[idx])?;
        self.services.store.upsert(&records).await?;
        self.personas[idx].memory.mark_saved();
        tracing::trace!(persona = %self.personas[idx].id, "memory saved");
        Ok(())
    }

    fn topic_state(&self) -> TopicState {
        TopicState {
            phase: Some(self.phases.phase()),
            ticks_in_phase: self.phases.ticks_in_phase(),
            topic_started_tick: self.phases.topic_started_tick(),
            ..self.topics.state()
        }
    }

    async fn save_world(&self) -> Result<(), RepositoryError> {
        let records = vec![
            StoredRecord::new(
                &self.owner_id,
                SESSION_SCOPE,
                RecordKind::ScenarioState,
                to_payload(&self.scenario.state())?,
            ),
            StoredRecord::new(
                &self.owner_id,
                SESSION_SCOPE,
                RecordKind::TopicState,
                to_payload(&self.topic_state())?,
            ),
        ];
        self.services.store.upsert(&records).await
    }

    /// Save everything regardless of dirty flags.
    pub async fn save_all(&mut self) -> Result<(), RepositoryError> {
        for idx in 0..self.personas.len() {
            self.save_persona(idx).await?;
        }
        self.save_world().await?;
        self.world_dirty = false;
        Ok(())
    }

    /// Load whatever this owner saved before. Personas are matched by id;
    /// records for ids not in the session are ignored. Returns how many
    /// personas got their memory back.
    pub async fn restore(&mut self) -> Result<usize, RepositoryError> {
        let records = self
            .services
            .store
            .get_all(&RecordFilter::owner(&self.owner_id))
            .await?;

        let mut restored = 0;
        for persona in &mut self.personas {
            let find = |kind| {
                records
                    .iter()
                    .find(|r| r.agent_id == persona.id.as_str() && r.kind == kind)
            };
            let Some(memory) = find(RecordKind::Memory) else {
                continue;
            };
            let mut snapshot: MemorySnapshot = from_payload(memory)?;
            if let Some(docs) = find(RecordKind::RetrievalDocuments) {
                snapshot.documents = from_payload::<Vec<RetrievalDocument>>(docs)?;
            }
            persona.memory =
                PersonaMemory::restore(persona.id.clone(), self.config.memory.clone(), snapshot);
            restored += 1;
        }

        let session = |kind| {
            records
                .iter()
                .find(|r| r.agent_id == SESSION_SCOPE && r.kind == kind)
        };
        if let Some(record) = session(RecordKind::ScenarioState) {
            let state: ScenarioState = from_payload(record)?;
            let scenario = self.scenario.scenario().clone();
            self.scenario = ScenarioRunner::restore(scenario, state);
        }
        if let Some(record) = session(RecordKind::TopicState) {
            let state: TopicState = from_payload(record)?;
            if let Some(phase) = state.phase {
                self.phases
                    .resume(phase, state.ticks_in_phase, state.topic_started_tick);
            }
            self.topics =
                TopicTracker::restore(self.config.scheduler.topic_change_threshold, state);
        }

        tracing::info!(owner = %self.owner_id, personas = restored, "session state restored");
        Ok(restored)
    }

    /// Remove everything this owner has stored.
    pub async fn purge(&self) -> Result<u64, RepositoryError> {
        self.services
            .store
            .delete_all(&RecordFilter::owner(&self.owner_id))
            .await
    }
}
