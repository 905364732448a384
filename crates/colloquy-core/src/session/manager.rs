//! Per-owner session bookkeeping.
//!
//! At most one session per owner id. Every actor's cancellation token is a
//! child of the manager's, so [`SessionManager::shutdown_all`] reaches all
//! of them at once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use colloquy_types::config::EngineConfig;
use colloquy_types::error::SessionError;
use colloquy_types::persona::PersonaProfile;

use crate::presets;
use crate::scheduler::{Collaborators, DialogueEngine};
use crate::session::actor::SessionHandle;

const MAX_OWNER_ID_LEN: usize = 64;

/// What to start a session with.
#[derive(Debug, Clone, Default)]
pub struct SessionRequest {
    /// Scenario key; the default scenario when absent.
    pub scenario: Option<String>,
    /// Persona preset key; ignored when `personas` is given.
    pub preset: Option<String>,
    pub personas: Option<Vec<PersonaProfile>>,
    /// Reload whatever this owner saved before.
    pub restore: bool,
}

/// Row in [`SessionManager::list`].
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub owner_id: String,
    pub running: bool,
    pub started_at: DateTime<Utc>,
}

/// Owner ids become storage keys and URL segments.
pub fn validate_owner_id(owner_id: &str) -> Result<(), SessionError> {
    let valid = !owner_id.is_empty()
        && owner_id.len() <= MAX_OWNER_ID_LEN
        && owner_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SessionError::InvalidOwnerId(owner_id.to_string()))
    }
}

pub struct SessionManager {
    sessions: DashMap<String, Arc<SessionHandle>>,
    config: EngineConfig,
    services: Collaborators,
    shutdown: CancellationToken,
}

impl SessionManager {
    pub fn new(config: EngineConfig, services: Collaborators) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
            services,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build an engine and start its actor.
    ///
    /// A finished session for the same owner is replaced; a running one is
    /// an [`SessionError::AlreadyExists`].
    #[tracing::instrument(skip(self, request), fields(owner = %owner_id))]
    pub async fn create(
        &self,
        owner_id: &str,
        request: SessionRequest,
    ) -> Result<Arc<SessionHandle>, SessionError> {
        validate_owner_id(owner_id)?;
        if self.sessions.get(owner_id).is_some_and(|h| h.is_running()) {
            return Err(SessionError::AlreadyExists(owner_id.to_string()));
        }

        let scenario = presets::scenario(
            request
                .scenario
                .as_deref()
                .unwrap_or(presets::DEFAULT_SCENARIO),
        )?;
        let profiles = match request.personas {
            Some(profiles) => profiles,
            None => presets::preset(request.preset.as_deref().unwrap_or(presets::DEFAULT_PRESET))?,
        };

        let mut engine = DialogueEngine::new(
            owner_id,
            self.config.clone(),
            scenario,
            &profiles,
            self.services.clone(),
            StdRng::from_entropy(),
        )?;
        if request.restore {
            match engine.restore().await {
                Ok(n) => tracing::info!(restored = n, "previous state loaded"),
                Err(e) => tracing::warn!(error = %e, "restore failed, starting fresh"),
            }
        }

        // The restore above awaited; another create may have won meanwhile.
        match self.sessions.entry(owner_id.to_string()) {
            Entry::Occupied(mut slot) => {
                if slot.get().is_running() {
                    return Err(SessionError::AlreadyExists(owner_id.to_string()));
                }
                let handle = Arc::new(SessionHandle::spawn(engine, &self.shutdown));
                slot.insert(Arc::clone(&handle));
                Ok(handle)
            }
            Entry::Vacant(slot) => {
                let handle = Arc::new(SessionHandle::spawn(engine, &self.shutdown));
                slot.insert(Arc::clone(&handle));
                Ok(handle)
            }
        }
    }

    pub fn get(&self, owner_id: &str) -> Result<Arc<SessionHandle>, SessionError> {
        self.sessions
            .get(owner_id)
            .map(|h| Arc::clone(h.value()))
            .ok_or_else(|| SessionError::NotFound(owner_id.to_string()))
    }

    pub fn list(&self) -> Vec<SessionSummary> {
        let mut rows: Vec<SessionSummary> = self
            .sessions
            .iter()
            .map(|entry| SessionSummary {
                owner_id: entry.key().clone(),
                running: entry.value().is_running(),
                started_at: entry.value().started_at(),
            })
            .collect();
        rows.sort_by(|a, b| a.owner_id.cmp(&b.owner_id));
        rows
    }

    /// Stop one session and forget it.
    pub async fn stop(&self, owner_id: &str) -> Result<(), SessionError> {
        let (_, handle) = self
            .sessions
            .remove(owner_id)
            .ok_or_else(|| SessionError::NotFound(owner_id.to_string()))?;
        handle.stop().await;
        tracing::info!(owner = %owner_id, "session removed");
        Ok(())
    }

    /// Cancel every session and wait for their final saves.
    pub async fn shutdown_all(&self) {
        self.shutdown.cancel();
        let handles: Vec<Arc<SessionHandle>> = self
            .sessions
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();
        for handle in &handles {
            handle.finished().await;
        }
        self.sessions.clear();
        tracing::info!(sessions = handles.len(), "all sessions stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BoxRecordStore;
    use crate::telemetry::{BoxTelemetrySink, NoopSink};
    use crate::testing::{MemoryRecordStore, executor, quiet_config, session_provider};

    fn manager() -> SessionManager {
        let mut config = quiet_config();
        config.scheduler.tick_delay_secs = 30.0;
        let provider = session_provider();
        SessionManager::new(
            config,
            Collaborators {
                llm: executor(&provider),
                store: Arc::new(BoxRecordStore::new(MemoryRecordStore::new())),
                telemetry: Arc::new(BoxTelemetrySink::new(NoopSink)),
            },
        )
    }

    #[test]
    fn owner_ids_are_restricted() {
        assert!(validate_owner_id("user_42-b").is_ok());
        let long = "x".repeat(65);
        for bad in ["", "a b", "../etc", "ü", long.as_str()] {
            assert!(
                matches!(validate_owner_id(bad), Err(SessionError::InvalidOwnerId(_))),
                "{bad:?} accepted"
            );
        }
    }

    #[tokio::test]
    async fn one_session_per_owner() {
        let sessions = manager();
        sessions.create("alice", SessionRequest::default()).await.unwrap();
        let err = sessions
            .create("alice", SessionRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::AlreadyExists(_)));
        assert_eq!(sessions.list().len(), 1);
        sessions.shutdown_all().await;
    }

    #[tokio::test]
    async fn unknown_presets_are_rejected() {
        let sessions = manager();
        let request = SessionRequest {
            scenario: Some("moon_base".into()),
            ..Default::default()
        };
        assert!(matches!(
            sessions.create("bob", request).await,
            Err(SessionError::UnknownScenario(_))
        ));
        let request = SessionRequest {
            preset: Some("robots".into()),
            ..Default::default()
        };
        assert!(matches!(
            sessions.create("bob", request).await,
            Err(SessionError::UnknownPreset(_))
        ));
        assert!(sessions.list().is_empty());
    }

    #[tokio::test]
    async fn stop_removes_the_session() {
        let sessions = manager();
        let handle = sessions.create("carol", SessionRequest::default()).await.unwrap();
        sessions.stop("carol").await.unwrap();

        assert!(!handle.is_running());
        assert!(matches!(sessions.get("carol"), Err(SessionError::NotFound(_))));
        assert!(matches!(sessions.stop("carol").await, Err(SessionError::NotFound(_))));
    }

    #[tokio::test]
    async fn shutdown_reaches_every_session() {
        let sessions = manager();
        let a = sessions.create("a", SessionRequest::default()).await.unwrap();
        let b = sessions.create("b", SessionRequest::default()).await.unwrap();

        sessions.shutdown_all().await;
        assert!(!a.is_running());
        assert!(!b.is_running());
        assert!(sessions.list().is_empty());
    }
}
