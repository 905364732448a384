//! Test doubles for the collaborator traits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;

use colloquy_types::error::{RepositoryError, TelemetryError};
use colloquy_types::llm::{CompletionRequest, CompletionResponse, LlmError, MessageRole};
use colloquy_types::storage::{RecordFilter, StoredRecord};
use colloquy_types::telemetry::TelemetryRecord;

use colloquy_types::config::{EngineConfig, LlmConfig};

use crate::llm::{BoxLlmProvider, LlmExecutor, LlmProvider, RetryPolicy};
use crate::presets;
use crate::scheduler::{Collaborators, DialogueEngine};
use crate::storage::{BoxRecordStore, RecordStore};
use crate::telemetry::{BoxTelemetrySink, TelemetrySink};

type Responder = dyn Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync;

#[derive(Default)]
struct Script {
    queue: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Mutex<Option<Result<String, LlmError>>>,
    responder: Mutex<Option<Arc<Responder>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

/// Provider that replays queued replies, then a fallback.
#[derive(Clone, Default)]
pub struct ScriptedProvider {
    script: Arc<Script>,
}

impl ScriptedProvider {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Queue `replies`; the last one repeats once the queue is drained.
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::empty();
        for reply in replies {
            provider.push_ok(reply);
        }
        let last = provider.script.queue.lock().unwrap().back().cloned();
        *provider.script.fallback.lock().unwrap() = last;
        provider
    }

    /// Every call fails with `err`.
    pub fn failing(err: LlmError) -> Self {
        let provider = Self::empty();
        *provider.script.fallback.lock().unwrap() = Some(Err(err));
        provider
    }

    /// Answer every call not covered by the queue with `f(request)`.
    pub fn responding<F>(f: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        let provider = Self::empty();
        *provider.script.responder.lock().unwrap() = Some(Arc::new(f));
        provider
    }

    pub fn push_ok(&self, reply: impl Into<String>) {
        self.script
            .queue
            .lock()
            .unwrap()
            .push_back(Ok(reply.into()));
    }

    pub fn push_err(&self, err: LlmError) {
        self.script.queue.lock().unwrap().push_back(Err(err));
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.script.requests.lock().unwrap().clone()
    }

    /// System prompts of every request so far.
    pub fn system_prompts(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|r| {
                r.messages
                    .iter()
                    .find(|m| m.role == MessageRole::System)
                    .map(|m| m.content.clone())
            })
            .collect()
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.script.requests.lock().unwrap().push(request.clone());
        let queued = self.script.queue.lock().unwrap().pop_front();
        let result = match queued {
            Some(r) => r,
            None => {
                let responder = self.script.responder.lock().unwrap().clone();
                match responder {
                    Some(f) => f(request),
                    None => self
                        .script
                        .fallback
                        .lock()
                        .unwrap()
                        .clone()
                        .unwrap_or_else(|| Err(LlmError::Unknown("script exhausted".into()))),
                }
            }
        };
        result.map(|content| CompletionResponse {
            content,
            model: "scripted".into(),
        })
    }
}

/// In-memory [`RecordStore`].
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<Mutex<Vec<StoredRecord>>>,
    fail_writes: Arc<Mutex<bool>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<StoredRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap() = fail;
    }
}

impl RecordStore for MemoryRecordStore {
    async fn upsert(&self, records: &[StoredRecord]) -> Result<(), RepositoryError> {
        if *self.fail_writes.lock().unwrap() {
            return Err(RepositoryError::Connection);
        }
        let mut stored = self.records.lock().unwrap();
        for record in records {
            stored.retain(|r| {
                !(r.owner_id == record.owner_id
                    && r.agent_id == record.agent_id
                    && r.kind == record.kind)
            });
            stored.push(record.clone());
        }
        Ok(())
    }

    async fn get_all(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>, RepositoryError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn delete_all(&self, filter: &RecordFilter) -> Result<u64, RepositoryError> {
        let mut stored = self.records.lock().unwrap();
        let before = stored.len();
        stored.retain(|r| !filter.matches(r));
        Ok((before - stored.len()) as u64)
    }
}

/// Sink that keeps every record it receives.
#[derive(Clone, Default)]
pub struct RecordingSink {
    records: Arc<Mutex<Vec<TelemetryRecord>>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<TelemetryRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl TelemetrySink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn emit(&self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Engine harness
// ---------------------------------------------------------------------------

const LINES: &[&str] = &[
    "The tide is coming in faster than yesterday.",
    "Who saw where the fresh water stream begins?",
    "My boots are soaked and my hands are numb.",
    "There are crab tracks all over the northern dunes.",
    "Somebody should count the coconuts we gathered.",
    "I heard a strange whistle from the jungle at dawn.",
    "Those clouds look heavy, rain will come soon.",
    "My grandmother told stories about islands like this.",
];

/// Executor with a single attempt and no backoff.
pub fn executor(provider: &ScriptedProvider) -> LlmExecutor {
    LlmExecutor::new(Arc::new(BoxLlmProvider::new(provider.clone())), &LlmConfig::default())
        .with_policy(RetryPolicy::new(1, Duration::from_millis(1)))
}

/// Provider that plays a whole session: narration for game-master prompts,
/// a topic for moderator prompts, and distinct utterances otherwise.
pub fn session_provider() -> ScriptedProvider {
    let counter = Arc::new(AtomicUsize::new(0));
    ScriptedProvider::responding(move |request| {
        let system = request
            .messages
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        if system.contains("game master") {
            return Ok("A wave floods the lower camp and ruins the firewood.".into());
        }
        if system.contains("creative moderator") {
            return Ok("Building a signal fire on the cliff".into());
        }
        let n = counter.fetch_add(1, Ordering::Relaxed);
        Ok(LINES[n % LINES.len()].into())
    })
}

pub struct EngineHarness {
    pub engine: DialogueEngine,
    pub provider: ScriptedProvider,
    pub store: MemoryRecordStore,
    pub sink: RecordingSink,
}

/// Config with scenario events and topic proposals switched off.
pub fn quiet_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.scheduler.scenario_event_interval = 0;
    config.scheduler.creativity_boost = 0.0;
    config.scheduler.tick_delay_secs = 0.0;
    config
}

/// Three humans on the desert island.
pub fn harness_with(provider: ScriptedProvider, config: EngineConfig, store: MemoryRecordStore) -> EngineHarness {
    let sink = RecordingSink::default();
    let services = Collaborators {
        llm: executor(&provider),
        store: Arc::new(BoxRecordStore::new(store.clone())),
        telemetry: Arc::new(BoxTelemetrySink::new(sink.clone())),
    };
    let scenario = presets::scenario(presets::DEFAULT_SCENARIO).unwrap();
    let profiles = presets::preset(presets::DEFAULT_PRESET).unwrap();
    let engine = DialogueEngine::new(
        "user-1",
        config,
        scenario,
        &profiles,
        services,
        StdRng::seed_from_u64(42),
    )
    .unwrap();
    EngineHarness {
        engine,
        provider,
        store,
        sink,
    }
}

pub fn harness(provider: ScriptedProvider) -> EngineHarness {
    harness_with(provider, quiet_config(), MemoryRecordStore::new())
}

/// Let detached telemetry tasks run.
pub async fn settle() {
    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
