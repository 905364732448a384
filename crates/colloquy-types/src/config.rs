//! Engine configuration types for Colloquy.
//!
//! `EngineConfig` represents the top-level `config.toml` in the data
//! directory. Every field has a default, so an empty file (or no file at all)
//! yields a working engine.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the Colloquy engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub gates: GateConfig,
    #[serde(default)]
    pub relationships: RelationshipConfig,
    #[serde(default)]
    pub phases: PhaseBudgets,
    #[serde(default)]
    pub mood: MoodConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

// ---------------------------------------------------------------------------
// Generation backend
// ---------------------------------------------------------------------------

/// Settings for the OpenAI-compatible generation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Attempts per generation call, including the first.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base delay between attempts in seconds. Grows linearly per attempt.
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Prefix the system prompt with `/no_think` for reasoning models.
    #[serde(default = "default_true")]
    pub no_think_prefix: bool,
}

fn default_base_url() -> String {
    "http://localhost:1234/v1".to_string()
}

fn default_model() -> String {
    "qwen-3-14b-instruct".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> f64 {
    2.0
}

fn default_max_tokens() -> u32 {
    150
}

fn default_true() -> bool {
    true
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            max_tokens: default_max_tokens(),
            no_think_prefix: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between ticks. Zero pauses the loop.
    #[serde(default = "default_tick_delay")]
    pub tick_delay_secs: f64,
    /// Ticks after which a session stops on its own. Zero means unbounded.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
    /// Conversation entries rendered into each prompt.
    #[serde(default = "default_memory_window")]
    pub memory_window: usize,
    #[serde(default = "default_max_response_chars")]
    pub max_response_chars: usize,
    /// Rough prompt budget, counted as chars / 3.
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
    #[serde(default = "default_event_interval")]
    pub scenario_event_interval: u64,
    #[serde(default = "default_event_focus")]
    pub event_focus_ticks: u64,
    #[serde(default = "default_forced_reaction")]
    pub forced_reaction_ticks: u64,
    #[serde(default = "default_topic_threshold")]
    pub topic_change_threshold: usize,
    /// Chance a speaker proposes a new topic once the current one is worn out.
    #[serde(default = "default_creativity_boost")]
    pub creativity_boost: f64,
    /// Chance of running a second tick right after the first.
    #[serde(default = "default_double_tick")]
    pub double_tick_chance: f64,
    /// Corrective retries after a gate rejection.
    #[serde(default = "default_gate_retries")]
    pub gate_retries: u32,
}

fn default_tick_delay() -> f64 {
    0.5
}

fn default_max_ticks() -> u64 {
    150
}

fn default_memory_window() -> usize {
    12
}

fn default_max_response_chars() -> usize {
    250
}

fn default_max_context_tokens() -> usize {
    3200
}

fn default_event_interval() -> u64 {
    15
}

fn default_event_focus() -> u64 {
    7
}

fn default_forced_reaction() -> u64 {
    3
}

fn default_topic_threshold() -> usize {
    15
}

fn default_creativity_boost() -> f64 {
    0.2
}

fn default_double_tick() -> f64 {
    0.5
}

fn default_gate_retries() -> u32 {
    2
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_delay_secs: default_tick_delay(),
            max_ticks: default_max_ticks(),
            memory_window: default_memory_window(),
            max_response_chars: default_max_response_chars(),
            max_context_tokens: default_max_context_tokens(),
            scenario_event_interval: default_event_interval(),
            event_focus_ticks: default_event_focus(),
            forced_reaction_ticks: default_forced_reaction(),
            topic_change_threshold: default_topic_threshold(),
            creativity_boost: default_creativity_boost(),
            double_tick_chance: default_double_tick(),
            gate_retries: default_gate_retries(),
        }
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_short_term")]
    pub short_term_capacity: usize,
    #[serde(default = "default_long_term")]
    pub long_term_capacity: usize,
    #[serde(default = "default_compression_threshold")]
    pub compression_threshold: usize,
    #[serde(default = "default_importance_decay")]
    pub importance_decay: f64,
    /// Maximum tick gap between neighbouring items of one episode.
    #[serde(default = "default_episode_gap")]
    pub episode_gap_ticks: u64,
    #[serde(default = "default_retrieval_top_k")]
    pub retrieval_top_k: usize,
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,
}

fn default_short_term() -> usize {
    15
}

fn default_long_term() -> usize {
    50
}

fn default_compression_threshold() -> usize {
    80
}

fn default_importance_decay() -> f64 {
    0.97
}

fn default_episode_gap() -> u64 {
    3
}

fn default_retrieval_top_k() -> usize {
    3
}

fn default_max_documents() -> usize {
    200
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            short_term_capacity: default_short_term(),
            long_term_capacity: default_long_term(),
            compression_threshold: default_compression_threshold(),
            importance_decay: default_importance_decay(),
            episode_gap_ticks: default_episode_gap(),
            retrieval_top_k: default_retrieval_top_k(),
            max_documents: default_max_documents(),
        }
    }
}

// ---------------------------------------------------------------------------
// Quality and repetition gates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Similarity to any recent shared utterance that counts as a repeat.
    #[serde(default = "default_shared_similarity")]
    pub shared_similarity: f64,
    /// Similarity to the persona's own recent utterances that counts as a repeat.
    #[serde(default = "default_own_similarity")]
    pub own_similarity: f64,
    /// 3-gram overlap with the previous own utterance that bumps the
    /// consecutive-similarity counter.
    #[serde(default = "default_consecutive_overlap")]
    pub consecutive_overlap: f64,
    /// A retry is accepted only if its similarity to the rejected text stays
    /// below this value.
    #[serde(default = "default_retry_novelty")]
    pub retry_novelty: f64,
    #[serde(default = "default_consecutive_limit")]
    pub consecutive_limit: u32,
}

fn default_shared_similarity() -> f64 {
    0.5
}

fn default_own_similarity() -> f64 {
    0.42
}

fn default_consecutive_overlap() -> f64 {
    0.3
}

fn default_retry_novelty() -> f64 {
    0.4
}

fn default_consecutive_limit() -> u32 {
    2
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            shared_similarity: default_shared_similarity(),
            own_similarity: default_own_similarity(),
            consecutive_overlap: default_consecutive_overlap(),
            retry_novelty: default_retry_novelty(),
            consecutive_limit: default_consecutive_limit(),
        }
    }
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipConfig {
    #[serde(default = "default_change_rate")]
    pub change_rate: f64,
    /// Share of a delta applied back to the addressed persona.
    #[serde(default = "default_reciprocal_factor")]
    pub reciprocal_factor: f64,
    /// Initial offset everyone starts with toward a goblin.
    #[serde(default = "default_goblin_distrust")]
    pub goblin_distrust: f64,
}

fn default_change_rate() -> f64 {
    0.05
}

fn default_reciprocal_factor() -> f64 {
    0.5
}

fn default_goblin_distrust() -> f64 {
    -0.15
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self {
            change_rate: default_change_rate(),
            reciprocal_factor: default_reciprocal_factor(),
            goblin_distrust: default_goblin_distrust(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dialogue phases
// ---------------------------------------------------------------------------

/// Tick budget for each dialogue phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseBudgets {
    #[serde(default = "default_discuss")]
    pub discuss: u32,
    #[serde(default = "default_decide")]
    pub decide: u32,
    #[serde(default = "default_act")]
    pub act: u32,
    #[serde(default = "default_conclude")]
    pub conclude: u32,
}

fn default_discuss() -> u32 {
    8
}

fn default_decide() -> u32 {
    6
}

fn default_act() -> u32 {
    4
}

fn default_conclude() -> u32 {
    3
}

impl PhaseBudgets {
    pub fn total(&self) -> u32 {
        self.discuss + self.decide + self.act + self.conclude
    }
}

impl Default for PhaseBudgets {
    fn default() -> Self {
        Self {
            discuss: default_discuss(),
            decide: default_decide(),
            act: default_act(),
            conclude: default_conclude(),
        }
    }
}

// ---------------------------------------------------------------------------
// Mood
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MoodConfig {
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f64,
    #[serde(default = "default_event_impact")]
    pub event_impact: f64,
    #[serde(default = "default_interaction_impact")]
    pub interaction_impact: f64,
}

fn default_decay_rate() -> f64 {
    0.04
}

fn default_event_impact() -> f64 {
    0.30
}

fn default_interaction_impact() -> f64 {
    0.15
}

impl Default for MoodConfig {
    fn default() -> Self {
        Self {
            decay_rate: default_decay_rate(),
            event_impact: default_event_impact(),
            interaction_impact: default_interaction_impact(),
        }
    }
}

// ---------------------------------------------------------------------------
// Telemetry and server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Endpoint receiving JSON records. `None` disables telemetry.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_telemetry_timeout")]
    pub timeout_secs: u64,
}

fn default_telemetry_timeout() -> u64 {
    5
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_telemetry_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}
