//! Application state shared by the CLI and the REST API.
//!
//! Wires the infra implementations (SQLite record store, OpenAI-compatible
//! generation client, telemetry sink) into one [`SessionManager`].

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::SecretString;

use colloquy_core::llm::{BoxLlmProvider, LlmExecutor};
use colloquy_core::scheduler::Collaborators;
use colloquy_core::session::SessionManager;
use colloquy_core::storage::BoxRecordStore;
use colloquy_infra::config::{data_dir, load_config};
use colloquy_infra::llm::OpenAiCompatProvider;
use colloquy_infra::sqlite::{DatabasePool, SqliteRecordStore};
use colloquy_infra::telemetry::sink_from_config;
use colloquy_types::config::EngineConfig;

/// Generation endpoint settings given on the command line or in the
/// environment. They take precedence over `config.toml`.
#[derive(Debug, Default, Clone)]
pub struct LlmOverrides {
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<SecretString>,
}

impl LlmOverrides {
    fn apply(&self, config: &mut EngineConfig) {
        if let Some(url) = &self.base_url {
            config.llm.base_url = url.clone();
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Load config, open the database and build the collaborators.
    pub async fn init(overrides: &LlmOverrides) -> anyhow::Result<Self> {
        let data_dir = data_dir();
        tokio::fs::create_dir_all(&data_dir).await?;

        let mut config = load_config(&data_dir).await;
        overrides.apply(&mut config);

        let db_pool = DatabasePool::open_in(&data_dir).await?;
        let store = SqliteRecordStore::new(db_pool.clone());

        let provider = OpenAiCompatProvider::new(&config.llm, overrides.api_key.clone())?;
        tracing::info!(
            base_url = %config.llm.base_url,
            model = %provider.model(),
            "generation backend configured"
        );
        let llm = LlmExecutor::new(Arc::new(BoxLlmProvider::new(provider)), &config.llm);

        let services = Collaborators {
            llm,
            store: Arc::new(BoxRecordStore::new(store)),
            telemetry: Arc::new(sink_from_config(&config.telemetry)),
        };

        Ok(Self::new(config, services, data_dir, db_pool))
    }

    pub fn new(
        config: EngineConfig,
        services: Collaborators,
        data_dir: PathBuf,
        db_pool: DatabasePool,
    ) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(config, services)),
            data_dir,
            db_pool,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.sessions.config()
    }
}
