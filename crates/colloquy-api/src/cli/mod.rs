//! CLI command definitions for the `colloquy` binary.

pub mod list;
pub mod render;
pub mod run;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use secrecy::SecretString;

use crate::state::LlmOverrides;

/// Run multi-persona dialogue sessions against a local language model.
#[derive(Parser)]
#[command(name = "colloquy", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also export tracing spans through OpenTelemetry (stdout).
    #[arg(long, global = true)]
    pub otel: bool,

    /// Base URL of the OpenAI-compatible generation endpoint.
    #[arg(long, global = true, env = "COLLOQUY_LLM_BASE_URL")]
    pub llm_base_url: Option<String>,

    /// Model name sent with every request.
    #[arg(long, global = true, env = "COLLOQUY_LLM_MODEL")]
    pub llm_model: Option<String>,

    /// Bearer token for the generation endpoint.
    #[arg(long, global = true, env = "COLLOQUY_LLM_API_KEY", hide_env_values = true)]
    pub llm_api_key: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn llm_overrides(&self) -> LlmOverrides {
        LlmOverrides {
            base_url: self.llm_base_url.clone(),
            model: self.llm_model.clone(),
            api_key: self.llm_api_key.clone().map(SecretString::from),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the REST API server.
    Serve {
        /// Port to listen on (config `server.port` when absent).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (config `server.host` when absent).
        #[arg(long)]
        host: Option<String>,
    },

    /// Run one session in this terminal.
    Run {
        /// Owner id the session is saved under.
        #[arg(short, long, default_value = "local")]
        user: String,

        /// Scenario key (see `colloquy list scenarios`).
        #[arg(short, long)]
        scenario: Option<String>,

        /// Persona preset key (see `colloquy list presets`).
        #[arg(short, long)]
        preset: Option<String>,

        /// Continue from what this owner saved last time.
        #[arg(long)]
        restore: bool,
    },

    /// List built-in scenarios or persona presets.
    #[command(alias = "ls")]
    List {
        #[command(subcommand)]
        resource: ListResource,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ListResource {
    /// Built-in scenarios.
    Scenarios,
    /// Built-in persona presets.
    Presets,
}
