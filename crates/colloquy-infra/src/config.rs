//! Configuration loader for Colloquy.
//!
//! Reads `config.toml` from the data directory (`~/.colloquy/` unless
//! `COLLOQUY_DATA_DIR` says otherwise) and deserializes it into
//! [`EngineConfig`]. Falls back to defaults when the file is missing or
//! malformed.

use std::path::{Path, PathBuf};

use colloquy_types::config::EngineConfig;

pub const DATA_DIR_ENV: &str = "COLLOQUY_DATA_DIR";

/// The data directory: `$COLLOQUY_DATA_DIR`, else `~/.colloquy`.
pub fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".colloquy")
        })
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// Sections and fields left out of the file take their defaults.
pub async fn load_config(data_dir: &Path) -> EngineConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return EngineConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return EngineConfig::default();
        }
    };

    match toml::from_str::<EngineConfig>(&content) {
        Ok(config) => {
            tracing::info!("Loaded configuration from {}", config_path.display());
            config
        }
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config.llm.base_url, "http://localhost:1234/v1");
        assert_eq!(config.phases.discuss, 8);
    }

    #[tokio::test]
    async fn load_config_partial_toml_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[llm]
model = "qwen3-8b"

[scheduler]
tick_delay_secs = 2.0
max_ticks = 0

[telemetry]
endpoint = "http://localhost:9000/events"
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.llm.model, "qwen3-8b");
        assert_eq!(config.llm.base_url, "http://localhost:1234/v1");
        assert_eq!(config.scheduler.tick_delay_secs, 2.0);
        assert_eq!(config.scheduler.max_ticks, 0);
        assert_eq!(config.scheduler.gate_retries, 2);
        assert_eq!(
            config.telemetry.endpoint.as_deref(),
            Some("http://localhost:9000/events")
        );
        assert_eq!(config.memory.compression_threshold, 80);
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.scheduler.max_ticks, 150);
        assert!(config.telemetry.endpoint.is_none());
    }
}
