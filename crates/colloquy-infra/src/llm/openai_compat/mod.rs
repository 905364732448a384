//! OpenAI-compatible generation backend.
//!
//! Speaks `POST {base_url}/chat/completions`, which covers LM Studio,
//! llama.cpp server, vLLM, Ollama's compatibility layer and hosted APIs.
//! Every failure is classified into an [`LlmError`] kind for the retry
//! policy.
//!
//! The API key, when present, is wrapped in [`secrecy::SecretString`] and
//! only exposed while building the `Authorization` header.

pub mod types;

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use secrecy::{ExposeSecret, SecretString};

use colloquy_core::llm::LlmProvider;
use colloquy_types::config::LlmConfig;
use colloquy_types::llm::{CompletionRequest, CompletionResponse, LlmError};

use self::types::{ChatRequest, ChatResponse};

/// Longest error body kept in an [`LlmError`] message.
const MAX_ERROR_BODY: usize = 300;

/// Provider for any OpenAI-compatible chat completions API.
pub struct OpenAiCompatProvider {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
    model: String,
}

// No Debug derive: keeps the API key out of logs.

impl OpenAiCompatProvider {
    /// Build a provider from `config`. The client timeout is the config's
    /// request timeout.
    pub fn new(config: &LlmConfig, api_key: Option<SecretString>) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Unknown(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai_compat"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };

        let mut builder = self.client.post(self.url()).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = retry_after(response.headers());
            let error_body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &error_body, retry_after_ms));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Unknown(format!("failed to parse response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::Unknown("response has no message content".into()))?;

        tracing::trace!(model = %parsed.model, chars = content.len(), "completion received");
        Ok(CompletionResponse {
            content,
            model: parsed.model,
        })
    }
}

fn classify_transport(err: reqwest::Error) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout
    } else if err.is_connect() || err.is_request() {
        LlmError::Connection(err.to_string())
    } else {
        LlmError::Unknown(err.to_string())
    }
}

fn classify_status(status: StatusCode, body: &str, retry_after_ms: Option<u64>) -> LlmError {
    let message: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
    let code = status.as_u16();
    match code {
        429 => LlmError::RateLimited { retry_after_ms },
        408 => LlmError::Timeout,
        500..=599 => LlmError::Server {
            status: code,
            message,
        },
        400..=499 => LlmError::Client {
            status: code,
            message,
        },
        _ => LlmError::Unknown(format!("HTTP {status}: {message}")),
    }
}

/// `Retry-After` in whole seconds, as milliseconds.
fn retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| secs * 1000)
}
