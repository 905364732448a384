//! Generation with retry.
//!
//! `LlmExecutor` is the single entry point the engine uses for generation:
//! it shapes the request, applies the retry policy and cleans the output.

use std::sync::Arc;
use std::sync::LazyLock;

use regex::Regex;

use colloquy_types::config::LlmConfig;
use colloquy_types::llm::{CompletionRequest, LlmError, Message, MessageRole};

use super::box_provider::BoxLlmProvider;
use super::retry::{RetryDecision, RetryPolicy};

const NO_THINK: &str = "/no_think";

static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));

/// Remove reasoning blocks and stray think tags from model output.
pub fn strip_think_tags(text: &str) -> String {
    THINK_BLOCK
        .replace_all(text, "")
        .replace("<think>", "")
        .replace("</think>", "")
        .trim()
        .to_string()
}

/// Retrying front end over a [`BoxLlmProvider`].
#[derive(Debug, Clone)]
pub struct LlmExecutor {
    provider: Arc<BoxLlmProvider>,
    policy: RetryPolicy,
    max_tokens: Option<u32>,
    no_think_prefix: bool,
}

impl LlmExecutor {
    pub fn new(provider: Arc<BoxLlmProvider>, config: &LlmConfig) -> Self {
        Self {
            provider,
            policy: RetryPolicy::from_config(config),
            max_tokens: Some(config.max_tokens),
            no_think_prefix: config.no_think_prefix,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Generate a reply, retrying transient failures.
    ///
    /// Returns the cleaned text of the first successful attempt, or the
    /// error of the last attempt once the policy gives up.
    #[tracing::instrument(skip(self, messages), fields(provider = %self.provider.name()))]
    pub async fn chat(&self, messages: Vec<Message>, temperature: f64) -> Result<String, LlmError> {
        let mut request = CompletionRequest::new(self.prepare(messages), temperature);
        request.max_tokens = self.max_tokens;

        let mut attempt = 1;
        loop {
            match self.provider.complete(&request).await {
                Ok(response) => return Ok(strip_think_tags(&response.content)),
                Err(err) => match self.policy.next(attempt, &err) {
                    RetryDecision::Retry { delay } => {
                        tracing::warn!(
                            attempt,
                            kind = err.kind(),
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Generation failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    RetryDecision::GiveUp => {
                        tracing::warn!(attempt, kind = err.kind(), error = %err, "Generation failed");
                        return Err(err);
                    }
                },
            }
        }
    }

    fn prepare(&self, mut messages: Vec<Message>) -> Vec<Message> {
        if self.no_think_prefix
            && let Some(system) = messages.iter_mut().find(|m| m.role == MessageRole::System)
            && !system.content.starts_with(NO_THINK)
        {
            system.content = format!("{NO_THINK}\n{}", system.content);
        }
        messages
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::testing::ScriptedProvider;

    fn executor(provider: &ScriptedProvider) -> LlmExecutor {
        LlmExecutor::new(
            Arc::new(BoxLlmProvider::new(provider.clone())),
            &LlmConfig::default(),
        )
        .with_policy(RetryPolicy::new(3, Duration::from_millis(1)))
    }

    #[test]
    fn strip_think_removes_reasoning() {
        assert_eq!(strip_think_tags("<think>hmm\nok</think> Hello"), "Hello");
        assert_eq!(strip_think_tags("Hi</think>"), "Hi");
    }

    #[tokio::test]
    async fn prefixes_system_prompt_once() {
        let provider = ScriptedProvider::new(["ok"]);
        let exec = executor(&provider);
        exec.chat(
            vec![Message::system("You are Alice"), Message::user("Hi")],
            0.7,
        )
        .await
        .unwrap();
        exec.chat(
            vec![Message::system("/no_think\nYou are Bob"), Message::user("Hi")],
            0.7,
        )
        .await
        .unwrap();

        let requests = provider.requests();
        assert_eq!(requests[0].messages[0].content, "/no_think\nYou are Alice");
        assert_eq!(requests[1].messages[0].content, "/no_think\nYou are Bob");
        assert_eq!(requests[0].max_tokens, Some(150));
    }

    #[tokio::test]
    async fn retries_transient_errors() {
        let provider = ScriptedProvider::empty();
        provider.push_err(LlmError::Timeout);
        provider.push_err(LlmError::Server {
            status: 503,
            message: "busy".into(),
        });
        provider.push_ok("Finally");
        let out = executor(&provider)
            .chat(vec![Message::user("Hi")], 0.7)
            .await
            .unwrap();
        assert_eq!(out, "Finally");
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let provider = ScriptedProvider::empty();
        provider.push_err(LlmError::Client {
            status: 400,
            message: "too long".into(),
        });
        provider.push_ok("never");
        let err = executor(&provider)
            .chat(vec![Message::user("Hi")], 0.7)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "client");
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let provider = ScriptedProvider::empty();
        for _ in 0..5 {
            provider.push_err(LlmError::Connection("refused".into()));
        }
        let err = executor(&provider)
            .chat(vec![Message::user("Hi")], 0.7)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "connection");
        assert_eq!(provider.requests().len(), 3);
    }
}
