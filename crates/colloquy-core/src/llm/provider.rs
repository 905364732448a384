//! LlmProvider trait definition.
//!
//! The generation backend every turn, summary and consequence goes through.
//! Uses RPITIT for `complete`; `BoxLlmProvider` erases the concrete type.

use colloquy_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for text-generation backends.
///
/// Implementations classify every failure into an [`LlmError`] kind so the
/// retry policy can decide whether another attempt makes sense.
///
/// The production implementation lives in colloquy-infra
/// (`OpenAiCompatProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "openai_compat").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
