//! Generation of one utterance, with the quality and repetition gates and
//! their corrective retries.

use rand::Rng;
use rand::seq::SliceRandom;

use colloquy_types::config::GateConfig;
use colloquy_types::event::SkipReason;
use colloquy_types::llm::Message;

use crate::gate::{
    RepetitionWindow, check_quality, check_repetition, clean_response, is_novel,
    strip_any_prefix, strip_other_speech,
};
use crate::llm::LlmExecutor;
use crate::persona::Persona;
use crate::text::truncate_chars;

const FIRST_TEMPERATURE: f64 = 0.8;
const EMPTY_RETRY_TEMPERATURE: f64 = 1.0;
const QUALITY_RETRY_TEMPERATURE: f64 = 0.7;
const REPETITION_RETRY_TEMPERATURE: f64 = 1.3;
const MIN_CHARS: usize = 5;

const STYLE_CHANGES: &[&str] = &[
    "State a CONCRETE FACT about yourself or the situation.",
    "Ask one of the others a QUESTION.",
    "Propose a CONCRETE ACTION right now.",
    "AGREE with someone and BUILD on their idea.",
    "Remember SOMETHING from the past and tell it.",
    "Notice your SURROUNDINGS: what do you see around you?",
    "Joke or say something UNEXPECTED.",
];

/// One speaker's turn as the generator sees it.
#[derive(Debug, Clone, Copy)]
pub struct TurnRequest<'a> {
    pub speaker: &'a Persona,
    pub speaker_name: &'a str,
    /// Current display names of every other persona.
    pub others: &'a [String],
    /// Prompt built for this turn; corrective retries append to a copy.
    pub messages: &'a [Message],
    pub window: RepetitionWindow<'a>,
    pub max_chars: usize,
    pub retries: u32,
    pub gates: &'a GateConfig,
}

impl TurnRequest<'_> {
    /// Clean a raw reply and cut anything written for other personas.
    fn finish(&self, raw: &str) -> Option<String> {
        let text = clean_response(raw, self.speaker_name, self.others, self.max_chars)?;
        let text = strip_any_prefix(&text, self.others);
        let text = strip_other_speech(&text, self.others);
        (text.chars().count() >= MIN_CHARS).then_some(text)
    }

    async fn retry(&self, llm: &LlmExecutor, correction: String, temperature: f64) -> Option<String> {
        let mut messages = self.messages.to_vec();
        messages.push(Message::user(correction));
        match llm.chat(messages, temperature).await {
            Ok(raw) => self.finish(&raw),
            Err(e) => {
                tracing::debug!(speaker = %self.speaker_name, error = %e, "corrective retry failed");
                None
            }
        }
    }

    fn repetition_check(&self, text: &str) -> Result<(), crate::gate::RepetitionIssue> {
        let already_done = self.speaker.memory.has_done_similar(text);
        check_repetition(text, &self.window, self.gates, already_done)
    }

    fn banned(&self) -> String {
        let start = self.window.own.len().saturating_sub(3);
        self.window.own[start..]
            .iter()
            .map(|t| truncate_chars(t, 50))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn repetition_correction<R: Rng>(&self, rejected: &str, rng: &mut R) -> String {
        let banned = self.banned();
        let count = self.speaker.consecutive_similar;
        if count >= self.gates.consecutive_limit {
            let style = STYLE_CHANGES.choose(rng).copied().unwrap_or(STYLE_CHANGES[0]);
            format!(
                "STOP! REPEAT! You have said something similar {count} times in a row! \
                 Forbidden: {banned}. REQUIRED: {style}"
            )
        } else {
            format!(
                "STOP! Repeat: '{}...' was already said. Forbidden: {banned}. \
                 Say something COMPLETELY DIFFERENT.",
                truncate_chars(rejected, 50)
            )
        }
    }
}

/// Generate, clean and gate one utterance.
///
/// Each gate gets up to `retries` corrective attempts. A repetition retry
/// only counts when it passes the quality gate and differs enough from the
/// rejected text.
#[tracing::instrument(skip_all, fields(speaker = %req.speaker_name))]
pub async fn generate_turn<R: Rng>(
    llm: &LlmExecutor,
    req: &TurnRequest<'_>,
    rng: &mut R,
) -> Result<String, SkipReason> {
    let first = match llm.chat(req.messages.to_vec(), FIRST_TEMPERATURE).await {
        Ok(raw) => req.finish(&raw),
        Err(e) if !e.is_retryable() => {
            tracing::warn!(error = %e, kind = e.kind(), "generation rejected by backend");
            return Err(SkipReason::Generation);
        }
        Err(e) => {
            tracing::debug!(error = %e, "generation failed after retries");
            None
        }
    };

    let mut text = match first {
        Some(text) => text,
        None => {
            let correction = format!(
                "You are {}. Answer BRIEFLY, 1-2 sentences. No tags. Do not write for others.",
                req.speaker_name
            );
            req.retry(llm, correction, EMPTY_RETRY_TEMPERATURE)
                .await
                .ok_or(SkipReason::Generation)?
        }
    };

    let mut attempt = 0;
    while let Err(issue) = check_quality(&text, req.speaker_name, req.others) {
        tracing::info!(reason = %issue, attempt, "utterance rejected by quality gate");
        if attempt >= req.retries {
            return Err(SkipReason::Quality);
        }
        attempt += 1;
        let correction = format!(
            "STOP! Reply rejected: {issue}. Say something SAFE and SENSIBLE. 1-2 sentences."
        );
        text = req
            .retry(llm, correction, QUALITY_RETRY_TEMPERATURE)
            .await
            .ok_or(SkipReason::Quality)?;
    }

    let mut attempt = 0;
    while let Err(issue) = req.repetition_check(&text) {
        tracing::info!(reason = %issue, attempt, "utterance rejected as repetition");
        if attempt >= req.retries {
            return Err(SkipReason::Repetition);
        }
        attempt += 1;
        let correction = req.repetition_correction(&text, rng);
        let candidate = req
            .retry(llm, correction, REPETITION_RETRY_TEMPERATURE)
            .await
            .filter(|c| check_quality(c, req.speaker_name, req.others).is_ok())
            .filter(|c| is_novel(c, &text, req.gates))
            .ok_or(SkipReason::Repetition)?;
        text = candidate;
    }

    Ok(text)
}

/// Answer a direct message from the operator.
///
/// Only the empty-reply retry applies; a reply that fails the quality
/// gate is dropped rather than corrected.
pub async fn generate_reply(llm: &LlmExecutor, req: &TurnRequest<'_>, message: &str) -> Option<String> {
    let first = match llm.chat(req.messages.to_vec(), FIRST_TEMPERATURE).await {
        Ok(raw) => req.finish(&raw),
        Err(e) => {
            tracing::debug!(speaker = %req.speaker_name, error = %e, "reply generation failed");
            None
        }
    };
    let text = match first {
        Some(text) => text,
        None => {
            let correction = format!(
                "You are {}. Answer the operator's '{}'. BRIEFLY, 1-2 sentences. \
                 Do not write for others.",
                req.speaker_name,
                truncate_chars(message, 80)
            );
            req.retry(llm, correction, EMPTY_RETRY_TEMPERATURE).await?
        }
    };
    match check_quality(&text, req.speaker_name, req.others) {
        Ok(()) => Some(text),
        Err(issue) => {
            tracing::info!(speaker = %req.speaker_name, reason = %issue, "reply rejected by quality gate");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::llm::{BoxLlmProvider, RetryPolicy};
    use crate::testing::ScriptedProvider;
    use colloquy_types::config::{LlmConfig, MemoryConfig};
    use colloquy_types::llm::LlmError;
    use colloquy_types::persona::{Archetype, Demographics, PersonaId, PersonaProfile, Species};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn executor(provider: &ScriptedProvider) -> LlmExecutor {
        LlmExecutor::new(Arc::new(BoxLlmProvider::new(provider.clone())), &LlmConfig::default())
            .with_policy(RetryPolicy::new(1, Duration::from_millis(1)))
    }

    fn alice() -> Persona {
        let profile = PersonaProfile {
            name: "Alice".into(),
            species: Species::Human,
            archetype: Archetype::Altruist,
            demographics: Demographics::default(),
            traits: None,
        };
        let mut rng = StdRng::seed_from_u64(1);
        Persona::new(PersonaId::new("a"), &profile, MemoryConfig::default(), &mut rng)
    }

    struct Fixture {
        persona: Persona,
        others: Vec<String>,
        messages: Vec<Message>,
        recent: Vec<String>,
        own: Vec<String>,
        gates: GateConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                persona: alice(),
                others: vec!["Boris".into()],
                messages: vec![Message::system("sys"), Message::user("Your turn.")],
                recent: Vec::new(),
                own: Vec::new(),
                gates: GateConfig::default(),
            }
        }

        fn request(&self) -> TurnRequest<'_> {
            TurnRequest {
                speaker: &self.persona,
                speaker_name: "Alice",
                others: &self.others,
                messages: &self.messages,
                window: RepetitionWindow {
                    recent: &self.recent,
                    own: &self.own,
                    last_utterance: None,
                },
                max_chars: 250,
                retries: 2,
                gates: &self.gates,
            }
        }
    }

    #[tokio::test]
    async fn clean_reply_is_accepted_first_time() {
        let fx = Fixture::new();
        let provider = ScriptedProvider::new(["Alice: We should collect rainwater before dusk."]);
        let mut rng = StdRng::seed_from_u64(2);
        let text = generate_turn(&executor(&provider), &fx.request(), &mut rng).await;
        assert_eq!(text.unwrap(), "We should collect rainwater before dusk.");
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn client_error_skips_immediately() {
        let fx = Fixture::new();
        let provider = ScriptedProvider::failing(LlmError::Client {
            status: 400,
            message: "bad".into(),
        });
        let mut rng = StdRng::seed_from_u64(2);
        let result = generate_turn(&executor(&provider), &fx.request(), &mut rng).await;
        assert_eq!(result, Err(SkipReason::Generation));
        assert_eq!(provider.requests().len(), 1);
    }

    #[tokio::test]
    async fn empty_reply_gets_one_brief_retry() {
        let fx = Fixture::new();
        let provider = ScriptedProvider::new(["<think>...</think>", "I think the cave is safer tonight."]);
        let mut rng = StdRng::seed_from_u64(2);
        let text = generate_turn(&executor(&provider), &fx.request(), &mut rng).await.unwrap();
        assert_eq!(text, "I think the cave is safer tonight.");
        let retry = provider.requests()[1].clone();
        assert_eq!(retry.temperature, EMPTY_RETRY_TEMPERATURE);
        assert!(retry.messages.last().unwrap().content.contains("Answer BRIEFLY"));
    }

    #[tokio::test]
    async fn quality_rejection_is_corrected() {
        let fx = Fixture::new();
        let provider = ScriptedProvider::new([
            "I will cut myself to prove my point today.",
            "Let us check the supplies before nightfall.",
        ]);
        let mut rng = StdRng::seed_from_u64(2);
        let text = generate_turn(&executor(&provider), &fx.request(), &mut rng).await.unwrap();
        assert_eq!(text, "Let us check the supplies before nightfall.");
        let requests = provider.requests();
        let correction = &requests[1].messages.last().unwrap().content;
        assert!(correction.starts_with("STOP! Reply rejected: dangerous action"));
    }

    #[tokio::test]
    async fn persistent_quality_failure_skips() {
        let fx = Fixture::new();
        let provider = ScriptedProvider::new(["I will cut myself to prove my point today."]);
        let mut rng = StdRng::seed_from_u64(2);
        let result = generate_turn(&executor(&provider), &fx.request(), &mut rng).await;
        assert_eq!(result, Err(SkipReason::Quality));
        assert_eq!(provider.requests().len(), 3);
    }

    #[tokio::test]
    async fn repetition_retry_must_be_novel() {
        let mut fx = Fixture::new();
        fx.own = vec!["We must build a raft from the palm logs.".into()];
        let provider = ScriptedProvider::new([
            "We must build a raft from the palm logs.",
            "We must build a raft from the palm logs now.",
        ]);
        let mut rng = StdRng::seed_from_u64(2);
        let result = generate_turn(&executor(&provider), &fx.request(), &mut rng).await;
        assert_eq!(result, Err(SkipReason::Repetition));
        let retry = &provider.requests()[1];
        assert_eq!(retry.temperature, REPETITION_RETRY_TEMPERATURE);
        assert!(retry.messages.last().unwrap().content.contains("COMPLETELY DIFFERENT"));
    }

    #[tokio::test]
    async fn novel_retry_replaces_repeat() {
        let mut fx = Fixture::new();
        fx.own = vec!["We must build a raft from the palm logs.".into()];
        let provider = ScriptedProvider::new([
            "We must build a raft from the palm logs.",
            "Has anyone seen where Boris hid the knife?",
        ]);
        let mut rng = StdRng::seed_from_u64(2);
        let text = generate_turn(&executor(&provider), &fx.request(), &mut rng).await.unwrap();
        assert_eq!(text, "Has anyone seen where Boris hid the knife?");
    }

    #[tokio::test]
    async fn stuck_speaker_gets_style_change() {
        let mut fx = Fixture::new();
        fx.persona.consecutive_similar = fx.gates.consecutive_limit;
        fx.own = vec!["We must build a raft from the palm logs.".into()];
        let provider = ScriptedProvider::new([
            "We must build a raft from the palm logs.",
            "Has anyone seen where Boris hid the knife?",
        ]);
        let mut rng = StdRng::seed_from_u64(2);
        generate_turn(&executor(&provider), &fx.request(), &mut rng).await.unwrap();
        let requests = provider.requests();
        let correction = &requests[1].messages.last().unwrap().content;
        assert!(correction.contains("REQUIRED:"));
    }

    #[tokio::test]
    async fn operator_reply_skips_repetition_gate() {
        let mut fx = Fixture::new();
        fx.own = vec!["The raft is nearly ready.".into()];
        let provider = ScriptedProvider::new(["The raft is nearly ready."]);
        let reply = generate_reply(&executor(&provider), &fx.request(), "How is the raft?").await;
        assert_eq!(reply.as_deref(), Some("The raft is nearly ready."));
    }

    #[tokio::test]
    async fn unsafe_operator_reply_is_dropped() {
        let fx = Fixture::new();
        let provider = ScriptedProvider::new(["I would rather cut myself than answer."]);
        assert!(generate_reply(&executor(&provider), &fx.request(), "Why?").await.is_none());
        assert_eq!(provider.requests().len(), 1);
    }
}
