//! Game-master lines: what an event or an announced action does to the world.
//!
//! Both calls are best-effort. A failed or too-short generation yields
//! `None` and the tick carries on.

use colloquy_types::llm::Message;

use crate::gate::clean_response;
use crate::llm::LlmExecutor;

const CONSEQUENCE_TEMPERATURE: f64 = 0.8;
const RESULT_TEMPERATURE: f64 = 0.9;
const MIN_CONSEQUENCE_CHARS: usize = 10;
const MIN_RESULT_CHARS: usize = 5;
const MAX_CHARS: usize = 300;

async fn narrate(llm: &LlmExecutor, messages: Vec<Message>, temperature: f64, min_chars: usize) -> Option<String> {
    let raw = match llm.chat(messages, temperature).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::debug!(error = %e, "narration failed");
            return None;
        }
    };
    clean_response(&raw, "", &[], MAX_CHARS).filter(|t| t.chars().count() > min_chars)
}

/// How the world changes after `event`.
pub async fn event_consequence(llm: &LlmExecutor, event: &str, scenario_context: &str) -> Option<String> {
    let messages = vec![
        Message::system(format!(
            "You are the game master. Describe the CONSEQUENCE of the event for the \
             surrounding world in 1-2 sentences.\nScenario: {scenario_context}\n\n\
             The consequence must CHANGE the situation: a new danger, an opportunity, or a \
             change of surroundings.\nThis is NOT the characters' reaction but a change in \
             the WORLD around them.\nNo tags. 1-2 sentences."
        )),
        Message::user(format!("Event: {event}\n\nWhat changed in the world?")),
    ];
    narrate(llm, messages, CONSEQUENCE_TEMPERATURE, MIN_CONSEQUENCE_CHARS).await
}

/// Outcome of the action `speaker` announced in `action`.
pub async fn action_result(
    llm: &LlmExecutor,
    speaker: &str,
    action: &str,
    scenario_context: &str,
) -> Option<String> {
    let messages = vec![
        Message::system(format!(
            "You are the game master. Describe the RESULT of the action in 1-2 sentences.\n\
             Scenario: {scenario_context}\n\n\
             Result: success / partial / failure / surprise.\n\
             REALISTIC for the situation. No tags."
        )),
        Message::user(format!("{speaker} does: {action}\n\nWhat happened?")),
    ];
    narrate(llm, messages, RESULT_TEMPERATURE, MIN_RESULT_CHARS).await
}
