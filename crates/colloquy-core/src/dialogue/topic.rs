//! Topic rotation: when to move on and what to talk about next.

use std::collections::HashSet;

use rand::Rng;
use rand::seq::SliceRandom;

use colloquy_types::llm::Message;
use colloquy_types::scenario::{Scenario, TopicState};

use crate::llm::{LlmExecutor, strip_think_tags};

const TOPIC_TEMPERATURE: f64 = 0.9;
const RECENT_TOPICS_IN_PROMPT: usize = 5;
/// Messages after which a topic rotates even if someone never spoke on it.
const GRACE_MESSAGES: usize = 5;

/// Fallback topics keyed by a word in the scenario context.
const FALLBACK_TOPICS: &[(&str, &[&str])] = &[
    (
        "zombie",
        &[
            "who keeps watch tonight while the rest sleep?",
            "the ammo is almost gone, how do we ration it?",
        ],
    ),
    (
        "island",
        &[
            "how do we signal the ships passing on the horizon?",
            "who goes to the other side of the island for fruit?",
        ],
    ),
    (
        "space station",
        &[
            "oxygen is at forty percent, what do we shut down first?",
            "who goes outside to repair the antenna?",
        ],
    ),
    (
        "tavern",
        &[
            "the stranger in the corner keeps staring, what do we do?",
            "who pays for tonight's round?",
        ],
    ),
];

const DEFAULT_TOPICS: &[&str] = &[
    "what does real friendship mean to you?",
    "how do you cope when things get hard?",
];

#[derive(Debug, Clone)]
pub struct TopicTracker {
    threshold: usize,
    current: Option<String>,
    messages_on_topic: usize,
    respondents: HashSet<String>,
    discussed: Vec<String>,
}

impl TopicTracker {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            current: None,
            messages_on_topic: 0,
            respondents: HashSet::new(),
            discussed: Vec::new(),
        }
    }

    /// Rebuild from persisted state. Respondents are not persisted.
    pub fn restore(threshold: usize, state: TopicState) -> Self {
        Self {
            threshold,
            current: state.current_topic,
            messages_on_topic: state.messages_on_topic,
            respondents: HashSet::new(),
            discussed: state.discussed_topics,
        }
    }

    pub fn state(&self) -> TopicState {
        TopicState {
            current_topic: self.current.clone(),
            messages_on_topic: self.messages_on_topic,
            discussed_topics: self.discussed.clone(),
            ..TopicState::default()
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn messages_on_topic(&self) -> usize {
        self.messages_on_topic
    }

    pub fn discussed(&self) -> &[String] {
        &self.discussed
    }

    pub fn record_message(&mut self, speaker_label: &str) {
        self.messages_on_topic += 1;
        self.respondents.insert(speaker_label.to_string());
    }

    /// Whether the topic has run its course for a group of `persona_count`.
    pub fn should_change(&self, persona_count: usize) -> bool {
        if self.respondents.len() < persona_count
            && self.messages_on_topic < self.threshold + GRACE_MESSAGES
        {
            return false;
        }
        self.messages_on_topic >= self.threshold
    }

    /// Make `topic` current and reset the per-topic counters.
    pub fn set_topic(&mut self, topic: impl Into<String>) {
        let topic = topic.into();
        self.discussed.push(topic.clone());
        self.current = Some(topic);
        self.messages_on_topic = 0;
        self.respondents.clear();
    }

    /// Ask the backend for a fresh topic and make it current.
    ///
    /// Falls back to a scenario-keyed list when generation fails or the
    /// reply is too short to be a topic.
    #[tracing::instrument(skip(self, llm, scenario, rng), fields(scenario = %scenario.key))]
    pub async fn new_topic<R: Rng>(
        &mut self,
        llm: &LlmExecutor,
        scenario: &Scenario,
        rng: &mut R,
    ) -> String {
        let messages = vec![
            Message::system(self.generation_prompt(scenario)),
            Message::user(
                "Suggest a new CONCRETE topic for discussion. Only the topic, no extra words.",
            ),
        ];
        let topic = match llm.chat(messages, TOPIC_TEMPERATURE).await {
            Ok(raw) => clean_topic(&raw),
            Err(e) => {
                tracing::warn!(error = %e, "topic generation failed, using fallback");
                None
            }
        };
        let topic = topic.unwrap_or_else(|| fallback_topic(&scenario.context, rng));
        tracing::info!(topic = %topic, "new topic");
        self.set_topic(topic.clone());
        topic
    }

    fn generation_prompt(&self, scenario: &Scenario) -> String {
        let mut prompt = String::from("You are a creative moderator of a group discussion.\n");
        if !scenario.context.is_empty() {
            prompt.push_str(&format!(
                "\nSITUATION: {}\nThe topic MUST relate to this situation!\n",
                scenario.context
            ));
        }
        if !self.discussed.is_empty() {
            let start = self.discussed.len().saturating_sub(RECENT_TOPICS_IN_PROMPT);
            prompt.push_str(&format!(
                "\nAlready discussed (DO NOT REPEAT): {}\n",
                self.discussed[start..].join(", ")
            ));
        }
        prompt.push_str(
            "\nTOPIC RULES:\n\
             - CONCRETE and PRACTICAL, not abstract\n\
             - Tied to the current situation\n\
             - A question or a call to action\n\
             - Short, one sentence\n\
             \n\
             GOOD: \"We need to decide who keeps watch at night\", \
             \"Food is left for three days, what do we do?\"\n\
             BAD: \"The meaning of life\", \"What is friendship?\" (too abstract)\n\
             \n\
             Return ONLY the topic text.",
        );
        prompt
    }
}

fn clean_topic(raw: &str) -> Option<String> {
    let topic = strip_think_tags(raw)
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_lowercase();
    (topic.chars().count() >= 5).then_some(topic)
}

fn fallback_topic<R: Rng>(context: &str, rng: &mut R) -> String {
    let context = context.to_lowercase();
    let pool = FALLBACK_TOPICS
        .iter()
        .find(|(key, _)| context.contains(key))
        .map(|(_, topics)| *topics)
        .unwrap_or(DEFAULT_TOPICS);
    pool.choose(rng)
        .copied()
        .unwrap_or(DEFAULT_TOPICS[0])
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use colloquy_types::config::LlmConfig;
    use colloquy_types::llm::LlmError;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::llm::BoxLlmProvider;
    use crate::testing::ScriptedProvider;

    fn executor(provider: ScriptedProvider) -> LlmExecutor {
        let config = LlmConfig {
            max_retries: 1,
            retry_delay_secs: 0.0,
            ..LlmConfig::default()
        };
        LlmExecutor::new(Arc::new(BoxLlmProvider::new(provider)), &config)
    }

    fn island() -> Scenario {
        Scenario {
            key: "desert_island".into(),
            name: "Desert Island".into(),
            description: "Stranded after a shipwreck".into(),
            context: "You are stranded on a desert island".into(),
            events: vec![],
        }
    }

    #[test]
    fn waits_for_every_persona_until_grace_runs_out() {
        let mut tracker = TopicTracker::new(3);
        for _ in 0..3 {
            tracker.record_message("Alice");
        }
        assert!(!tracker.should_change(2));
        tracker.record_message("Boris");
        assert!(tracker.should_change(2));

        let mut lonely = TopicTracker::new(3);
        for _ in 0..8 {
            lonely.record_message("Alice");
        }
        assert!(lonely.should_change(3));
    }

    #[test]
    fn set_topic_resets_counters() {
        let mut tracker = TopicTracker::new(15);
        tracker.record_message("Alice");
        tracker.set_topic("who fetches water?");
        assert_eq!(tracker.messages_on_topic(), 0);
        assert_eq!(tracker.current(), Some("who fetches water?"));
        assert_eq!(tracker.discussed().len(), 1);

        let restored = TopicTracker::restore(15, tracker.state());
        assert_eq!(restored.current(), Some("who fetches water?"));
    }

    #[tokio::test]
    async fn generated_topic_is_cleaned() {
        let provider = ScriptedProvider::new(["<think>hmm</think>\"Who Builds The Raft?\""]);
        let mut tracker = TopicTracker::new(15);
        tracker.set_topic("who fetches water?");
        let mut rng = StdRng::seed_from_u64(1);
        let topic = tracker.new_topic(&executor(provider.clone()), &island(), &mut rng).await;
        assert_eq!(topic, "who builds the raft?");

        let prompt = &provider.system_prompts()[0];
        assert!(prompt.contains("desert island"));
        assert!(prompt.contains("who fetches water?"));
    }

    #[tokio::test]
    async fn failure_falls_back_to_scenario_topics() {
        let provider = ScriptedProvider::failing(LlmError::Client {
            status: 400,
            message: "bad".into(),
        });
        let mut tracker = TopicTracker::new(15);
        let mut rng = StdRng::seed_from_u64(7);
        let topic = tracker.new_topic(&executor(provider), &island(), &mut rng).await;
        let island_topics = FALLBACK_TOPICS[1].1;
        assert!(island_topics.contains(&topic.as_str()));
    }

    #[test]
    fn short_replies_are_rejected() {
        assert_eq!(clean_topic("ok"), None);
        assert_eq!(clean_topic("  'Fire?'  "), Some("fire?".into()));
    }
}
