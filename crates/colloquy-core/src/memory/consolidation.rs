//! Rename consolidation.
//!
//! When a persona is renamed, every item that mentions the old name is
//! folded into name-substituted summaries so prompts never carry the stale
//! name again.

use chrono::Utc;
use regex::{NoExpand, Regex};

use colloquy_types::llm::Message;
use colloquy_types::memory::{MemoryItem, MemoryKind};

use super::compression::{
    SUMMARY_LABEL, SUMMARY_TEMPERATURE, episode_transcript, split_episodes, tick_range,
};
use super::store::PersonaMemory;
use crate::llm::LlmExecutor;
use crate::text::truncate_chars;

const MAX_RENAME_SUMMARIES: usize = 3;
const RENAME_IMPORTANCE: f64 = 0.7;

/// Case-insensitive replacement of every occurrence of `old`.
pub fn replace_name(text: &str, old: &str, new: &str) -> String {
    match Regex::new(&format!("(?i){}", regex::escape(old))) {
        Ok(re) => re.replace_all(text, NoExpand(new)).into_owned(),
        Err(_) => text.to_string(),
    }
}

fn mentions(item: &MemoryItem, old_lower: &str) -> bool {
    item.text.to_lowercase().contains(old_lower) || item.speaker_label.to_lowercase() == old_lower
}

impl PersonaMemory {
    /// Replace every memory of `old` with summaries written under `new`.
    ///
    /// Returns how many items were consolidated.
    #[tracing::instrument(skip(self, llm), fields(persona = %self.owner))]
    pub async fn consolidate_rename(&mut self, old: &str, new: &str, llm: &LlmExecutor) -> usize {
        let old_lower = old.to_lowercase();
        if old_lower.is_empty() {
            return 0;
        }

        let affected: Vec<MemoryItem> = self
            .short_term
            .iter()
            .chain(&self.long_term)
            .filter(|m| mentions(m, &old_lower))
            .cloned()
            .collect();
        let affected_count = affected.len();

        let mut summaries = Vec::new();
        if !affected.is_empty() {
            let episodes = split_episodes(affected, self.config.episode_gap_ticks);
            for episode in episodes.iter().take(MAX_RENAME_SUMMARIES) {
                if let Some(item) = summarize_renamed(llm, episode, old, new).await {
                    summaries.push(item);
                }
            }
        }

        self.short_term.retain(|m| !mentions(m, &old_lower));
        self.long_term.retain(|m| !mentions(m, &old_lower));
        self.long_term.extend(summaries);

        for item in self.short_term.iter_mut().chain(self.long_term.iter_mut()) {
            if item.speaker_label == old {
                item.speaker_label = new.to_string();
            }
        }

        self.index
            .retain(|d| !d.text.to_lowercase().contains(&old_lower));
        self.index.relabel(old, new);
        for d in &mut self.group_decisions {
            d.decision = replace_name(&d.decision, old, new);
            if d.proposer_label.to_lowercase() == old_lower {
                d.proposer_label = new.to_string();
            }
        }
        for q in &mut self.pending_questions {
            q.question = replace_name(&q.question, old, new);
            if q.from_label.to_lowercase() == old_lower {
                q.from_label = new.to_string();
            }
        }
        for action in &mut self.completed_actions {
            *action = replace_name(action, old, &new.to_lowercase());
        }
        self.dirty = true;

        tracing::info!(old, new, affected = affected_count, "Consolidated memory before rename");
        affected_count
    }
}

async fn summarize_renamed(
    llm: &LlmExecutor,
    episode: &[MemoryItem],
    old: &str,
    new: &str,
) -> Option<MemoryItem> {
    let (first, last) = tick_range(episode);
    let messages = vec![
        Message::system(format!(
            "Character '{old}' was renamed to '{new}'. \
             Compress the episode (ticks {first}-{last}) into 1-2 sentences, \
             replacing every mention of '{old}' with '{new}'. \
             Keep the key actions and decisions. No tags."
        )),
        Message::user(format!(
            "Episode:\n{}\n\nSummary:",
            episode_transcript(episode)
        )),
    ];
    match llm.chat(messages, SUMMARY_TEMPERATURE).await {
        Ok(summary) if !summary.trim().is_empty() => {
            let cleaned = replace_name(summary.trim(), old, new);
            let cleaned = truncate_chars(&cleaned, 250);
            // A new name containing the old one would carry it back in the marker.
            let text = if new.to_lowercase().contains(&old.to_lowercase()) {
                cleaned.to_string()
            } else {
                format!("[renamed to {new}] {cleaned}")
            };
            Some(MemoryItem {
                tick: last,
                speaker_id: None,
                speaker_label: SUMMARY_LABEL.to_string(),
                text,
                importance: RENAME_IMPORTANCE,
                kind: MemoryKind::Summary,
                addressee: None,
                recorded_at: Utc::now(),
            })
        }
        Ok(_) => None,
        Err(err) => {
            tracing::debug!(error = %err, "Rename summary failed, dropping episode");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use colloquy_types::config::{LlmConfig, MemoryConfig};
    use colloquy_types::persona::PersonaId;

    use super::*;
    use crate::llm::{BoxLlmProvider, RetryPolicy};
    use crate::memory::store::NewMemory;
    use crate::testing::ScriptedProvider;

    fn executor(provider: &ScriptedProvider) -> LlmExecutor {
        LlmExecutor::new(
            Arc::new(BoxLlmProvider::new(provider.clone())),
            &LlmConfig::default(),
        )
        .with_policy(RetryPolicy::new(1, Duration::ZERO))
    }

    #[test]
    fn replace_name_is_case_insensitive() {
        assert_eq!(
            replace_name("ALICE said alice was right", "Alice", "Gwen"),
            "Gwen said Gwen was right"
        );
        assert_eq!(replace_name("cost $1", "$1", "x"), "cost x");
    }

    #[tokio::test]
    async fn old_name_never_survives() {
        let provider = ScriptedProvider::new(["Alice fixed the roof with Boris."]);
        let mut mem = PersonaMemory::new(PersonaId::numbered(2), MemoryConfig::default());
        mem.add(
            NewMemory::new(1, "Alice", "I will fix the roof today")
                .speaker(PersonaId::numbered(1)),
        );
        mem.add(NewMemory::new(2, "Boris", "Thanks alice, I'll help").speaker(PersonaId::numbered(2)));
        mem.add(NewMemory::new(9, "Boris", "The weather is calm now").speaker(PersonaId::numbered(2)));
        mem.add_group_decision(1, "Alice", Some(PersonaId::numbered(1)), "Alice repairs the roof");

        let affected = mem.consolidate_rename("Alice", "Gwen", &executor(&provider)).await;
        assert_eq!(affected, 2);

        let all: Vec<&MemoryItem> = mem.short_term().iter().chain(mem.long_term()).collect();
        assert!(all.iter().all(|m| !m.text.to_lowercase().contains("alice")));
        assert!(all.iter().all(|m| m.speaker_label != "Alice"));
        let summary = mem
            .long_term()
            .iter()
            .find(|m| m.kind == MemoryKind::Summary)
            .unwrap();
        assert_eq!(summary.text, "[renamed to Gwen] Gwen fixed the roof with Boris.");
        assert_eq!(mem.group_decisions()[0].decision, "Gwen repairs the roof");
        assert_eq!(mem.group_decisions()[0].proposer_label, "Gwen");
        assert!(mem
            .index()
            .documents()
            .iter()
            .all(|d| !d.text.to_lowercase().contains("alice")));
    }

    #[tokio::test]
    async fn extended_name_gets_no_marker() {
        let provider = ScriptedProvider::new(["Ann kept watch all night."]);
        let mut mem = PersonaMemory::new(PersonaId::numbered(2), MemoryConfig::default());
        mem.add(NewMemory::new(1, "Ann", "I will keep watch").speaker(PersonaId::numbered(1)));

        mem.consolidate_rename("Ann", "Annabel", &executor(&provider)).await;
        let summary = mem
            .long_term()
            .iter()
            .find(|m| m.kind == MemoryKind::Summary)
            .unwrap();
        assert_eq!(summary.text, "Annabel kept watch all night.");
    }
}
