//! Budgeted memory compression.
//!
//! Triggered when a persona's buffers reach the compression threshold.
//! Keeps the freshest items verbatim, protects recent events, ranks the rest
//! by decayed importance and folds what is left into episode summaries.

use chrono::Utc;

use colloquy_types::llm::Message;
use colloquy_types::memory::{MemoryItem, MemoryKind};

use super::store::PersonaMemory;
use crate::llm::LlmExecutor;
use crate::text::truncate_chars;

const MAX_FRESH: usize = 10;
const MAX_CRITICAL: usize = 8;
const MAX_SUMMARIES: usize = 4;
const MIN_LEFTOVER_FOR_SUMMARY: usize = 5;
const SUMMARY_IMPORTANCE: f64 = 0.65;
pub(crate) const SUMMARY_LABEL: &str = "[SUMMARY]";
pub(crate) const SUMMARY_TEMPERATURE: f64 = 0.3;

/// Split tick-sorted items wherever the gap exceeds `max_gap`.
pub(crate) fn split_episodes(mut items: Vec<MemoryItem>, max_gap: u64) -> Vec<Vec<MemoryItem>> {
    items.sort_by_key(|m| m.tick);
    let mut episodes: Vec<Vec<MemoryItem>> = Vec::new();
    for item in items {
        match episodes.last_mut() {
            Some(current)
                if current
                    .last()
                    .is_some_and(|last| item.tick.saturating_sub(last.tick) <= max_gap) =>
            {
                current.push(item);
            }
            _ => episodes.push(vec![item]),
        }
    }
    episodes
}

/// `[tick t] [label]: text` lines of an episode, texts cut to 80 chars.
pub(crate) fn episode_transcript(episode: &[MemoryItem]) -> String {
    episode
        .iter()
        .map(|m| {
            format!(
                "[tick {}] [{}]: {}",
                m.tick,
                m.speaker_label,
                truncate_chars(&m.text, 80)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn tick_range(episode: &[MemoryItem]) -> (u64, u64) {
    let first = episode.first().map(|m| m.tick).unwrap_or(0);
    let last = episode.last().map(|m| m.tick).unwrap_or(first);
    (first, last)
}

fn has_event(episode: &[MemoryItem]) -> bool {
    episode.iter().any(|m| m.kind == MemoryKind::Event)
}

/// Pick at most [`MAX_SUMMARIES`] episodes out of `leftover`.
///
/// Every leftover event lands in exactly one selected episode: episodes
/// holding events come first, and when there are too many of them the
/// overflow is merged into the last slot. Plain episodes need two items and
/// a leftover larger than [`MIN_LEFTOVER_FOR_SUMMARY`].
pub(crate) fn select_episodes(leftover: Vec<MemoryItem>, max_gap: u64) -> Vec<Vec<MemoryItem>> {
    let summarize_plain = leftover.len() > MIN_LEFTOVER_FOR_SUMMARY;
    let (mut selected, plain): (Vec<_>, Vec<_>) = split_episodes(leftover, max_gap)
        .into_iter()
        .partition(|e| has_event(e));

    if selected.len() > MAX_SUMMARIES {
        let overflow: Vec<MemoryItem> = selected
            .split_off(MAX_SUMMARIES - 1)
            .into_iter()
            .flatten()
            .collect();
        selected.push(overflow);
    }

    if summarize_plain {
        let room = MAX_SUMMARIES - selected.len();
        selected.extend(plain.into_iter().filter(|e| e.len() >= 2).take(room));
    }
    selected.sort_by_key(|e| e.first().map(|m| m.tick));
    selected
}

/// How the buffers will be split before any generation happens.
#[derive(Debug, Clone, Default)]
pub struct CompressionPlan {
    pub fresh: Vec<MemoryItem>,
    pub critical: Vec<MemoryItem>,
    pub kept: Vec<MemoryItem>,
    /// Episodes to summarize, at most four. Events not kept verbatim are
    /// all in here.
    pub episodes: Vec<Vec<MemoryItem>>,
}

/// Outcome counters, logged after every compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionReport {
    pub before: usize,
    pub after: usize,
    pub summaries: usize,
    pub failed_summaries: usize,
}

impl PersonaMemory {
    /// Decide what survives compression.
    ///
    /// The budget reserves one slot per possible summary so the result never
    /// exceeds 60% of the threshold.
    pub fn plan_compression(&self) -> CompressionPlan {
        let all: Vec<MemoryItem> = self
            .short_term
            .iter()
            .chain(&self.long_term)
            .cloned()
            .collect();
        let target = (self.config.compression_threshold as f64 * 0.6) as usize;
        let fresh_count = MAX_FRESH.min(all.len() / 3);
        let split = all.len() - fresh_count;
        let (older, fresh) = all.split_at(split);
        let now = self.latest_tick();

        let mut events: Vec<&MemoryItem> =
            older.iter().filter(|m| m.kind == MemoryKind::Event).collect();
        events.sort_by(|a, b| b.tick.cmp(&a.tick));
        events.truncate(MAX_CRITICAL);
        let critical: Vec<MemoryItem> = events.into_iter().cloned().collect();

        let mut critical_left = critical.clone();
        let mut regular: Vec<MemoryItem> = Vec::new();
        for item in older {
            if let Some(pos) = critical_left.iter().position(|c| c == item) {
                critical_left.swap_remove(pos);
            } else {
                regular.push(item.clone());
            }
        }
        regular.sort_by(|a, b| {
            self.decayed_importance(b, now)
                .total_cmp(&self.decayed_importance(a, now))
        });

        let slots = target
            .saturating_sub(fresh.len())
            .saturating_sub(critical.len())
            .saturating_sub(MAX_SUMMARIES);
        let leftover = if regular.len() > slots {
            regular.split_off(slots)
        } else {
            Vec::new()
        };

        let episodes = select_episodes(leftover, self.config.episode_gap_ticks);

        CompressionPlan {
            fresh: fresh.to_vec(),
            critical,
            kept: regular,
            episodes,
        }
    }

    /// Compress both buffers, summarizing leftover episodes.
    ///
    /// A failed summary call drops a plain episode. An episode holding events
    /// is replaced by a digest of those events instead. Nothing is retried
    /// beyond the executor's own policy.
    #[tracing::instrument(skip(self, llm), fields(persona = %self.owner))]
    pub async fn compress(&mut self, llm: &LlmExecutor) -> CompressionReport {
        let before = self.total_len();
        let plan = self.plan_compression();

        let mut summaries = Vec::new();
        let mut failed = 0;
        for episode in &plan.episodes {
            match summarize_episode(llm, episode).await {
                Some(item) => summaries.push(item),
                None => {
                    failed += 1;
                    summaries.extend(event_digest(episode));
                }
            }
        }

        let summary_count = summaries.len();
        let mut long_term = plan.critical;
        long_term.extend(plan.kept);
        long_term.extend(summaries);
        self.short_term = plan.fresh;
        self.long_term = long_term;
        self.dirty = true;

        let report = CompressionReport {
            before,
            after: self.total_len(),
            summaries: summary_count,
            failed_summaries: failed,
        };
        tracing::info!(
            before = report.before,
            after = report.after,
            summaries = report.summaries,
            failed = report.failed_summaries,
            "Compressed memory"
        );
        report
    }
}

async fn summarize_episode(llm: &LlmExecutor, episode: &[MemoryItem]) -> Option<MemoryItem> {
    let (first, last) = tick_range(episode);
    let messages = vec![
        Message::system(format!(
            "Compress the dialogue episode (ticks {first}-{last}) into 1-2 key points. \
             Keep who DID what, the results and the decisions. \
             Each point is one short sentence. No tags."
        )),
        Message::user(format!(
            "Episode:\n{}\n\nKey points:",
            episode_transcript(episode)
        )),
    ];
    match llm.chat(messages, SUMMARY_TEMPERATURE).await {
        Ok(summary) if !summary.trim().is_empty() => Some(summary_item(
            episode,
            truncate_chars(summary.trim(), 250).to_string(),
        )),
        Ok(_) => None,
        Err(err) => {
            tracing::debug!(error = %err, first, last, "Episode summary failed");
            None
        }
    }
}

fn summary_item(episode: &[MemoryItem], body: String) -> MemoryItem {
    let (first, last) = tick_range(episode);
    MemoryItem {
        tick: last,
        speaker_id: None,
        speaker_label: SUMMARY_LABEL.to_string(),
        text: format!("[ticks {first}-{last}] {body}"),
        importance: SUMMARY_IMPORTANCE,
        kind: MemoryKind::Summary,
        addressee: None,
        recorded_at: Utc::now(),
    }
}

/// Generation-free stand-in for an episode whose summary failed.
fn event_digest(episode: &[MemoryItem]) -> Option<MemoryItem> {
    let events: Vec<String> = episode
        .iter()
        .filter(|m| m.kind == MemoryKind::Event)
        .map(|m| truncate_chars(&m.text, 60).to_string())
        .collect();
    if events.is_empty() {
        return None;
    }
    Some(summary_item(episode, format!("Events: {}", events.join("; "))))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use colloquy_types::config::{LlmConfig, MemoryConfig};
    use colloquy_types::llm::LlmError;
    use colloquy_types::persona::PersonaId;

    use super::*;
    use crate::llm::{BoxLlmProvider, RetryPolicy};
    use crate::memory::store::NewMemory;
    use crate::testing::ScriptedProvider;

    fn filled_memory(threshold: usize) -> PersonaMemory {
        let config = MemoryConfig {
            compression_threshold: threshold,
            short_term_capacity: 1000,
            ..MemoryConfig::default()
        };
        let mut mem = PersonaMemory::new(PersonaId::numbered(1), config);
        for tick in 0..threshold as u64 {
            let kind = if tick % 10 == 0 {
                MemoryKind::Event
            } else {
                MemoryKind::Speech
            };
            mem.add(
                NewMemory::new(tick, "Boris", format!("Line number {tick} about the raft"))
                    .importance(0.3 + (tick % 7) as f64 * 0.1)
                    .kind(kind),
            );
        }
        mem
    }

    fn executor(provider: &ScriptedProvider) -> LlmExecutor {
        LlmExecutor::new(
            Arc::new(BoxLlmProvider::new(provider.clone())),
            &LlmConfig::default(),
        )
        .with_policy(RetryPolicy::new(1, Duration::ZERO))
    }

    #[test]
    fn episodes_split_on_gaps() {
        let mem = filled_memory(10);
        let items: Vec<MemoryItem> = mem
            .short_term()
            .iter()
            .filter(|m| [1, 2, 4, 8, 9].contains(&m.tick))
            .cloned()
            .collect();
        let episodes = split_episodes(items, 3);
        let ticks: Vec<Vec<u64>> = episodes
            .iter()
            .map(|e| e.iter().map(|m| m.tick).collect())
            .collect();
        assert_eq!(ticks, vec![vec![1, 2, 4], vec![8, 9]]);
    }

    /// 80 items five ticks apart, so every item is its own episode. Every
    /// fourth item is an unimportant event.
    fn scattered_events() -> PersonaMemory {
        let config = MemoryConfig {
            compression_threshold: 80,
            short_term_capacity: 1000,
            ..MemoryConfig::default()
        };
        let mut mem = PersonaMemory::new(PersonaId::numbered(1), config);
        for i in 0..80u64 {
            let tick = i * 5;
            let new = if i % 4 == 0 {
                NewMemory::new(tick, "[EVENT]", format!("Alarm at tick {tick}!"))
                    .importance(0.0)
                    .kind(MemoryKind::Event)
            } else {
                NewMemory::new(tick, "Boris", format!("Line number {tick} about the raft"))
                    .importance(0.9)
            };
            mem.add(new);
        }
        mem
    }

    fn event_ticks<'a>(items: impl IntoIterator<Item = &'a MemoryItem>) -> Vec<u64> {
        let mut ticks: Vec<u64> = items
            .into_iter()
            .filter(|m| m.kind == MemoryKind::Event)
            .map(|m| m.tick)
            .collect();
        ticks.sort_unstable();
        ticks
    }

    #[test]
    fn plan_accounts_for_every_event_once() {
        let mem = scattered_events();
        let before = event_ticks(mem.short_term());
        assert_eq!(before.len(), 20);

        let plan = mem.plan_compression();
        let after = event_ticks(
            plan.fresh
                .iter()
                .chain(&plan.critical)
                .chain(&plan.kept)
                .chain(plan.episodes.iter().flatten()),
        );
        assert_eq!(after, before);
        assert!(plan.episodes.len() <= 4);
        let max_after = plan.fresh.len() + plan.critical.len() + plan.kept.len() + plan.episodes.len();
        assert!(max_after <= 48);
    }

    #[test]
    fn singleton_episodes_do_not_take_summary_slots() {
        let item = |tick: u64| MemoryItem {
            tick,
            speaker_id: None,
            speaker_label: "Boris".into(),
            text: format!("line {tick}"),
            importance: 0.5,
            kind: MemoryKind::Speech,
            addressee: None,
            recorded_at: Utc::now(),
        };
        // Singletons at 0, 10, 20, 30, then pairs at 40 and 50.
        let leftover: Vec<MemoryItem> = [0, 10, 20, 30, 40, 41, 50, 51].into_iter().map(item).collect();
        let episodes = select_episodes(leftover, 3);
        let firsts: Vec<u64> = episodes.iter().map(|e| e[0].tick).collect();
        assert_eq!(firsts, vec![40, 50]);
    }

    #[tokio::test]
    async fn failed_summaries_keep_event_digests() {
        let provider = ScriptedProvider::failing(LlmError::Timeout);
        let mut mem = scattered_events();
        let events: Vec<String> = mem
            .short_term()
            .iter()
            .filter(|m| m.kind == MemoryKind::Event)
            .map(|m| m.text.clone())
            .collect();

        let report = mem.compress(&executor(&provider)).await;
        assert!(report.after <= 48);
        assert!(report.failed_summaries >= 1);

        let all: Vec<&MemoryItem> = mem.short_term().iter().chain(mem.long_term()).collect();
        for text in &events {
            let verbatim = all.iter().filter(|m| m.kind == MemoryKind::Event && &m.text == text).count();
            let digested = all
                .iter()
                .filter(|m| m.kind == MemoryKind::Summary && m.text.contains(text.as_str()))
                .count();
            assert_eq!(verbatim + digested, 1, "{text} represented {} times", verbatim + digested);
        }
    }

    #[test]
    fn plan_respects_budget() {
        let mem = filled_memory(80);
        let plan = mem.plan_compression();
        assert_eq!(plan.fresh.len(), 10);
        assert!(plan.critical.len() <= 8);
        assert!(plan.critical.iter().all(|m| m.kind == MemoryKind::Event));
        assert!(plan.episodes.len() <= 4);
        assert!(plan.episodes.iter().all(|e| e.len() >= 2));
        let max_after = plan.fresh.len() + plan.critical.len() + plan.kept.len() + plan.episodes.len();
        assert!(max_after <= 48);
    }

    #[tokio::test]
    async fn compress_shrinks_and_adds_summaries() {
        let provider = ScriptedProvider::new(["Boris built the raft."]);
        let mut mem = filled_memory(80);
        let report = mem.compress(&executor(&provider)).await;
        assert_eq!(report.before, 80);
        assert!(report.after <= 48);
        assert!(report.summaries >= 1);
        let summary = mem
            .long_term()
            .iter()
            .find(|m| m.kind == MemoryKind::Summary)
            .unwrap();
        assert_eq!(summary.speaker_label, SUMMARY_LABEL);
        assert!(summary.text.starts_with("[ticks "));
        assert!(summary.text.ends_with("Boris built the raft."));
        assert_eq!(mem.short_term().len(), 10);
    }

    #[tokio::test]
    async fn failed_summaries_drop_episodes() {
        let provider = ScriptedProvider::failing(LlmError::Timeout);
        let mut mem = filled_memory(80);
        let report = mem.compress(&executor(&provider)).await;
        assert_eq!(report.summaries, 0);
        assert!(report.failed_summaries >= 1);
        assert!(report.after < report.before);
        assert!(mem.long_term().iter().all(|m| m.kind != MemoryKind::Summary));
    }
}
