//! Per-persona layered memory.
//!
//! Short-term is a bounded FIFO of recent items; long-term keeps what
//! survived eviction or compression. Every added item is also projected into
//! the [`RetrievalIndex`]. Compression and rename consolidation need the
//! generation backend and live in sibling modules.

use std::collections::HashSet;

use chrono::Utc;

use colloquy_types::config::MemoryConfig;
use colloquy_types::memory::{
    GroupDecision, MemoryItem, MemoryKind, MemorySnapshot, PendingQuestion, RetrievalDocument,
};
use colloquy_types::persona::PersonaId;

use super::index::RetrievalIndex;
use crate::persona::registry::NameRegistry;
use crate::text::{similarity, truncate_chars};

const MAX_GROUP_DECISIONS: usize = 15;
const RENDERED_DECISIONS: usize = 8;
const MAX_PENDING_QUESTIONS: usize = 3;
const MAX_COMPLETED_ACTIONS: usize = 20;
const RENDERED_ACTIONS: usize = 8;
const RELEVANT_LONG_TERM: usize = 5;
const RETENTION_IMPORTANCE: f64 = 0.6;

/// Input for [`PersonaMemory::add`].
#[derive(Debug, Clone)]
pub struct NewMemory {
    pub tick: u64,
    pub speaker_id: Option<PersonaId>,
    pub speaker_label: String,
    pub text: String,
    pub importance: f64,
    pub kind: MemoryKind,
    pub addressee: Option<PersonaId>,
}

impl NewMemory {
    pub fn new(tick: u64, speaker_label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tick,
            speaker_id: None,
            speaker_label: speaker_label.into(),
            text: text.into(),
            importance: 0.5,
            kind: MemoryKind::Speech,
            addressee: None,
        }
    }

    pub fn speaker(mut self, id: PersonaId) -> Self {
        self.speaker_id = Some(id);
        self
    }

    pub fn importance(mut self, importance: f64) -> Self {
        self.importance = importance.clamp(0.0, 1.0);
        self
    }

    pub fn kind(mut self, kind: MemoryKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn addressee(mut self, id: Option<PersonaId>) -> Self {
        self.addressee = id;
        self
    }
}

/// What [`PersonaMemory::add`] left for the caller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Stored,
    /// Total size reached the compression threshold; call `compress`.
    CompressionDue,
}

#[derive(Debug, Clone)]
pub struct PersonaMemory {
    pub(super) owner: PersonaId,
    pub(super) config: MemoryConfig,
    pub(super) short_term: Vec<MemoryItem>,
    pub(super) long_term: Vec<MemoryItem>,
    pub(super) completed_actions: Vec<String>,
    pub(super) pending_questions: Vec<PendingQuestion>,
    pub(super) group_decisions: Vec<GroupDecision>,
    pub(super) index: RetrievalIndex,
    pub(super) dirty: bool,
}

impl PersonaMemory {
    pub fn new(owner: PersonaId, config: MemoryConfig) -> Self {
        let index = RetrievalIndex::new(config.max_documents);
        Self {
            owner,
            config,
            short_term: Vec::new(),
            long_term: Vec::new(),
            completed_actions: Vec::new(),
            pending_questions: Vec::new(),
            group_decisions: Vec::new(),
            index,
            dirty: false,
        }
    }

    pub fn owner(&self) -> &PersonaId {
        &self.owner
    }

    pub fn short_term(&self) -> &[MemoryItem] {
        &self.short_term
    }

    pub fn long_term(&self) -> &[MemoryItem] {
        &self.long_term
    }

    pub fn total_len(&self) -> usize {
        self.short_term.len() + self.long_term.len()
    }

    pub fn index(&self) -> &RetrievalIndex {
        &self.index
    }

    /// Whether anything changed since the last [`PersonaMemory::mark_saved`].
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Record an item and index it.
    ///
    /// Evicts the oldest short-term item when the buffer overflows; events,
    /// action results and items above 0.6 importance move to long-term.
    pub fn add(&mut self, new: NewMemory) -> AddOutcome {
        let item = MemoryItem {
            tick: new.tick,
            speaker_id: new.speaker_id,
            speaker_label: new.speaker_label,
            text: new.text,
            importance: new.importance.clamp(0.0, 1.0),
            kind: new.kind,
            addressee: new.addressee,
            recorded_at: Utc::now(),
        };
        self.index.add(RetrievalDocument {
            text: item.text.clone(),
            tick: item.tick,
            importance: item.importance,
            is_event: item.kind == MemoryKind::Event,
            speaker_label: item.speaker_label.clone(),
            speaker_id: item.speaker_id.clone(),
        });
        self.short_term.push(item);
        self.dirty = true;

        if self.total_len() >= self.config.compression_threshold {
            return AddOutcome::CompressionDue;
        }
        if self.short_term.len() > self.config.short_term_capacity {
            let oldest = self.short_term.remove(0);
            if oldest.importance > RETENTION_IMPORTANCE || oldest.kind.is_protected() {
                self.push_long_term(oldest);
            }
        }
        AddOutcome::Stored
    }

    /// Append to long-term, evicting the least important unprotected item
    /// when over capacity.
    fn push_long_term(&mut self, item: MemoryItem) {
        self.long_term.push(item);
        if self.long_term.len() <= self.config.long_term_capacity {
            return;
        }
        let victim = self
            .long_term
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.kind.is_protected())
            .min_by(|a, b| a.1.importance.total_cmp(&b.1.importance))
            .map(|(i, _)| i);
        match victim {
            Some(i) => {
                self.long_term.remove(i);
            }
            None => {
                self.long_term
                    .sort_by(|a, b| b.importance.total_cmp(&a.importance));
                self.long_term.truncate(self.config.long_term_capacity);
            }
        }
    }

    /// Highest tick across both buffers.
    pub fn latest_tick(&self) -> u64 {
        self.short_term
            .iter()
            .chain(&self.long_term)
            .map(|m| m.tick)
            .max()
            .unwrap_or(0)
    }

    /// Importance decayed by age; events decay at the square root of the rate.
    pub fn decayed_importance(&self, item: &MemoryItem, current_tick: u64) -> f64 {
        let age = current_tick.saturating_sub(item.tick);
        let factor = if item.kind == MemoryKind::Event {
            self.config.importance_decay.sqrt()
        } else {
            self.config.importance_decay
        };
        item.importance * factor.powi(age.min(i32::MAX as u64) as i32)
    }

    /// Protected items first, then by decayed importance.
    pub fn relevant_long_term(&self, n: usize) -> Vec<&MemoryItem> {
        let now = self.latest_tick();
        let mut items: Vec<(&MemoryItem, bool, f64)> = self
            .long_term
            .iter()
            .map(|m| (m, m.kind.is_protected(), self.decayed_importance(m, now)))
            .collect();
        items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.2.total_cmp(&a.2)));
        items.into_iter().take(n).map(|(m, _, _)| m).collect()
    }

    // -----------------------------------------------------------------------
    // Auxiliary memory
    // -----------------------------------------------------------------------

    pub fn add_group_decision(
        &mut self,
        tick: u64,
        proposer_label: &str,
        proposer_id: Option<PersonaId>,
        decision: &str,
    ) {
        self.group_decisions.push(GroupDecision {
            tick,
            proposer_label: proposer_label.to_string(),
            proposer_id,
            decision: truncate_chars(decision, 200).to_string(),
        });
        trim_front(&mut self.group_decisions, MAX_GROUP_DECISIONS);
        self.dirty = true;
    }

    pub fn group_decisions(&self) -> &[GroupDecision] {
        &self.group_decisions
    }

    pub fn add_pending_question(
        &mut self,
        tick: u64,
        from_label: &str,
        from_id: Option<PersonaId>,
        question: &str,
    ) {
        self.pending_questions.push(PendingQuestion {
            tick,
            from_label: from_label.to_string(),
            from_id,
            question: truncate_chars(question, 200).to_string(),
        });
        trim_front(&mut self.pending_questions, MAX_PENDING_QUESTIONS);
    }

    pub fn pending_questions(&self) -> &[PendingQuestion] {
        &self.pending_questions
    }

    pub fn has_pending_questions(&self) -> bool {
        !self.pending_questions.is_empty()
    }

    pub fn clear_pending_questions(&mut self) {
        self.pending_questions.clear();
    }

    /// Drop questions asked by a persona that left the session.
    pub fn forget_questions_from(&mut self, id: &PersonaId) {
        self.pending_questions
            .retain(|q| q.from_id.as_ref() != Some(id));
    }

    pub fn record_action(&mut self, action: &str) {
        let normalized = action.trim().to_lowercase();
        self.completed_actions
            .push(truncate_chars(&normalized, 100).to_string());
        trim_front(&mut self.completed_actions, MAX_COMPLETED_ACTIONS);
        self.dirty = true;
    }

    pub fn completed_actions(&self) -> &[String] {
        &self.completed_actions
    }

    pub fn has_done_similar(&self, action: &str) -> bool {
        let normalized = action.trim().to_lowercase();
        self.completed_actions
            .iter()
            .any(|prev| similarity(&normalized, prev) > 0.5)
    }

    // -----------------------------------------------------------------------
    // Prompt rendering
    // -----------------------------------------------------------------------

    fn display(registry: &NameRegistry, id: Option<&PersonaId>, label: &str) -> String {
        match id {
            Some(id) => registry.name_of(id),
            None => label.to_string(),
        }
    }

    pub fn pending_questions_text(&self, registry: &NameRegistry) -> String {
        if self.pending_questions.is_empty() {
            return String::new();
        }
        let mut lines = vec!["=== YOU WERE ASKED / ADDRESSED ===".to_string()];
        for q in &self.pending_questions {
            lines.push(format!(
                "  {} (tick {}): {}",
                Self::display(registry, q.from_id.as_ref(), &q.from_label),
                q.tick,
                q.question
            ));
        }
        lines.push("You MUST answer these questions or react to them!\n".to_string());
        lines.join("\n")
    }

    fn group_decisions_text(&self, registry: &NameRegistry) -> String {
        if self.group_decisions.is_empty() {
            return String::new();
        }
        let mut lines =
            vec!["=== DECISIONS AND PROPOSALS SO FAR (DON'T CONTRADICT THEM!) ===".to_string()];
        let start = self.group_decisions.len().saturating_sub(RENDERED_DECISIONS);
        for d in &self.group_decisions[start..] {
            lines.push(format!(
                "  [tick {}] {}: {}",
                d.tick,
                Self::display(registry, d.proposer_id.as_ref(), &d.proposer_label),
                d.decision
            ));
        }
        lines.push("--- Don't propose actions that contradict these decisions!".to_string());
        lines.push(
            "--- If you proposed something yourself, REMEMBER it and don't do the opposite!\n"
                .to_string(),
        );
        lines.join("\n")
    }

    /// Memory context for the persona prompt.
    ///
    /// Takes `&mut self` because retrieval rebuilds the index lazily.
    pub fn format_for_prompt(&mut self, registry: &NameRegistry) -> String {
        let mut parts: Vec<String> = Vec::new();

        let decisions = self.group_decisions_text(registry);
        if !decisions.is_empty() {
            parts.push(decisions);
        }

        let relevant: Vec<String> = self
            .relevant_long_term(RELEVANT_LONG_TERM)
            .into_iter()
            .map(|m| {
                let prefix = match m.kind {
                    MemoryKind::Event => "EVENT: ",
                    MemoryKind::ActionResult => "RESULT: ",
                    _ => "",
                };
                format!(
                    "  [tick {}] {prefix}[{}]: {}",
                    m.tick,
                    Self::display(registry, m.speaker_id.as_ref(), &m.speaker_label),
                    m.text
                )
            })
            .collect();
        if !relevant.is_empty() {
            parts.push("=== IMPORTANT EVENTS FROM THE PAST ===".to_string());
            parts.extend(relevant);
            parts.push(String::new());
        }

        let recent: Vec<String> = self.short_term[self.short_term.len().saturating_sub(5)..]
            .iter()
            .map(|m| m.text.clone())
            .collect();
        let current_event = self
            .short_term
            .iter()
            .rev()
            .find(|m| m.kind == MemoryKind::Event)
            .map(|m| m.text.clone());
        let exclude: HashSet<u64> = self.short_term[self.short_term.len().saturating_sub(10)..]
            .iter()
            .map(|m| m.tick)
            .collect();
        let hits = self.index.search_by_context(
            &recent,
            current_event.as_deref(),
            self.config.retrieval_top_k,
            &exclude,
        );
        if !hits.is_empty() {
            parts.push("=== RELATED MEMORIES ===".to_string());
            for doc in hits {
                let prefix = if doc.is_event { "[Event] " } else { "" };
                parts.push(format!(
                    "  [tick {}] {prefix}[{}]: {}",
                    doc.tick,
                    Self::display(registry, doc.speaker_id.as_ref(), &doc.speaker_label),
                    truncate_chars(&doc.text, 120)
                ));
            }
            parts.push(String::new());
        }

        if !self.completed_actions.is_empty() {
            parts.push("=== YOU ALREADY DID THIS (DON'T REPEAT!) ===".to_string());
            let start = self.completed_actions.len().saturating_sub(RENDERED_ACTIONS);
            for action in &self.completed_actions[start..] {
                parts.push(format!("  * {action}"));
            }
            parts.push("Come up with a NEW action!\n".to_string());
        }

        parts.join("\n")
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            short_term: self.short_term.clone(),
            long_term: self.long_term.clone(),
            completed_actions: self.completed_actions.clone(),
            group_decisions: self.group_decisions.clone(),
            documents: self.index.documents().to_vec(),
        }
    }

    /// Rebuild from a snapshot. Pending questions are never persisted.
    pub fn restore(owner: PersonaId, config: MemoryConfig, snapshot: MemorySnapshot) -> Self {
        let index = RetrievalIndex::from_documents(snapshot.documents, config.max_documents);
        Self {
            owner,
            config,
            short_term: snapshot.short_term,
            long_term: snapshot.long_term,
            completed_actions: snapshot.completed_actions,
            pending_questions: Vec::new(),
            group_decisions: snapshot.group_decisions,
            index,
            dirty: false,
        }
    }
}

fn trim_front<T>(items: &mut Vec<T>, max: usize) {
    if items.len() > max {
        let excess = items.len() - max;
        items.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MemoryConfig {
        MemoryConfig {
            short_term_capacity: 3,
            long_term_capacity: 2,
            compression_threshold: 100,
            ..MemoryConfig::default()
        }
    }

    fn memory() -> PersonaMemory {
        PersonaMemory::new(PersonaId::numbered(1), config())
    }

    fn speech(tick: u64, text: &str, importance: f64) -> NewMemory {
        NewMemory::new(tick, "Boris", text)
            .speaker(PersonaId::numbered(2))
            .importance(importance)
    }

    #[test]
    fn overflow_keeps_important_and_protected_items() {
        let mut mem = memory();
        mem.add(speech(1, "Unimportant chatter here", 0.3));
        mem.add(speech(2, "Very important speech", 0.9));
        mem.add(NewMemory::new(3, "World", "[EVENT] Storm").kind(MemoryKind::Event));
        mem.add(speech(4, "Filler one", 0.3));
        mem.add(speech(5, "Filler two", 0.3));
        mem.add(speech(6, "Filler three", 0.3));

        assert_eq!(mem.short_term().len(), 3);
        let long: Vec<u64> = mem.long_term().iter().map(|m| m.tick).collect();
        assert_eq!(long, vec![2, 3]);
    }

    #[test]
    fn long_term_evicts_least_important_unprotected() {
        let mut mem = memory();
        mem.push_long_term(MemoryItem {
            tick: 1,
            speaker_id: None,
            speaker_label: "World".into(),
            text: "Event".into(),
            importance: 0.1,
            kind: MemoryKind::Event,
            addressee: None,
            recorded_at: Utc::now(),
        });
        for (tick, importance) in [(2, 0.7), (3, 0.9)] {
            mem.push_long_term(MemoryItem {
                tick,
                speaker_id: None,
                speaker_label: "Boris".into(),
                text: "Speech".into(),
                importance,
                kind: MemoryKind::Speech,
                addressee: None,
                recorded_at: Utc::now(),
            });
        }
        let ticks: Vec<u64> = mem.long_term().iter().map(|m| m.tick).collect();
        assert_eq!(ticks, vec![1, 3]);
    }

    #[test]
    fn add_reports_compression_threshold() {
        let mut mem = PersonaMemory::new(
            PersonaId::numbered(1),
            MemoryConfig {
                compression_threshold: 3,
                ..MemoryConfig::default()
            },
        );
        assert_eq!(mem.add(speech(1, "one line of talk", 0.5)), AddOutcome::Stored);
        assert_eq!(mem.add(speech(2, "two lines of talk", 0.5)), AddOutcome::Stored);
        assert_eq!(
            mem.add(speech(3, "three lines of talk", 0.5)),
            AddOutcome::CompressionDue
        );
    }

    #[test]
    fn auxiliary_buffers_are_bounded() {
        let mut mem = memory();
        for i in 0..20 {
            mem.add_group_decision(i, "Alice", None, &format!("decision {i}"));
            mem.add_pending_question(i, "Alice", None, "Where?");
        }
        for i in 0..25 {
            mem.record_action(&format!("  Gather WOOD batch {i} "));
        }
        assert_eq!(mem.group_decisions().len(), 15);
        assert_eq!(mem.group_decisions()[0].decision, "decision 5");
        assert_eq!(mem.pending_questions().len(), 3);
        assert_eq!(mem.completed_actions().len(), 20);
        assert_eq!(mem.completed_actions()[19], "gather wood batch 24");
        assert!(mem.has_done_similar("gather wood batch 30"));
        assert!(!mem.has_done_similar("Swim to the reef"));
    }

    #[test]
    fn decayed_importance_is_slower_for_events() {
        let mem = memory();
        let mut item = MemoryItem {
            tick: 0,
            speaker_id: None,
            speaker_label: "x".into(),
            text: "x".into(),
            importance: 1.0,
            kind: MemoryKind::Speech,
            addressee: None,
            recorded_at: Utc::now(),
        };
        let speech = mem.decayed_importance(&item, 10);
        item.kind = MemoryKind::Event;
        let event = mem.decayed_importance(&item, 10);
        assert!(event > speech);
        assert!((speech - 0.97f64.powi(10)).abs() < 1e-9);
    }

    #[test]
    fn prompt_renders_sections_with_current_names() {
        let mut registry = NameRegistry::new();
        registry.register(PersonaId::numbered(2), "Boris").unwrap();
        let mut mem = memory();
        mem.add_group_decision(1, "Boris", Some(PersonaId::numbered(2)), "Build the raft");
        mem.record_action("searched the beach");
        registry.rename(&PersonaId::numbered(2), "Bjorn").unwrap();

        let text = mem.format_for_prompt(&registry);
        assert!(text.contains("[tick 1] Bjorn: Build the raft"));
        assert!(text.contains("YOU ALREADY DID THIS"));
        assert!(text.contains("  * searched the beach"));
    }

    #[test]
    fn snapshot_restore_preserves_buffers() {
        let mut mem = memory();
        mem.add(speech(1, "We found a river upstream", 0.8));
        mem.record_action("crossed the river");
        mem.add_pending_question(1, "Boris", None, "Why?");
        let restored = PersonaMemory::restore(PersonaId::numbered(1), config(), mem.snapshot());
        assert_eq!(restored.short_term(), mem.short_term());
        assert_eq!(restored.completed_actions(), mem.completed_actions());
        assert_eq!(restored.index().len(), 1);
        assert!(!restored.has_pending_questions());
        assert!(!restored.is_dirty());
    }
}
