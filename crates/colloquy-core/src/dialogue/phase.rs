//! Dialogue-phase state machine for the current topic.

use colloquy_types::config::PhaseBudgets;
use colloquy_types::phase::DialoguePhase;

use crate::text::truncate_chars;

const MAX_SNIPPETS: usize = 5;
const SNIPPET_CHARS: usize = 80;

const DECISION_MARKERS: &[&str] = &[
    "let's",
    "decided",
    "we will",
    "i propose",
    "the plan is",
    "i'll",
    "you'll",
    "let's split",
    "agreed",
];

const ACTION_MARKERS: &[&str] = &[
    "i'm going",
    "i'll go",
    "doing",
    "starting",
    "taking",
    "opening",
    "checking",
    "looking for",
    "building",
    "gathering",
    "fixing",
];

#[derive(Debug, Clone)]
pub struct PhaseMachine {
    budgets: PhaseBudgets,
    phase: DialoguePhase,
    ticks_in_phase: u32,
    topic_started_tick: u64,
    decisions: Vec<String>,
    actions: Vec<String>,
}

impl PhaseMachine {
    pub fn new(budgets: PhaseBudgets) -> Self {
        Self {
            budgets,
            phase: DialoguePhase::Discuss,
            ticks_in_phase: 0,
            topic_started_tick: 0,
            decisions: Vec::new(),
            actions: Vec::new(),
        }
    }

    pub fn phase(&self) -> DialoguePhase {
        self.phase
    }

    pub fn ticks_in_phase(&self) -> u32 {
        self.ticks_in_phase
    }

    pub fn topic_started_tick(&self) -> u64 {
        self.topic_started_tick
    }

    pub fn is_complete(&self) -> bool {
        self.phase == DialoguePhase::Complete
    }

    pub fn decisions(&self) -> &[String] {
        &self.decisions
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    fn budget(&self, phase: DialoguePhase) -> u32 {
        match phase {
            DialoguePhase::Discuss => self.budgets.discuss,
            DialoguePhase::Decide => self.budgets.decide,
            DialoguePhase::Act => self.budgets.act,
            DialoguePhase::Conclude => self.budgets.conclude,
            DialoguePhase::Complete => 0,
        }
    }

    /// Ticks left in the current phase.
    pub fn remaining(&self) -> u32 {
        self.budget(self.phase).saturating_sub(self.ticks_in_phase)
    }

    /// Reset for a new topic starting at `tick`.
    pub fn start_new_topic(&mut self, tick: u64) {
        self.phase = DialoguePhase::Discuss;
        self.ticks_in_phase = 0;
        self.topic_started_tick = tick;
        self.decisions.clear();
        self.actions.clear();
    }

    /// Resume saved progress. Decision and action snippets start empty.
    pub fn resume(&mut self, phase: DialoguePhase, ticks_in_phase: u32, topic_started_tick: u64) {
        self.phase = phase;
        self.ticks_in_phase = ticks_in_phase.min(self.budget(phase));
        self.topic_started_tick = topic_started_tick;
    }

    /// Count one tick; move on once the phase budget is spent.
    ///
    /// Returns whether the phase changed and the phase now current.
    /// `Complete` never changes again until a new topic starts.
    pub fn advance_tick(&mut self) -> (bool, DialoguePhase) {
        if self.phase == DialoguePhase::Complete {
            return (false, self.phase);
        }
        self.ticks_in_phase += 1;
        if self.ticks_in_phase >= self.budget(self.phase) {
            self.phase = self.phase.next();
            self.ticks_in_phase = 0;
            return (true, self.phase);
        }
        (false, self.phase)
    }

    pub fn record_decision(&mut self, text: &str) {
        record_matching(&mut self.decisions, text, DECISION_MARKERS);
    }

    pub fn record_action(&mut self, text: &str) {
        record_matching(&mut self.actions, text, ACTION_MARKERS);
    }

    /// Phase guidance appended to every persona prompt.
    pub fn instruction(&self) -> String {
        let remaining = self.remaining();
        let header = format!(
            "\n=== PHASE: {} (~{remaining} turns left) ===\n",
            self.phase.label()
        );
        match self.phase {
            DialoguePhase::Discuss => format!(
                "{header}Now DISCUSS the topic:\n\
                 - Share your opinion\n\
                 - Ask the others a question\n\
                 - Talk about your skills or experience with it\n\
                 - Listen to the others and react\n"
            ),
            DialoguePhase::Decide => format!(
                "{header}Time to MAKE DECISIONS:\n\
                 - Propose a concrete solution\n\
                 - Agree or offer an alternative\n\
                 - Split the roles: who does what\n\
                 - Already decided: {}\n\
                 - Stop arguing, REACH AN AGREEMENT\n",
                last_three(&self.decisions, "nothing yet")
            ),
            DialoguePhase::Act => format!(
                "{header}Time to ACT:\n\
                 - Say what you are CONCRETELY doing right now\n\
                 - Start on your part of the plan\n\
                 - Report the result of your action\n\
                 - Already acting: {}\n",
                last_three(&self.actions, "nobody yet")
            ),
            DialoguePhase::Conclude => format!(
                "{header}WRAP UP:\n\
                 - Sum up what was decided and done\n\
                 - Judge the result\n\
                 - You may raise a NEW topic or a new problem\n"
            ),
            DialoguePhase::Complete => String::new(),
        }
    }
}

fn record_matching(log: &mut Vec<String>, text: &str, markers: &[&str]) {
    let lower = text.to_lowercase();
    if markers.iter().any(|m| lower.contains(m)) {
        log.push(truncate_chars(text, SNIPPET_CHARS).to_string());
        if log.len() > MAX_SNIPPETS {
            log.remove(0);
        }
    }
}

fn last_three(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items[items.len().saturating_sub(3)..].join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> PhaseMachine {
        PhaseMachine::new(PhaseBudgets {
            discuss: 2,
            decide: 1,
            act: 1,
            conclude: 1,
        })
    }

    #[test]
    fn phases_advance_in_order_and_stop_at_complete() {
        let mut m = machine();
        assert_eq!(m.advance_tick(), (false, DialoguePhase::Discuss));
        assert_eq!(m.advance_tick(), (true, DialoguePhase::Decide));
        assert_eq!(m.advance_tick(), (true, DialoguePhase::Act));
        assert_eq!(m.advance_tick(), (true, DialoguePhase::Conclude));
        assert_eq!(m.advance_tick(), (true, DialoguePhase::Complete));
        assert_eq!(m.advance_tick(), (false, DialoguePhase::Complete));
        assert!(m.is_complete());
        assert!(m.instruction().is_empty());
    }

    #[test]
    fn start_new_topic_resets() {
        let mut m = machine();
        m.advance_tick();
        m.advance_tick();
        m.record_decision("Let's build a shelter");
        m.start_new_topic(12);
        assert_eq!(m.phase(), DialoguePhase::Discuss);
        assert_eq!(m.ticks_in_phase(), 0);
        assert_eq!(m.topic_started_tick(), 12);
        assert!(m.decisions().is_empty());
    }

    #[test]
    fn resume_continues_the_budget() {
        let mut m = machine();
        m.resume(DialoguePhase::Decide, 0, 7);
        assert_eq!(m.phase(), DialoguePhase::Decide);
        assert_eq!(m.topic_started_tick(), 7);
        assert_eq!(m.advance_tick(), (true, DialoguePhase::Act));
    }

    #[test]
    fn snippets_are_filtered_and_bounded() {
        let mut m = machine();
        m.record_decision("Nice weather");
        assert!(m.decisions().is_empty());
        for i in 0..7 {
            m.record_decision(&format!("Agreed, plan number {i}"));
            m.record_action(&format!("I'm going to the well, trip {i}"));
        }
        assert_eq!(m.decisions().len(), 5);
        assert_eq!(m.decisions()[0], "Agreed, plan number 2");
        assert_eq!(m.actions().len(), 5);

        let long = "Let's ".repeat(30);
        m.record_decision(&long);
        assert_eq!(m.decisions()[4].chars().count(), 80);
    }

    #[test]
    fn instruction_reports_remaining_and_decisions() {
        let mut m = machine();
        assert!(m.instruction().contains("(~2 turns left)"));
        m.advance_tick();
        m.advance_tick();
        m.record_decision("We will light a signal fire");
        let text = m.instruction();
        assert!(text.contains("Decision"));
        assert!(text.contains("Already decided: We will light a signal fire"));
    }
}
