//! Scenario progress: the event pool and what has fired so far.

use rand::Rng;
use rand::seq::SliceRandom;

use colloquy_types::scenario::{Scenario, ScenarioState};

/// Events that may not fire again while they are among the most recent.
const RECENT_EVENTS_EXCLUDED: usize = 3;
const TRIGGERED_CAP: usize = 100;

#[derive(Debug, Clone)]
pub struct ScenarioRunner {
    scenario: Scenario,
    triggered: Vec<String>,
}

impl ScenarioRunner {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            triggered: Vec::new(),
        }
    }

    /// Resume with saved progress; state for another scenario is ignored.
    pub fn restore(scenario: Scenario, state: ScenarioState) -> Self {
        let triggered = if state.scenario_key == scenario.key {
            state.events_triggered
        } else {
            Vec::new()
        };
        Self {
            scenario,
            triggered,
        }
    }

    pub fn state(&self) -> ScenarioState {
        ScenarioState {
            scenario_key: self.scenario.key.clone(),
            events_triggered: self.triggered.clone(),
        }
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn triggered(&self) -> &[String] {
        &self.triggered
    }

    /// Scenario block for prompts, with the last few events.
    pub fn context(&self) -> String {
        let mut context = format!(
            "SCENARIO: {}\n{}\n",
            self.scenario.name, self.scenario.context
        );
        if !self.triggered.is_empty() {
            let start = self.triggered.len().saturating_sub(RECENT_EVENTS_EXCLUDED);
            context.push_str(&format!(
                "\nEvents so far: {}\n",
                self.triggered[start..].join(", ")
            ));
        }
        context
    }

    /// Draw an event from the pool, avoiding the most recent ones when
    /// anything else is left.
    pub fn trigger_random<R: Rng>(&mut self, rng: &mut R) -> Option<String> {
        let start = self.triggered.len().saturating_sub(RECENT_EVENTS_EXCLUDED);
        let recent = &self.triggered[start..];
        let fresh: Vec<&String> = self
            .scenario
            .events
            .iter()
            .filter(|e| !recent.contains(e))
            .collect();
        let event = if fresh.is_empty() {
            self.scenario.events.choose(rng).cloned()
        } else {
            fresh.choose(rng).map(|e| (*e).clone())
        }?;
        self.record(&event);
        Some(event)
    }

    /// Remember an event fired from any source.
    pub fn record(&mut self, event: &str) {
        self.triggered.push(event.to_string());
        if self.triggered.len() > TRIGGERED_CAP {
            self.triggered.remove(0);
        }
    }
}
