//! A persona's current plan of action.

use serde::{Deserialize, Serialize};

/// Goal with ordered steps and a cursor into them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub goal: String,
    pub steps: Vec<String>,
    pub cursor: usize,
    /// Events observed since the plan was made.
    #[serde(default)]
    pub adaptations: Vec<String>,
}

impl Plan {
    pub fn new(goal: impl Into<String>, steps: Vec<String>) -> Self {
        Self {
            goal: goal.into(),
            steps,
            cursor: 0,
            adaptations: Vec::new(),
        }
    }

    pub fn current_step(&self) -> Option<&str> {
        self.steps.get(self.cursor).map(String::as_str)
    }

    /// Up to two steps after the current one.
    pub fn upcoming(&self) -> &[String] {
        let start = (self.cursor + 1).min(self.steps.len());
        let end = (self.cursor + 3).min(self.steps.len());
        &self.steps[start..end]
    }

    /// Move the cursor forward, stopping at the last step.
    pub fn advance(&mut self) {
        if !self.steps.is_empty() {
            self.cursor = (self.cursor + 1).min(self.steps.len() - 1);
        }
    }

    /// True once the cursor sits on the final step.
    pub fn is_complete(&self) -> bool {
        !self.steps.is_empty() && self.cursor + 1 >= self.steps.len()
    }
}
