//! Directed relationship edges between personas.

use serde::{Deserialize, Serialize};

use crate::persona::PersonaId;

/// One recorded change of a relationship edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipChange {
    pub tick: u64,
    pub other: PersonaId,
    pub before: f64,
    pub after: f64,
    pub reason: String,
    /// Set when the change mirrors another persona's sentiment toward us.
    pub reciprocal: bool,
}

impl RelationshipChange {
    pub fn delta(&self) -> f64 {
        self.after - self.before
    }
}
