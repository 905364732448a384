//! Storage types for Colloquy.
//!
//! Everything persisted goes through flat tagged records keyed by
//! `(owner_id, agent_id, kind)`. Each save is an idempotent full overwrite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

/// Agent id used for session-wide records (scenario and topic state).
pub const SESSION_SCOPE: &str = "__session__";

/// Tag of a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Memory,
    RetrievalDocuments,
    ScenarioState,
    TopicState,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Memory => write!(f, "memory"),
            RecordKind::RetrievalDocuments => write!(f, "retrieval_documents"),
            RecordKind::ScenarioState => write!(f, "scenario_state"),
            RecordKind::TopicState => write!(f, "topic_state"),
        }
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(RecordKind::Memory),
            "retrieval_documents" => Ok(RecordKind::RetrievalDocuments),
            "scenario_state" => Ok(RecordKind::ScenarioState),
            "topic_state" => Ok(RecordKind::TopicState),
            other => Err(format!("invalid record kind: '{other}'")),
        }
    }
}

/// A single persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub owner_id: String,
    pub agent_id: String,
    pub kind: RecordKind,
    pub payload: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    pub fn new(
        owner_id: impl Into<String>,
        agent_id: impl Into<String>,
        kind: RecordKind,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            agent_id: agent_id.into(),
            kind,
            payload,
            updated_at: Utc::now(),
        }
    }
}

/// Selects records by owner, optionally narrowed by agent and kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    pub owner_id: String,
    pub agent_id: Option<String>,
    pub kind: Option<RecordKind>,
}

impl RecordFilter {
    pub fn owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            agent_id: None,
            kind: None,
        }
    }

    pub fn agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn kind(mut self, kind: RecordKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn matches(&self, record: &StoredRecord) -> bool {
        record.owner_id == self.owner_id
            && self.agent_id.as_ref().is_none_or(|a| *a == record.agent_id)
            && self.kind.is_none_or(|k| k == record.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_kind_roundtrip() {
        for kind in [
            RecordKind::Memory,
            RecordKind::RetrievalDocuments,
            RecordKind::ScenarioState,
            RecordKind::TopicState,
        ] {
            assert_eq!(kind.to_string().parse::<RecordKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_filter_matches() {
        let record = StoredRecord::new(
            "user-1",
            "agent_1",
            RecordKind::Memory,
            serde_json::json!({}),
        );
        assert!(RecordFilter::owner("user-1").matches(&record));
        assert!(RecordFilter::owner("user-1").agent("agent_1").matches(&record));
        assert!(!RecordFilter::owner("user-1").agent("agent_2").matches(&record));
        assert!(!RecordFilter::owner("user-1")
            .kind(RecordKind::TopicState)
            .matches(&record));
        assert!(!RecordFilter::owner("user-2").matches(&record));
    }
}
