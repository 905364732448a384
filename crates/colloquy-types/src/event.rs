//! Event types for the Colloquy session event bus.
//!
//! `SessionEvent` is broadcast by a session actor while it runs. All variants
//! are Clone + Send + Sync for use with tokio broadcast channels.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::conversation::ConversationEntry;
use crate::phase::DialoguePhase;
use crate::persona::PersonaId;

/// Why a turn produced no conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Generation failed after all retries, or with a non-retryable error.
    Generation,
    /// The quality gate kept rejecting the output.
    Quality,
    /// The repetition gate kept rejecting the output.
    Repetition,
    /// No persona was selected to speak.
    NoSpeaker,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Generation => write!(f, "generation"),
            SkipReason::Quality => write!(f, "quality"),
            SkipReason::Repetition => write!(f, "repetition"),
            SkipReason::NoSpeaker => write!(f, "no_speaker"),
        }
    }
}

/// Events emitted by a running session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A tick began.
    TickStarted { tick: u64 },

    /// An entry was appended to the shared conversation.
    EntryAppended { entry: ConversationEntry },

    /// A turn ended without an entry.
    TurnSkipped {
        tick: u64,
        speaker: Option<PersonaId>,
        reason: SkipReason,
    },

    /// The dialogue phase moved forward.
    PhaseChanged { tick: u64, phase: DialoguePhase },

    /// The topic rotated.
    TopicChanged { tick: u64, topic: String },

    /// A persona joined the session.
    PersonaJoined { id: PersonaId, name: String },

    /// A persona left the session.
    PersonaLeft { id: PersonaId, name: String },

    /// A persona's display name changed.
    PersonaRenamed {
        id: PersonaId,
        old_name: String,
        new_name: String,
    },

    /// The session stopped; no further events follow.
    Stopped { tick: u64 },
}
