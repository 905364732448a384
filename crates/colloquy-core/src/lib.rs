//! Dialogue engine and collaborator traits for Colloquy.
//!
//! This crate holds the session logic: affect, memory, phases and topics,
//! the turn scheduler and the session actor. It defines the ports
//! ([`llm::LlmProvider`], [`storage::RecordStore`],
//! [`telemetry::TelemetrySink`]) that `colloquy-infra` implements, and
//! depends only on `colloquy-types`, never on any network or database crate.

pub mod affect;
pub mod dialogue;
pub mod event;
pub mod gate;
pub mod llm;
pub mod memory;
pub mod persona;
pub mod presets;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod telemetry;
pub mod text;

#[cfg(test)]
pub(crate) mod testing;
