//! Shared domain types for Colloquy.
//!
//! This crate contains the core domain types used across the Colloquy engine:
//! personas, mood, memory items, the conversation log, dialogue phases,
//! configuration, telemetry records and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod config;
pub mod conversation;
pub mod error;
pub mod event;
pub mod llm;
pub mod memory;
pub mod mood;
pub mod persona;
pub mod phase;
pub mod plan;
pub mod relationship;
pub mod scenario;
pub mod storage;
pub mod telemetry;
