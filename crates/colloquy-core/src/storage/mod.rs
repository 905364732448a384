//! Storage abstractions for Colloquy.
//!
//! Defines the record store trait the engine persists through.
//! Implementations live in colloquy-infra.

pub mod record_store;

pub use record_store::{BoxRecordStore, RecordStore};
