//! Infrastructure layer for Colloquy.
//!
//! Implements the seams `colloquy-core` defines: a SQLite record store, an
//! OpenAI-compatible generation client, and an HTTP telemetry sink. Also
//! owns config file loading and data directory resolution.

pub mod config;
pub mod llm;
pub mod sqlite;
pub mod telemetry;
