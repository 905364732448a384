//! Logging and trace export setup shared by Colloquy binaries.

pub mod tracing_setup;
