//! Session event bus.
//!
//! Provides an `EventBus` that distributes `SessionEvent` messages to every
//! subscriber (terminal printer, HTTP observers) via a `tokio::sync::broadcast`
//! channel.

pub mod bus;

pub use bus::EventBus;
