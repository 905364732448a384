//! Generation backend abstractions.
//!
//! - `LlmProvider`: RPITIT trait for concrete backends
//! - `BoxLlmProvider`: object-safe wrapper for dynamic dispatch
//! - `RetryPolicy` / `LlmExecutor`: bounded retry around every call

pub mod box_provider;
pub mod executor;
pub mod provider;
pub mod retry;

pub use box_provider::BoxLlmProvider;
pub use executor::{LlmExecutor, strip_think_tags};
pub use provider::LlmProvider;
pub use retry::{RetryDecision, RetryPolicy};
