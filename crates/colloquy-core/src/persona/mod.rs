//! Personas: dynamic state, prompts, relationships and the name registry.

pub mod agent;
pub mod prompt;
pub mod registry;
pub mod relations;

pub use agent::{Origin, Persona};
pub use prompt::{PromptContext, TurnMode, build_messages, speaker_name};
pub use registry::{NameRegistry, SharedRegistry};
pub use relations::{connect_newcomer, initial_relationship, seed_relationships};
