//! The turn scheduler.
//!
//! - `engine`: `DialogueEngine` and its tick
//! - `admin`: operator operations (events, messages, membership, stats)
//! - `persist`: saving and restoring through the record store
//! - `speaker` / `turn`: who speaks and how the utterance is generated
//! - `sentiment` / `abilities` / `rules` / `narrator`: what an accepted
//!   utterance does to the group and the world

pub mod abilities;
pub mod admin;
pub mod engine;
pub mod narrator;
pub mod persist;
pub mod rules;
pub mod sentiment;
pub mod speaker;
pub mod turn;

pub use admin::{FormerNames, MessageTarget, NewPersona, Reply, SessionStats};
pub use engine::{Collaborators, DialogueEngine, TickOutcome};
pub use turn::{TurnRequest, generate_reply, generate_turn};
