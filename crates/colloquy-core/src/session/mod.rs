//! Running sessions: the per-session actor, its manager and the terminal
//! command grammar.

pub mod actor;
pub mod command;
pub mod manager;

pub use actor::SessionHandle;
pub use command::{Command, CommandError, HELP};
pub use manager::{SessionManager, SessionRequest, SessionSummary, validate_owner_id};
