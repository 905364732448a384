//! HTTP request handlers for the REST API.

pub mod conversation;
pub mod messages;
pub mod personas;
pub mod session;
pub mod stats;

use std::sync::Arc;

use colloquy_core::session::SessionHandle;
use colloquy_types::error::SessionError;

use crate::http::error::AppError;
use crate::state::AppState;

/// The owner's session, refusing one whose loop has already ended.
pub(crate) fn live_session(state: &AppState, user: &str) -> Result<Arc<SessionHandle>, AppError> {
    let handle = state.sessions.get(user)?;
    if !handle.is_running() {
        return Err(SessionError::Stopped.into());
    }
    Ok(handle)
}

pub(crate) fn session_path(user: &str) -> String {
    format!("/api/v1/users/{user}/session")
}
