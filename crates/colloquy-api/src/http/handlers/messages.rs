//! Operator input: direct messages and world events.
//!
//! Endpoints:
//! - POST /api/v1/users/{user}/messages - Talk to personas, returns replies
//! - POST /api/v1/users/{user}/events   - Inject a world event

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;

use colloquy_core::scheduler::{MessageTarget, Reply};

use super::live_session;
use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub text: String,
    /// Persona names; everyone answers when absent or empty.
    #[serde(default)]
    pub targets: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventBody {
    pub text: String,
}

/// POST /api/v1/users/{user}/messages
pub async fn send_message(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(body): Json<MessageBody>,
) -> Result<Json<ApiResponse<Vec<Reply>>>, AppError> {
    let timer = RequestTimer::start();
    let handle = live_session(&state, &user)?;

    let target = if body.targets.is_empty() {
        MessageTarget::Everyone
    } else {
        MessageTarget::Named(body.targets)
    };
    let replies = handle.engine().await.inject_message(&body.text, &target).await?;
    tracing::debug!(owner = %user, replies = replies.len(), "operator message answered");

    Ok(Json(timer.success(replies)))
}

/// POST /api/v1/users/{user}/events
pub async fn inject_event(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(body): Json<EventBody>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let timer = RequestTimer::start();
    if body.text.trim().is_empty() {
        return Err(AppError::Validation("event text is empty".into()));
    }
    let handle = live_session(&state, &user)?;
    handle.engine().await.inject_event(&body.text).await?;

    Ok(Json(timer.success(serde_json::json!({ "event": body.text.trim() }))))
}
