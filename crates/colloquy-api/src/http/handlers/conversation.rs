//! GET /api/v1/users/{user}/conversation?after_tick=&limit=
//!
//! Polling view of the shared conversation. Clients pass the last tick they
//! saw as `after_tick` to receive only newer entries.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use colloquy_types::conversation::ConversationEntry;

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

const MAX_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct ConversationQuery {
    pub after_tick: Option<u64>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Query(query): Query<ConversationQuery>,
) -> Result<Json<ApiResponse<Vec<ConversationEntry>>>, AppError> {
    let timer = RequestTimer::start();
    let handle = state.sessions.get(&user)?;
    let entries = handle
        .engine()
        .await
        .entries_after(query.after_tick, query.limit.min(MAX_LIMIT));

    let mut resp = timer.success(entries);
    if let Some(last) = resp.data.as_ref().and_then(|e| e.last()) {
        let next = format!(
            "/api/v1/users/{user}/conversation?after_tick={}&limit={}",
            last.tick, query.limit
        );
        resp = resp.with_link("next", &next);
    }
    Ok(Json(resp))
}
