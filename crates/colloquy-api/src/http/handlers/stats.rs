//! GET /api/v1/users/{user}/stats - per-persona mood, relationships and plans.

use axum::Json;
use axum::extract::{Path, State};

use colloquy_core::scheduler::SessionStats;

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

pub async fn get_stats(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<ApiResponse<SessionStats>>, AppError> {
    let timer = RequestTimer::start();
    let handle = state.sessions.get(&user)?;
    let stats = handle.engine().await.stats();
    Ok(Json(timer.success(stats)))
}
