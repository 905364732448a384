//! Session lifecycle handlers.
//!
//! Endpoints:
//! - POST   /api/v1/users/{user}/session           - Start a session
//! - GET    /api/v1/users/{user}/session           - Session status
//! - DELETE /api/v1/users/{user}/session           - Stop and save
//! - PATCH  /api/v1/users/{user}/session/settings  - Change tick delay
//! - GET    /api/v1/sessions                       - All sessions

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use colloquy_core::scheduler::SessionStats;
use colloquy_core::session::{SessionRequest, SessionSummary};
use colloquy_types::persona::PersonaProfile;

use super::{live_session, session_path};
use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionBody {
    pub scenario: Option<String>,
    pub preset: Option<String>,
    /// Explicit cast; overrides `preset`.
    pub personas: Option<Vec<PersonaProfile>>,
    #[serde(default)]
    pub restore: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub running: bool,
    pub started_at: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    pub stats: SessionStats,
}

#[derive(Debug, Deserialize)]
pub struct SettingsBody {
    /// Seconds between ticks; 0 pauses.
    pub tick_delay_secs: f64,
}

/// POST /api/v1/users/{user}/session
pub async fn create_session(
    State(state): State<AppState>,
    Path(user): Path<String>,
    body: Option<Json<CreateSessionBody>>,
) -> Result<Json<ApiResponse<SessionView>>, AppError> {
    let timer = RequestTimer::start();
    let Json(body) = body.unwrap_or_default();

    let request = SessionRequest {
        scenario: body.scenario,
        preset: body.preset,
        personas: body.personas,
        restore: body.restore,
    };
    let handle = state.sessions.create(&user, request).await?;
    let stats = handle.engine().await.stats();

    let view = SessionView {
        running: handle.is_running(),
        started_at: handle.started_at(),
        stats,
    };
    let path = session_path(&user);
    Ok(Json(
        timer
            .success(view)
            .with_link("self", &path)
            .with_link("conversation", &format!("/api/v1/users/{user}/conversation")),
    ))
}

/// GET /api/v1/users/{user}/session
pub async fn get_session(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<ApiResponse<SessionView>>, AppError> {
    let timer = RequestTimer::start();
    let handle = state.sessions.get(&user)?;
    let stats = handle.engine().await.stats();

    let view = SessionView {
        running: handle.is_running(),
        started_at: handle.started_at(),
        stats,
    };
    Ok(Json(timer.success(view).with_link("self", &session_path(&user))))
}

/// DELETE /api/v1/users/{user}/session
pub async fn delete_session(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let timer = RequestTimer::start();
    state.sessions.stop(&user).await?;
    Ok(Json(timer.success(serde_json::json!({ "stopped": user }))))
}

/// PATCH /api/v1/users/{user}/session/settings
pub async fn update_settings(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(body): Json<SettingsBody>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let timer = RequestTimer::start();
    let handle = live_session(&state, &user)?;
    handle.engine().await.set_tick_delay(body.tick_delay_secs)?;

    Ok(Json(timer.success(serde_json::json!({
        "tick_delay_secs": body.tick_delay_secs,
        "paused": body.tick_delay_secs == 0.0,
    }))))
}

/// GET /api/v1/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
) -> Json<ApiResponse<Vec<SessionSummary>>> {
    let timer = RequestTimer::start();
    Json(timer.success(state.sessions.list()).with_link("self", "/api/v1/sessions"))
}
