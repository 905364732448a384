//! Cast changes mid-session.
//!
//! Endpoints:
//! - POST   /api/v1/users/{user}/personas        - Add a persona
//! - DELETE /api/v1/users/{user}/personas/{name} - Remove a persona
//! - PATCH  /api/v1/users/{user}/personas/{name} - Rename a persona

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use colloquy_core::scheduler::NewPersona;
use colloquy_types::persona::{Archetype, Demographics, PersonaId, Species};

use super::live_session;
use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddPersonaBody {
    pub name: String,
    pub species: Species,
    #[serde(default = "default_archetype")]
    pub archetype: Archetype,
    pub demographics: Option<Demographics>,
}

fn default_archetype() -> Archetype {
    Archetype::Individual
}

#[derive(Debug, Deserialize)]
pub struct RenameBody {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct PersonaRef {
    pub id: PersonaId,
    pub name: String,
}

/// POST /api/v1/users/{user}/personas
pub async fn add_persona(
    State(state): State<AppState>,
    Path(user): Path<String>,
    Json(body): Json<AddPersonaBody>,
) -> Result<Json<ApiResponse<PersonaRef>>, AppError> {
    let timer = RequestTimer::start();
    let name = body.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::Validation("persona name is empty".into()));
    }
    let handle = live_session(&state, &user)?;

    let id = handle
        .engine()
        .await
        .add_persona(NewPersona {
            name: name.clone(),
            species: body.species,
            archetype: body.archetype,
            demographics: body.demographics,
        })
        .await?;

    Ok(Json(timer.success(PersonaRef { id, name })))
}

/// DELETE /api/v1/users/{user}/personas/{name}
pub async fn remove_persona(
    State(state): State<AppState>,
    Path((user, name)): Path<(String, String)>,
) -> Result<Json<ApiResponse<PersonaRef>>, AppError> {
    let timer = RequestTimer::start();
    let handle = live_session(&state, &user)?;
    let id = handle.engine().await.remove_persona(&name).await?;

    Ok(Json(timer.success(PersonaRef { id, name })))
}

/// PATCH /api/v1/users/{user}/personas/{name}
pub async fn rename_persona(
    State(state): State<AppState>,
    Path((user, name)): Path<(String, String)>,
    Json(body): Json<RenameBody>,
) -> Result<Json<ApiResponse<serde_json::Value>>, AppError> {
    let timer = RequestTimer::start();
    let handle = live_session(&state, &user)?;
    handle.engine().await.rename_persona(&name, &body.name).await?;

    Ok(Json(timer.success(serde_json::json!({
        "old_name": name,
        "new_name": body.name.trim(),
    }))))
}
