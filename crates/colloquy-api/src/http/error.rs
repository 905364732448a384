//! Application error type mapping to HTTP status codes and the envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use colloquy_types::error::SessionError;

use crate::http::response::ApiResponse;

#[derive(Debug)]
pub enum AppError {
    Session(SessionError),
    Validation(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        AppError::Session(e)
    }
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Session(e) => match e {
                SessionError::InvalidOwnerId(_) | SessionError::InvalidValue(_) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
                }
                SessionError::UnknownScenario(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_SCENARIO"),
                SessionError::UnknownPreset(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_PRESET"),
                SessionError::AlreadyExists(_) => (StatusCode::CONFLICT, "SESSION_EXISTS"),
                SessionError::NotFound(_) => (StatusCode::NOT_FOUND, "SESSION_NOT_FOUND"),
                SessionError::PersonaExists(_) => (StatusCode::CONFLICT, "PERSONA_EXISTS"),
                SessionError::PersonaNotFound(_) => (StatusCode::NOT_FOUND, "PERSONA_NOT_FOUND"),
                SessionError::TooFewPersonas(_) => (StatusCode::CONFLICT, "TOO_FEW_PERSONAS"),
                SessionError::Stopped => (StatusCode::CONFLICT, "SESSION_STOPPED"),
            },
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            AppError::Session(e) => e.to_string(),
            AppError::Validation(msg) => msg.clone(),
        };
        (status, Json(ApiResponse::error(code, &message))).into_response()
    }
}
