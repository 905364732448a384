use thiserror::Error;

/// Errors from repository operations (used by trait definitions in colloquy-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors surfaced synchronously by session and admin operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid owner id '{0}': only letters, digits, '-' and '_' are allowed")]
    InvalidOwnerId(String),

    #[error("unknown scenario '{0}'")]
    UnknownScenario(String),

    #[error("unknown persona preset '{0}'")]
    UnknownPreset(String),

    #[error("session for '{0}' already exists")]
    AlreadyExists(String),

    #[error("no session for '{0}'")]
    NotFound(String),

    #[error("persona '{0}' already exists")]
    PersonaExists(String),

    #[error("persona '{0}' not found")]
    PersonaNotFound(String),

    #[error("a session needs at least {0} personas")]
    TooFewPersonas(usize),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("session stopped")]
    Stopped,
}

/// Errors from the name registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("name '{0}' is already taken")]
    NameTaken(String),

    #[error("persona '{0}' is not registered")]
    NotRegistered(String),
}

/// Errors from telemetry delivery. Always discarded after logging.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("telemetry transport error: {0}")]
    Transport(String),

    #[error("telemetry endpoint rejected event ({status})")]
    Rejected { status: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_session_error_display() {
        let err = SessionError::UnknownScenario("moon_base".to_string());
        assert_eq!(err.to_string(), "unknown scenario 'moon_base'");
        let err = SessionError::TooFewPersonas(2);
        assert!(err.to_string().contains('2'));
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::NameTaken("Alice".to_string());
        assert!(err.to_string().contains("Alice"));
    }
}
