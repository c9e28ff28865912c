// src/error/types.rs
use crate::domain::DomainError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(String),

    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Write staged against an identifier that does not exist in the store.
    #[error("{0}")]
    InvalidOperation(String),

    /// UPDATE/DELETE matched no row when the unit of work was flushed.
    #[error("Concurrency conflict: no row in `{table}` matched id {id}")]
    ConcurrencyConflict { table: &'static str, id: String },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(String),
}

impl AppError {
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        AppError::InvalidOperation(message.into())
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::Other(format!("UUID error: {}", err))
    }
}

impl From<chrono::ParseError> for AppError {
    fn from(err: chrono::ParseError) -> Self {
        AppError::Other(format!("Date parse error: {}", err))
    }
}

impl From<r2d2::Error> for AppError {
    fn from(err: r2d2::Error) -> Self {
        AppError::Pool(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Other(format!("Blocking task failed: {}", err))
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_operation_displays_message_verbatim() {
        let err = AppError::invalid_operation("Invalid PUT operation");
        assert_eq!(err.to_string(), "Invalid PUT operation");
    }

    #[test]
    fn test_serializes_as_display_string() {
        let err = AppError::ConcurrencyConflict {
            table: "users",
            id: "42".to_string(),
        };
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Concurrency conflict: no row in `users` matched id 42\"");
    }

    #[test]
    fn test_uuid_error_converts_to_other() {
        let err: AppError = uuid::Uuid::parse_str("not-a-uuid").unwrap_err().into();
        assert!(matches!(err, AppError::Other(ref m) if m.starts_with("UUID error")));
    }
}
