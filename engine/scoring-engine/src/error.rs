//! Error types for the scoring engine

use thiserror::Error;

/// Result type for scoring engine operations
pub type Result<T> = std::result::Result<T, ScoringError>;

/// Errors that can escape the scoring engine.
///
/// Missing teams, players or users are not errors: they degrade to empty or
/// zero-valued results. What does surface here comes from the store.
#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScoringError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a new invalid data error
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }
}

impl From<String> for ScoringError {
    fn from(err: String) -> Self {
        ScoringError::Internal(err)
    }
}

impl From<&str> for ScoringError {
    fn from(err: &str) -> Self {
        ScoringError::Internal(err.to_string())
    }
}
