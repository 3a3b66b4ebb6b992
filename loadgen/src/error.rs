//! Load generator error types

use shared::SharedError;
use thiserror::Error;

/// Result type for load generator operations
pub type LoadgenResult<T> = Result<T, LoadgenError>;

/// Errors that escape the load generator. Individual probe failures never do;
/// they are recorded as outcomes.
#[derive(Error, Debug)]
pub enum LoadgenError {
    #[error("Setup failed: {message}")]
    SetupError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Database error: {0}")]
    DatabaseError(#[from] tokio_postgres::Error),

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

impl LoadgenError {
    pub fn setup(message: impl Into<String>) -> Self {
        LoadgenError::SetupError {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        LoadgenError::ConfigError {
            message: message.into(),
        }
    }
}
