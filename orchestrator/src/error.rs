//! Orchestrator-specific error types

use loadgen::LoadgenError;
use shared::SharedError;
use thiserror::Error;

/// Errors that abort a run or its artifact output.
///
/// Reconciliation query failures are not here: they are retried and then
/// reported as an unknown RPO inside the summary.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Setup failed: {message}")]
    SetupError { message: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Database query failed: {message}")]
    DatabaseError { message: String },

    #[error("File system operation failed: {operation} on {path}: {source}")]
    FileSystemError {
        operation: String,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Trigger wait failed: {message}")]
    TriggerError { message: String },

    #[error("Load generator error: {0}")]
    LoadgenError(#[from] LoadgenError),

    #[error("Shared component error: {0}")]
    SharedError(#[from] SharedError),

    #[error("PostgreSQL error: {0}")]
    PostgresError(#[from] tokio_postgres::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl OrchestratorError {
    pub fn setup(message: impl Into<String>) -> Self {
        OrchestratorError::SetupError {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        OrchestratorError::ConfigError {
            message: message.into(),
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        OrchestratorError::DatabaseError {
            message: message.into(),
        }
    }

    pub fn file_system(operation: &str, path: &std::path::Path, source: std::io::Error) -> Self {
        OrchestratorError::FileSystemError {
            operation: operation.to_string(),
            path: path.display().to_string(),
            source,
        }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
