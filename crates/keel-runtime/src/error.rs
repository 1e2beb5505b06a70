//! Runtime error types

use keel_compiler::CompileError;
use keel_core::{CoreError, StructuredError};
use thiserror::Error;

/// Runtime error
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Structural problem with context, cause and fix
    #[error(transparent)]
    Structured(#[from] StructuredError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Compilation failed: {0}")]
    Compile(#[from] CompileError),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Registry error: {0}")]
    Registry(String),

    /// Data quality gate rejected a table; the message is user facing
    #[error("{0}")]
    QualityGate(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RuntimeError {
    /// The structured payload, when this error carries one
    pub fn structured(&self) -> Option<&StructuredError> {
        match self {
            RuntimeError::Structured(e) => Some(e),
            RuntimeError::Core(CoreError::Structured(e)) => Some(e),
            _ => None,
        }
    }
}

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;
