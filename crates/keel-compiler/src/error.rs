//! Compiler error types

use keel_core::CoreError;
use thiserror::Error;

/// Compiler error
#[derive(Error, Debug)]
pub enum CompileError {
    /// A timestamp-dependent step on a table without a timestamp field
    #[error("Table '{table}' has no timestamp_field, required for {purpose}")]
    MissingTimestampField { table: String, purpose: String },

    /// Invalid expression
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    /// Invalid LIKE or regex pattern
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Plan failed while running against data
    #[error("Execution error: {0}")]
    Execution(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompileError>;
