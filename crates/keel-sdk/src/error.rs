//! SDK error types

use keel_core::StructuredError;
use thiserror::Error;

/// SDK error type
#[derive(Error, Debug)]
pub enum SdkError {
    /// Structural problem with context, cause and fix
    #[error(transparent)]
    Structured(#[from] StructuredError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Definition error
    #[error("Definition error: {0}")]
    Core(#[from] keel_core::CoreError),

    /// Compiler error
    #[error("Compiler error: {0}")]
    Compile(#[from] keel_compiler::CompileError),

    /// Runtime error
    #[error("Runtime error: {0}")]
    Runtime(#[from] keel_runtime::RuntimeError),

    /// YAML parse error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SdkError {
    /// The structured payload, wherever in the chain it was raised
    pub fn structured(&self) -> Option<&StructuredError> {
        match self {
            SdkError::Structured(e) => Some(e),
            SdkError::Core(keel_core::CoreError::Structured(e)) => Some(e),
            SdkError::Runtime(e) => e.structured(),
            _ => None,
        }
    }
}

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error() {
        let error = SdkError::Config("missing default_env".to_string());
        assert!(error.to_string().contains("Configuration error"));
        assert!(error.to_string().contains("missing default_env"));
    }

    #[test]
    fn test_structured_is_transparent() {
        let error: SdkError = StructuredError::table_not_built("Reading features", "txns").into();
        assert!(error.to_string().starts_with("Reading features"));
        assert!(error.structured().is_some());
    }

    #[test]
    fn test_structured_through_runtime() {
        let runtime: keel_runtime::RuntimeError =
            StructuredError::dependency_cycle(&["a".to_string()]).into();
        let error: SdkError = runtime.into();
        assert!(error.structured().unwrap().cause.contains("a"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let sdk_error: SdkError = io_error.into();
        assert!(sdk_error.to_string().contains("I/O error"));
    }
}
