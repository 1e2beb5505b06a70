//! Error types for Keel Core
//!
//! Two layers live here. [`StructuredError`] carries the context / cause / fix
//! triple shown to users for structural problems (unknown tables, dependency
//! cycles, bad configuration). [`CoreError`] is the crate-wide error enum that
//! wraps it alongside data-model failures.

use serde::Serialize;
use thiserror::Error;

/// Category of a structured error, used as the machine-readable `code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    General,
    Configuration,
    Registry,
    Build,
    Storage,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::General => "general",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Registry => "registry",
            ErrorKind::Build => "build",
            ErrorKind::Storage => "storage",
        }
    }
}

/// An actionable error: what was attempted, why it failed, and how to fix it.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{context}\n\nCause: {cause}\n\nFix: {fix}")]
pub struct StructuredError {
    pub kind: ErrorKind,
    pub context: String,
    pub cause: String,
    pub fix: String,
}

impl StructuredError {
    pub fn new(
        kind: ErrorKind,
        context: impl Into<String>,
        cause: impl Into<String>,
        fix: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            context: context.into(),
            cause: cause.into(),
            fix: fix.into(),
        }
    }

    /// Structured form for JSON output
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": true,
            "code": self.kind.code(),
            "context": self.context,
            "cause": self.cause,
            "fix": self.fix,
        })
    }

    /// A lookup of `name` failed while performing `operation`.
    pub fn table_not_found(operation: impl Into<String>, name: &str) -> Self {
        Self::new(
            ErrorKind::General,
            operation,
            "Table not found in DAG",
            format!("Ensure '{}' is registered in the DAG.", name),
        )
    }

    /// Cycle detected; `remaining` are the tables that could not be ordered.
    pub fn dependency_cycle(remaining: &[String]) -> Self {
        let mut names = remaining.to_vec();
        names.sort();
        Self::new(
            ErrorKind::Build,
            "Building DAG execution order",
            format!("Cycle detected involving tables: {}", names.join(", ")),
            "Remove circular dependencies between feature tables.",
        )
    }

    pub fn unknown_target(target: &str, available: &[String]) -> Self {
        Self::new(
            ErrorKind::Build,
            format!("Resolving build target '{}'", target),
            "Table not found in DAG",
            format!(
                "Use one of the defined tables: {}",
                join_or(available, "(none)")
            ),
        )
    }

    pub fn environment_not_found(env: &str, available: &[String]) -> Self {
        Self::new(
            ErrorKind::Configuration,
            format!("Resolving environment '{}'", env),
            format!("Environment '{}' is not defined in the project config", env),
            format!(
                "Use one of the available environments: {}, or add '{}' to the environments section",
                join_or(available, "(none)"),
                env
            ),
        )
    }

    pub fn invalid_schedule(table: &str, schedule: &str, allowed: &[String]) -> Self {
        Self::new(
            ErrorKind::Configuration,
            format!("Validating schedule tag '{}' of table '{}'", schedule, table),
            format!("Schedule '{}' is not in the allowed schedules list", schedule),
            format!(
                "Use one of the allowed schedules: {}, or add '{}' to the schedules list",
                join_or(allowed, "(none defined)"),
                schedule
            ),
        )
    }

    pub fn table_not_built(operation: impl Into<String>, table: &str) -> Self {
        Self::new(
            ErrorKind::Storage,
            operation,
            format!("Table '{}' has no built data", table),
            "Run build first to materialize the table.",
        )
    }

    pub fn invalid_date_range(operation: impl Into<String>, start: &str, end: &str) -> Self {
        Self::new(
            ErrorKind::General,
            operation,
            format!("start ({}) must be before end ({})", start, end),
            "Provide a start date earlier than the end date.",
        )
    }
}

fn join_or(names: &[String], empty: &str) -> String {
    if names.is_empty() {
        empty.to_string()
    } else {
        names.join(", ")
    }
}

fn available_hint(available: &[String]) -> String {
    if available.is_empty() {
        "The table declares no features.".to_string()
    } else {
        format!("Available features: {}", available.join(", "))
    }
}

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error(transparent)]
    Structured(#[from] StructuredError),

    #[error("FeatureTable '{table}' has no feature '{feature}'. {}", available_hint(.available))]
    FeatureNotFound {
        table: String,
        feature: String,
        available: Vec<String>,
    },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_display() {
        let err = StructuredError::new(ErrorKind::General, "Doing a thing", "It broke", "Fix it");
        assert_eq!(err.to_string(), "Doing a thing\n\nCause: It broke\n\nFix: Fix it");
    }

    #[test]
    fn test_structured_to_json() {
        let err = StructuredError::environment_not_found("prod", &["dev".to_string()]);
        let json = err.to_json();
        assert_eq!(json["error"], true);
        assert_eq!(json["code"], "configuration");
        assert!(json["fix"].as_str().unwrap().contains("dev"));
    }

    #[test]
    fn test_cycle_names_sorted() {
        let err = StructuredError::dependency_cycle(&["b".to_string(), "a".to_string()]);
        assert!(err.cause.ends_with("a, b"));
    }

    #[test]
    fn test_feature_not_found_hint() {
        let err = CoreError::FeatureNotFound {
            table: "user_stats".to_string(),
            feature: "spend".to_string(),
            available: vec!["spend_7d".to_string(), "txn_count".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("'spend'"));
        assert!(msg.contains("spend_7d, txn_count"));
    }
}
