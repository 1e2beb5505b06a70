//! Data quality validation
//!
//! Evaluates the constraints declared on a table's fields against freshly
//! computed data. Constraint checks go through the pluggable
//! [`ConstraintChecker`]; [`FieldValidator`] is the default
//! [`QualityValidator`] used by the build engine.

mod checker;
mod validator;

pub use checker::{ConstraintChecker, FrameConstraintChecker};
pub use validator::{CustomValidator, FieldValidator, DEFAULT_OVERRIDE_HINT};

use keel_core::{FeatureTable, Frame, Severity};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Result of a single constraint check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintResult {
    pub field_name: String,
    /// ge, le, not_null, max_null_pct, allowed_values, pattern or custom
    pub constraint: String,
    pub passed: bool,
    pub severity: Severity,
    pub expected: String,
    pub actual: String,
    pub rows_checked: usize,
    pub rows_failed: usize,
}

/// Constraint results of one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldResult {
    pub field_name: String,
    pub constraints: Vec<ConstraintResult>,
    /// True when every error-severity constraint passed
    pub passed: bool,
}

/// Validation outcome for a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableValidationResult {
    pub table_name: String,
    pub field_results: Vec<FieldResult>,
    pub rows_checked: usize,
    pub passed: bool,
    pub has_warnings: bool,
}

impl TableValidationResult {
    fn failed(&self, severity: Severity) -> impl Iterator<Item = &ConstraintResult> {
        self.field_results
            .iter()
            .flat_map(|f| f.constraints.iter())
            .filter(move |c| !c.passed && c.severity == severity)
    }

    /// Number of failed warn-severity constraints
    pub fn warning_count(&self) -> usize {
        self.failed(Severity::Warn).count()
    }

    /// User-facing gate failure message ending with `override_hint`
    pub fn failure_message(&self, override_hint: &str) -> String {
        let details: Vec<String> = self
            .failed(Severity::Error)
            .map(|c| {
                format!(
                    "{}.{}: expected {}, got {}",
                    c.field_name, c.constraint, c.expected, c.actual
                )
            })
            .collect();
        format!(
            "Validating '{}': data quality check failed. {}. {}",
            self.table_name,
            details.join("; "),
            override_hint
        )
    }

    pub fn results_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.field_results)?)
    }
}

/// Validates materialized data against a table's declared constraints
pub trait QualityValidator: Send + Sync {
    fn validate_table(&self, table: &FeatureTable, data: &Frame) -> Result<TableValidationResult>;

    /// Remediation appended to gate failure messages
    fn override_hint(&self) -> &str {
        DEFAULT_OVERRIDE_HINT
    }
}
