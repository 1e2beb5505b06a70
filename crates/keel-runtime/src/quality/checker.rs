//! Constraint checker implementations

use keel_core::{Column, Severity, Value};
use regex::Regex;

use super::ConstraintResult;
use crate::error::{Result, RuntimeError};

/// Interface for constraint checking implementations
///
/// Each method checks one constraint over one column. Nulls are ignored by
/// every check except `not_null` and `max_null_pct`.
pub trait ConstraintChecker: Send + Sync {
    fn check_ge(&self, column: &Column, threshold: f64, severity: Severity, rows_checked: usize) -> ConstraintResult;

    fn check_le(&self, column: &Column, threshold: f64, severity: Severity, rows_checked: usize) -> ConstraintResult;

    fn check_not_null(&self, column: &Column, severity: Severity, rows_checked: usize) -> ConstraintResult;

    fn check_max_null_pct(
        &self,
        column: &Column,
        threshold: f64,
        severity: Severity,
        rows_checked: usize,
    ) -> ConstraintResult;

    fn check_allowed_values(
        &self,
        column: &Column,
        values: &[Value],
        severity: Severity,
        rows_checked: usize,
    ) -> ConstraintResult;

    fn check_pattern(
        &self,
        column: &Column,
        pattern: &str,
        severity: Severity,
        rows_checked: usize,
    ) -> Result<ConstraintResult>;
}

/// Checks constraints over in-memory frame columns
#[derive(Debug, Default, Clone)]
pub struct FrameConstraintChecker;

impl FrameConstraintChecker {
    pub fn new() -> Self {
        Self
    }
}

struct Outcome {
    passed: bool,
    expected: String,
    actual: String,
    rows_failed: usize,
}

fn result(
    column: &Column,
    constraint: &str,
    severity: Severity,
    rows_checked: usize,
    outcome: Outcome,
) -> ConstraintResult {
    ConstraintResult {
        field_name: column.name.clone(),
        constraint: constraint.to_string(),
        passed: outcome.passed,
        severity,
        expected: outcome.expected,
        actual: outcome.actual,
        rows_checked,
        rows_failed: outcome.rows_failed,
    }
}

fn no_values(expected: String) -> Outcome {
    Outcome {
        passed: true,
        expected,
        actual: "no non-null values".to_string(),
        rows_failed: 0,
    }
}

fn numbers(column: &Column) -> Vec<f64> {
    column.values.iter().filter_map(Value::as_f64).collect()
}

impl ConstraintChecker for FrameConstraintChecker {
    fn check_ge(&self, column: &Column, threshold: f64, severity: Severity, rows_checked: usize) -> ConstraintResult {
        let expected = format!(">= {}", threshold);
        let nums = numbers(column);
        let outcome = if nums.is_empty() {
            no_values(expected)
        } else {
            let min = nums.iter().copied().fold(f64::INFINITY, f64::min);
            let rows_failed = nums.iter().filter(|&&n| n < threshold).count();
            Outcome {
                passed: rows_failed == 0,
                expected,
                actual: format!("min={}", min),
                rows_failed,
            }
        };
        result(column, "ge", severity, rows_checked, outcome)
    }

    fn check_le(&self, column: &Column, threshold: f64, severity: Severity, rows_checked: usize) -> ConstraintResult {
        let expected = format!("<= {}", threshold);
        let nums = numbers(column);
        let outcome = if nums.is_empty() {
            no_values(expected)
        } else {
            let max = nums.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let rows_failed = nums.iter().filter(|&&n| n > threshold).count();
            Outcome {
                passed: rows_failed == 0,
                expected,
                actual: format!("max={}", max),
                rows_failed,
            }
        };
        result(column, "le", severity, rows_checked, outcome)
    }

    fn check_not_null(&self, column: &Column, severity: Severity, rows_checked: usize) -> ConstraintResult {
        let nulls = column.null_count();
        let pct = if rows_checked > 0 {
            nulls as f64 / rows_checked as f64 * 100.0
        } else {
            0.0
        };
        let outcome = Outcome {
            passed: nulls == 0,
            expected: "no nulls".to_string(),
            actual: format!("{} nulls ({:.1}%)", nulls, pct),
            rows_failed: nulls,
        };
        result(column, "not_null", severity, rows_checked, outcome)
    }

    fn check_max_null_pct(
        &self,
        column: &Column,
        threshold: f64,
        severity: Severity,
        rows_checked: usize,
    ) -> ConstraintResult {
        let nulls = column.null_count();
        let ratio = if rows_checked > 0 {
            nulls as f64 / rows_checked as f64
        } else {
            0.0
        };
        let outcome = Outcome {
            passed: ratio <= threshold,
            expected: format!("nulls <= {}%", threshold * 100.0),
            actual: format!("{:.1}% nulls", ratio * 100.0),
            rows_failed: nulls,
        };
        result(column, "max_null_pct", severity, rows_checked, outcome)
    }

    fn check_allowed_values(
        &self,
        column: &Column,
        values: &[Value],
        severity: Severity,
        rows_checked: usize,
    ) -> ConstraintResult {
        let listed = values.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
        let expected = format!("in [{}]", listed);
        let present: Vec<&Value> = column.values.iter().filter(|v| !v.is_null()).collect();
        let outcome = if present.is_empty() {
            no_values(expected)
        } else {
            let allowed: Vec<_> = values.iter().filter_map(Value::key).collect();
            let rows_failed = present
                .iter()
                .filter(|v| v.key().map_or(true, |k| !allowed.contains(&k)))
                .count();
            Outcome {
                passed: rows_failed == 0,
                expected,
                actual: format!("{} invalid values", rows_failed),
                rows_failed,
            }
        };
        result(column, "allowed_values", severity, rows_checked, outcome)
    }

    fn check_pattern(
        &self,
        column: &Column,
        pattern: &str,
        severity: Severity,
        rows_checked: usize,
    ) -> Result<ConstraintResult> {
        let re = Regex::new(pattern).map_err(|e| {
            RuntimeError::InvalidOperation(format!(
                "invalid pattern '{}' on field '{}': {}",
                pattern, column.name, e
            ))
        })?;
        let expected = format!("matches '{}'", pattern);
        let present: Vec<String> = column
            .values
            .iter()
            .filter(|v| !v.is_null())
            .map(|v| v.to_string())
            .collect();
        let outcome = if present.is_empty() {
            no_values(expected)
        } else {
            let rows_failed = present.iter().filter(|s| !re.is_match(s)).count();
            Outcome {
                passed: rows_failed == 0,
                expected,
                actual: format!("{} non-matching", rows_failed),
                rows_failed,
            }
        };
        Ok(result(column, "pattern", severity, rows_checked, outcome))
    }
}
