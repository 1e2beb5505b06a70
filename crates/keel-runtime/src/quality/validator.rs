//! Default quality validator

use keel_core::{Column, FeatureTable, Field, Frame, Severity};
use rand::rngs::StdRng;
use rand::{thread_rng, SeedableRng};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use super::{
    ConstraintChecker, ConstraintResult, FieldResult, FrameConstraintChecker, QualityValidator,
    TableValidationResult,
};
use crate::error::Result;

pub const DEFAULT_OVERRIDE_HINT: &str = "Fix the data or rerun with quality checks skipped.";

/// Custom check over one column; errors count as failures
pub type CustomValidator = Arc<dyn Fn(&Column) -> anyhow::Result<bool> + Send + Sync>;

/// A custom check bound to a field, either in every table or in one
struct CustomCheck {
    table: Option<String>,
    field: String,
    check: CustomValidator,
}

/// Validates every declared field present in the data, plus any column
/// with a registered custom check
pub struct FieldValidator {
    checker: Arc<dyn ConstraintChecker>,
    custom: Vec<CustomCheck>,
    sample_pct: Option<u8>,
    rng: Option<Mutex<StdRng>>,
    override_hint: String,
}

impl FieldValidator {
    pub fn new() -> Self {
        Self {
            checker: Arc::new(FrameConstraintChecker::new()),
            custom: Vec::new(),
            sample_pct: None,
            rng: None,
            override_hint: DEFAULT_OVERRIDE_HINT.to_string(),
        }
    }

    pub fn with_checker(mut self, checker: Arc<dyn ConstraintChecker>) -> Self {
        self.checker = checker;
        self
    }

    /// Register a custom check for `field` in every table that produces it
    pub fn with_custom_validator<F>(mut self, field: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Column) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.custom.push(CustomCheck {
            table: None,
            field: field.into(),
            check: Arc::new(check),
        });
        self
    }

    /// Register a custom check for `field` of `table` only. It takes
    /// precedence over a check registered for the field in every table.
    pub fn with_table_validator<F>(
        mut self,
        table: impl Into<String>,
        field: impl Into<String>,
        check: F,
    ) -> Self
    where
        F: Fn(&Column) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.custom.push(CustomCheck {
            table: Some(table.into()),
            field: field.into(),
            check: Arc::new(check),
        });
        self
    }

    fn custom_check(&self, table: &str, field: &str) -> Option<&CustomValidator> {
        let matching = || self.custom.iter().filter(|c| c.field == field);
        matching()
            .find(|c| c.table.as_deref() == Some(table))
            .or_else(|| matching().find(|c| c.table.is_none()))
            .map(|c| &c.check)
    }

    /// Fields outside the table definition that have a custom check, in
    /// registration order
    fn undeclared_custom_fields<'a>(&'a self, table: &FeatureTable) -> Vec<&'a str> {
        let declared: HashSet<&str> = table.fields().into_iter().map(|(name, _)| name).collect();
        let mut fields: Vec<&str> = Vec::new();
        for custom in &self.custom {
            let field = custom.field.as_str();
            let applies = custom.table.as_deref().map_or(true, |t| t == table.name);
            if applies && !declared.contains(field) && !fields.contains(&field) {
                fields.push(field);
            }
        }
        fields
    }

    /// Sample percentage overriding each table's own `sample_pct`
    pub fn with_sample_pct(mut self, pct: u8) -> Self {
        self.sample_pct = Some(pct);
        self
    }

    /// Make sampling reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Some(Mutex::new(StdRng::seed_from_u64(seed)));
        self
    }

    pub fn with_override_hint(mut self, hint: impl Into<String>) -> Self {
        self.override_hint = hint.into();
        self
    }

    fn sample(&self, data: &Frame, pct: Option<u8>) -> Frame {
        let rows = data.num_rows();
        let pct = match pct {
            Some(p) if (1..100).contains(&p) && rows > 0 => p as usize,
            _ => return data.clone(),
        };
        let size = (rows * pct / 100).max(1);
        let mut indices = match &self.rng {
            Some(rng) => match rng.lock() {
                Ok(mut rng) => rand::seq::index::sample(&mut *rng, rows, size).into_vec(),
                Err(poisoned) => {
                    rand::seq::index::sample(&mut *poisoned.into_inner(), rows, size).into_vec()
                }
            },
            None => rand::seq::index::sample(&mut thread_rng(), rows, size).into_vec(),
        };
        indices.sort_unstable();
        debug!(rows, sampled = size, "Sampled rows for validation");
        data.take(&indices)
    }

    fn check_field(
        &self,
        table: &str,
        name: &str,
        field: &Field,
        column: &Column,
        rows_checked: usize,
    ) -> Result<Vec<ConstraintResult>> {
        let checker = &self.checker;
        let severity = field.severity;
        let mut results = Vec::new();
        if let Some(ge) = field.ge {
            results.push(checker.check_ge(column, ge, severity, rows_checked));
        }
        if let Some(le) = field.le {
            results.push(checker.check_le(column, le, severity, rows_checked));
        }
        if field.not_null {
            results.push(checker.check_not_null(column, severity, rows_checked));
        }
        if let Some(pct) = field.max_null_pct {
            results.push(checker.check_max_null_pct(column, pct, severity, rows_checked));
        }
        if let Some(values) = &field.allowed_values {
            results.push(checker.check_allowed_values(column, values, severity, rows_checked));
        }
        if let Some(pattern) = &field.pattern {
            results.push(checker.check_pattern(column, pattern, severity, rows_checked)?);
        }
        if let Some(check) = self.custom_check(table, name) {
            results.push(run_custom(check, name, column, rows_checked));
        }
        Ok(results)
    }
}

/// Custom checks always carry error severity
fn run_custom(
    check: &CustomValidator,
    name: &str,
    column: &Column,
    rows_checked: usize,
) -> ConstraintResult {
    let passed = match check(column) {
        Ok(passed) => passed,
        Err(e) => {
            warn!(field = name, error = %e, "Custom validator errored");
            false
        }
    };
    ConstraintResult {
        field_name: name.to_string(),
        constraint: "custom".to_string(),
        passed,
        severity: Severity::Error,
        expected: "custom check".to_string(),
        actual: if passed { "passed" } else { "failed" }.to_string(),
        rows_checked,
        rows_failed: if passed { 0 } else { rows_checked },
    }
}

impl Default for FieldValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl QualityValidator for FieldValidator {
    fn validate_table(&self, table: &FeatureTable, data: &Frame) -> Result<TableValidationResult> {
        let data = self.sample(data, self.sample_pct.or(table.sample_pct));
        let rows_checked = data.num_rows();

        let mut field_results = Vec::new();
        for (name, field) in table.fields() {
            let Some(column) = data.column(name) else {
                continue;
            };
            let constraints = self.check_field(&table.name, name, field, column, rows_checked)?;
            let passed = constraints
                .iter()
                .all(|c| c.passed || c.severity != Severity::Error);
            field_results.push(FieldResult {
                field_name: name.to_string(),
                constraints,
                passed,
            });
        }

        for name in self.undeclared_custom_fields(table) {
            let (Some(column), Some(check)) = (data.column(name), self.custom_check(&table.name, name))
            else {
                continue;
            };
            let result = run_custom(check, name, column, rows_checked);
            field_results.push(FieldResult {
                field_name: name.to_string(),
                passed: result.passed,
                constraints: vec![result],
            });
        }

        let passed = field_results.iter().all(|f| f.passed);
        let has_warnings = field_results
            .iter()
            .flat_map(|f| f.constraints.iter())
            .any(|c| !c.passed && c.severity == Severity::Warn);

        Ok(TableValidationResult {
            table_name: table.name.clone(),
            field_results,
            rows_checked,
            passed,
            has_warnings,
        })
    }

    fn override_hint(&self) -> &str {
        &self.override_hint
    }
}
