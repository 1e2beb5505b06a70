//! Feature field declarations and their data quality constraints

use serde::{Deserialize, Serialize};

use crate::types::{DataType, Value};

/// How a failed constraint is treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warn,
    #[default]
    Error,
}

/// A typed output column with optional constraints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub dtype: DataType,

    #[serde(default)]
    pub description: Option<String>,

    /// Minimum allowed value (inclusive)
    #[serde(default)]
    pub ge: Option<f64>,

    /// Maximum allowed value (inclusive)
    #[serde(default)]
    pub le: Option<f64>,

    #[serde(default)]
    pub not_null: bool,

    /// Maximum allowed fraction of nulls, 0.0..=1.0
    #[serde(default)]
    pub max_null_pct: Option<f64>,

    #[serde(default)]
    pub allowed_values: Option<Vec<Value>>,

    /// Regex every non-null string must match
    #[serde(default)]
    pub pattern: Option<String>,

    #[serde(default)]
    pub severity: Severity,
}

impl Field {
    pub fn new(dtype: DataType) -> Self {
        Self {
            dtype,
            description: None,
            ge: None,
            le: None,
            not_null: false,
            max_null_pct: None,
            allowed_values: None,
            pattern: None,
            severity: Severity::Error,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_ge(mut self, ge: f64) -> Self {
        self.ge = Some(ge);
        self
    }

    pub fn with_le(mut self, le: f64) -> Self {
        self.le = Some(le);
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn with_max_null_pct(mut self, pct: f64) -> Self {
        self.max_null_pct = Some(pct);
        self
    }

    pub fn with_allowed_values(mut self, values: Vec<Value>) -> Self {
        self.allowed_values = Some(values);
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Whether any constraint is declared
    pub fn has_constraints(&self) -> bool {
        self.ge.is_some()
            || self.le.is_some()
            || self.not_null
            || self.max_null_pct.is_some()
            || self.allowed_values.is_some()
            || self.pattern.is_some()
    }
}
