//! Freshness and volume service levels

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::field::Severity;

/// Service level agreement for a feature table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sla {
    /// Maximum acceptable age of the last build and of the newest data
    #[serde(default, with = "crate::duration::option")]
    pub max_staleness: Option<Duration>,

    #[serde(default)]
    pub min_row_count: Option<usize>,

    /// Defaults to `warn`: SLA breaches are informational unless raised
    #[serde(default = "default_sla_severity")]
    pub severity: Severity,
}

fn default_sla_severity() -> Severity {
    Severity::Warn
}

impl Sla {
    pub fn new() -> Self {
        Self {
            max_staleness: None,
            min_row_count: None,
            severity: Severity::Warn,
        }
    }

    pub fn with_max_staleness(mut self, max_staleness: Duration) -> Self {
        self.max_staleness = Some(max_staleness);
        self
    }

    pub fn with_min_row_count(mut self, min_row_count: usize) -> Self {
        self.min_row_count = Some(min_row_count);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

impl Default for Sla {
    fn default() -> Self {
        Self::new()
    }
}
