//! Build outcomes

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Status of a single table build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Success,
    Failed,
    /// Not attempted because an upstream table failed
    Skipped,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildStatus::Success => "success",
            BuildStatus::Failed => "failed",
            BuildStatus::Skipped => "skipped",
        };
        write!(f, "{}", s)
    }
}

/// Result of building a single table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableBuildResult {
    pub table_name: String,
    pub status: BuildStatus,
    pub error: Option<String>,
    pub row_count: Option<usize>,
    pub duration_ms: Option<f64>,
    /// `None` when validation did not run
    pub validated: Option<bool>,
    /// Warn-severity constraint failures
    pub warning_count: usize,
}

impl TableBuildResult {
    pub(crate) fn skipped(table_name: impl Into<String>, error: String) -> Self {
        Self {
            table_name: table_name.into(),
            status: BuildStatus::Skipped,
            error: Some(error),
            row_count: None,
            duration_ms: None,
            validated: None,
            warning_count: 0,
        }
    }

    pub(crate) fn failed(table_name: impl Into<String>, error: String, duration_ms: f64) -> Self {
        Self {
            table_name: table_name.into(),
            status: BuildStatus::Failed,
            error: Some(error),
            row_count: None,
            duration_ms: Some(duration_ms),
            validated: None,
            warning_count: 0,
        }
    }
}

/// Aggregate result of a build run, in build order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildResult {
    pub run_id: Uuid,
    pub tables: Vec<TableBuildResult>,
}

impl BuildResult {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            tables: Vec::new(),
        }
    }

    fn count(&self, status: BuildStatus) -> usize {
        self.tables.iter().filter(|r| r.status == status).count()
    }

    pub fn success_count(&self) -> usize {
        self.count(BuildStatus::Success)
    }

    pub fn failed_count(&self) -> usize {
        self.count(BuildStatus::Failed)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(BuildStatus::Skipped)
    }

    /// Tables whose data went through the quality gate
    pub fn validated_count(&self) -> usize {
        self.tables.iter().filter(|r| r.validated.is_some()).count()
    }

    pub fn warning_count(&self) -> usize {
        self.tables.iter().map(|r| r.warning_count).sum()
    }

    /// True when nothing failed or was skipped
    pub fn is_success(&self) -> bool {
        self.failed_count() == 0 && self.skipped_count() == 0
    }

    pub fn get(&self, table_name: &str) -> Option<&TableBuildResult> {
        self.tables.iter().find(|r| r.table_name == table_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut result = BuildResult::new(Uuid::new_v4());
        result.tables.push(TableBuildResult {
            table_name: "a".to_string(),
            status: BuildStatus::Success,
            error: None,
            row_count: Some(3),
            duration_ms: Some(1.0),
            validated: Some(true),
            warning_count: 2,
        });
        result.tables.push(TableBuildResult::failed("b", "boom".to_string(), 1.0));
        result.tables.push(TableBuildResult::skipped("c", "Upstream table(s) failed: b".to_string()));

        assert_eq!(result.success_count(), 1);
        assert_eq!(result.failed_count(), 1);
        assert_eq!(result.skipped_count(), 1);
        assert_eq!(result.validated_count(), 1);
        assert_eq!(result.warning_count(), 2);
        assert!(!result.is_success());
        assert_eq!(result.get("c").unwrap().status, BuildStatus::Skipped);
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(serde_json::to_string(&BuildStatus::Skipped).unwrap(), "\"skipped\"");
        assert_eq!(BuildStatus::Failed.to_string(), "failed");
    }
}
