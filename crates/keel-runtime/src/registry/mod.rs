//! Build and quality result persistence
//!
//! The build engine hands one [`BuildRecord`] per table per run, and one
//! [`QualityResultRecord`] per validated table, to a [`BuildRegistry`].
//!
//! Records:
//! - build records: status, row count, duration and newest data timestamp
//! - quality records: pass/warn outcome and the serialized constraint results

mod memory;

pub use memory::MemoryRegistry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::build::BuildStatus;
use crate::error::Result;

/// Build record for persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Build run this record belongs to
    pub run_id: Uuid,

    pub timestamp: DateTime<Utc>,

    pub table_name: String,

    pub status: BuildStatus,

    pub row_count: Option<usize>,

    pub duration_ms: Option<f64>,

    /// Newest value of the table's timestamp column in the written data
    pub data_timestamp_max: Option<DateTime<Utc>>,
}

/// Quality validation record for persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityResultRecord {
    pub run_id: Uuid,

    pub timestamp: DateTime<Utc>,

    pub table_name: String,

    pub passed: bool,

    pub has_warnings: bool,

    pub rows_checked: usize,

    /// Field and constraint results as JSON
    pub results_json: String,
}

/// Trait for build metadata stores
#[async_trait::async_trait]
pub trait BuildRegistry: Send + Sync {
    async fn put_build_record(&self, record: BuildRecord) -> Result<()>;

    async fn put_quality_result(&self, record: QualityResultRecord) -> Result<()>;

    /// Most recent build record of a table, whatever its status
    async fn latest_build(&self, table_name: &str) -> Result<Option<BuildRecord>>;

    /// Most recent successful build record of a table
    async fn latest_successful_build(&self, table_name: &str) -> Result<Option<BuildRecord>>;

    /// Build records newest first, optionally for one table
    async fn build_records(&self, table_name: Option<&str>, limit: usize) -> Result<Vec<BuildRecord>>;

    /// Quality records of a table, newest first
    async fn quality_results(&self, table_name: &str, limit: usize) -> Result<Vec<QualityResultRecord>>;
}
