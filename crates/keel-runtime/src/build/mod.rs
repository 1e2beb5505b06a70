//! Feature table builds
//!
//! [`BuildEngine`] runs a build with the overrides carried by
//! [`BuildOptions`] and reports per-table outcomes in a [`BuildResult`].

mod engine;
mod result;

pub use engine::BuildEngine;
pub use result::{BuildResult, BuildStatus, TableBuildResult};

use chrono::{DateTime, Utc};
use keel_compiler::DateRange;
use keel_core::StructuredError;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Operational overrides for a build run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Build only these tables and their upstream dependencies
    #[serde(default)]
    pub targets: Vec<String>,

    /// Drop and overwrite every built table
    #[serde(default)]
    pub full_refresh: bool,

    /// Backfill range start, inclusive
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,

    /// Backfill range end, exclusive
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,

    #[serde(default)]
    pub skip_quality: bool,
}

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.targets.push(target.into());
        self
    }

    pub fn with_targets<S: Into<String>>(mut self, targets: Vec<S>) -> Self {
        self.targets.extend(targets.into_iter().map(Into::into));
        self
    }

    pub fn with_full_refresh(mut self, full_refresh: bool) -> Self {
        self.full_refresh = full_refresh;
        self
    }

    pub fn with_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn with_skip_quality(mut self, skip_quality: bool) -> Self {
        self.skip_quality = skip_quality;
        self
    }

    /// The backfill range, present only when both ends are set
    pub fn date_range(&self) -> Option<DateRange> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some(DateRange::new(start, end)),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start >= end {
                return Err(StructuredError::invalid_date_range(
                    "Building feature tables",
                    &start.to_rfc3339(),
                    &end.to_rfc3339(),
                )
                .into());
            }
        }
        Ok(())
    }
}
