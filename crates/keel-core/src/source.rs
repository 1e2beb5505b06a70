//! Data sources feeding feature tables

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::{Frame, TableSchema};

/// Where a source's rows physically come from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Rows held in the definition itself
    Inline { data: Frame },

    /// Newline-delimited JSON objects. Types are inferred unless a schema is given.
    JsonLines {
        path: PathBuf,
        #[serde(default)]
        schema: Option<TableSchema>,
    },

    /// A table already materialized in the backend
    Table { name: String },
}

/// Batch data source for scheduled pulls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSource {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub config: SourceConfig,
    #[serde(default)]
    pub timestamp_field: Option<String>,
}

/// Streaming source. Historical ranges are read from `batch_fallback` when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSource {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub config: SourceConfig,
    #[serde(default)]
    pub timestamp_field: Option<String>,
    #[serde(default)]
    pub batch_fallback: Option<SourceConfig>,
}

/// Real-time source whose values expire after `ttl`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealTimeSource {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub config: SourceConfig,
    #[serde(default)]
    pub timestamp_field: Option<String>,
    #[serde(default, with = "crate::duration::option")]
    pub ttl: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceKind {
    Batch(BatchSource),
    Stream(StreamSource),
    RealTime(RealTimeSource),
}

impl SourceKind {
    pub fn batch(name: impl Into<String>, config: SourceConfig) -> Self {
        SourceKind::Batch(BatchSource {
            name: name.into(),
            description: None,
            config,
            timestamp_field: None,
        })
    }

    pub fn name(&self) -> &str {
        match self {
            SourceKind::Batch(s) => &s.name,
            SourceKind::Stream(s) => &s.name,
            SourceKind::RealTime(s) => &s.name,
        }
    }

    pub fn timestamp_field(&self) -> Option<&str> {
        match self {
            SourceKind::Batch(s) => s.timestamp_field.as_deref(),
            SourceKind::Stream(s) => s.timestamp_field.as_deref(),
            SourceKind::RealTime(s) => s.timestamp_field.as_deref(),
        }
    }

    /// Time-to-live of values from this source, if it expires them
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            SourceKind::RealTime(s) => s.ttl,
            _ => None,
        }
    }

    /// Config to register for a build. Backfills of a stream prefer its batch fallback.
    pub fn config_for(&self, backfill: bool) -> &SourceConfig {
        match self {
            SourceKind::Batch(s) => &s.config,
            SourceKind::Stream(s) => match (&s.batch_fallback, backfill) {
                (Some(fallback), true) => fallback,
                _ => &s.config,
            },
            SourceKind::RealTime(s) => &s.config,
        }
    }
}
