//! Storage backends
//!
//! A backend registers named sources for a session, executes compiled
//! queries, and owns the physical feature tables.

mod memory;
mod source;

pub use memory::MemoryBackend;
pub use source::load_source;

use chrono::{DateTime, Utc};
use keel_compiler::CompiledQuery;
use keel_core::{Frame, SourceConfig, WriteMode};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Result;

/// Session handle returned by [`Backend::connect`]. Holds the sources
/// registered during the session.
#[derive(Debug, Clone)]
pub struct Connection {
    id: Uuid,
    catalog: HashMap<String, Frame>,
}

impl Connection {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            catalog: HashMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Make `data` visible to queries under `name`
    pub fn register(&mut self, name: impl Into<String>, data: Frame) {
        self.catalog.insert(name.into(), data);
    }

    pub fn lookup(&self, name: &str) -> Option<&Frame> {
        self.catalog.get(name)
    }

    pub fn registered(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.catalog.keys().map(String::as_str).collect();
        names.sort();
        names
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

/// Trait for feature table storage backends
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Open a session
    async fn connect(&self) -> Result<Connection>;

    /// Register an external source under `name` for this session
    async fn register_source(
        &self,
        conn: &mut Connection,
        name: &str,
        config: &SourceConfig,
    ) -> Result<()>;

    /// Run a compiled query, returning the materialized rows
    async fn execute(&self, conn: &Connection, query: &CompiledQuery) -> Result<Frame>;

    /// Write rows to a feature table. `merge_keys` is used by [`WriteMode::Merge`].
    async fn write_table(
        &self,
        name: &str,
        data: &Frame,
        mode: WriteMode,
        merge_keys: Option<&[String]>,
    ) -> Result<()>;

    /// Read a feature table, optionally at an earlier version
    async fn read_table(&self, name: &str, version: Option<u64>) -> Result<Frame>;

    /// Remove a feature table and its history
    async fn drop_table(&self, name: &str) -> Result<()>;

    /// Delete rows whose `partition_col` lies in `[start, end)`
    async fn delete_range(
        &self,
        name: &str,
        partition_col: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()>;

    async fn table_exists(&self, name: &str) -> Result<bool>;
}
