//! In-memory backend
//!
//! Simple memory-based table storage for testing and development. Every
//! write produces a new version of the table so earlier versions stay
//! readable until the table is dropped.

use chrono::{DateTime, Utc};
use keel_compiler::CompiledQuery;
use keel_core::{Frame, KeyValue, SourceConfig, WriteMode};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

use super::{load_source, Backend, Connection};
use crate::error::{Result, RuntimeError};

/// In-memory backend
///
/// Stores each table as a list of versions. Data is lost when the process
/// exits.
pub struct MemoryBackend {
    /// Map of table name -> versions, oldest first
    tables: RwLock<HashMap<String, Vec<Frame>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored versions of `name`
    pub async fn version_count(&self, name: &str) -> usize {
        self.tables.read().await.get(name).map(Vec::len).unwrap_or(0)
    }

    /// Upsert `incoming` into `existing` by `keys`
    fn merge(existing: &Frame, incoming: &Frame, keys: &[String]) -> Result<Frame> {
        let incoming_keys: HashSet<Vec<KeyValue>> = (0..incoming.num_rows())
            .filter_map(|row| Self::row_key(incoming, row, keys).transpose())
            .collect::<Result<_>>()?;
        let mut keep = Vec::with_capacity(existing.num_rows());
        for row in 0..existing.num_rows() {
            let replaced = match Self::row_key(existing, row, keys)? {
                Some(key) => incoming_keys.contains(&key),
                None => false,
            };
            keep.push(!replaced);
        }
        Ok(existing.filter(&keep).concat(incoming)?)
    }

    fn row_key(frame: &Frame, row: usize, keys: &[String]) -> Result<Option<Vec<KeyValue>>> {
        let values = frame.row_values(row, keys)?;
        Ok(values.iter().map(|v| v.key()).collect())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Backend for MemoryBackend {
    async fn connect(&self) -> Result<Connection> {
        let conn = Connection::new();
        debug!(connection = %conn.id(), "Opened memory backend session");
        Ok(conn)
    }

    async fn register_source(
        &self,
        conn: &mut Connection,
        name: &str,
        config: &SourceConfig,
    ) -> Result<()> {
        let data = load_source(self, config).await?;
        debug!(source = name, rows = data.num_rows(), "Registered source");
        conn.register(name, data);
        Ok(())
    }

    async fn execute(&self, conn: &Connection, query: &CompiledQuery) -> Result<Frame> {
        let source = &query.plan.source;
        let input = match conn.lookup(source) {
            Some(frame) => frame.clone(),
            None => self.read_table(source, None).await?,
        };
        Ok(query.plan.execute(&input)?)
    }

    async fn write_table(
        &self,
        name: &str,
        data: &Frame,
        mode: WriteMode,
        merge_keys: Option<&[String]>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let versions = tables.entry(name.to_string()).or_default();
        let next = match (versions.last(), mode) {
            (None, _) | (_, WriteMode::Overwrite) => data.clone(),
            (Some(current), WriteMode::Append) => current.concat(data)?,
            (Some(current), WriteMode::Merge) => {
                let keys = merge_keys.ok_or_else(|| {
                    RuntimeError::Backend(format!("merge write to '{}' needs merge keys", name))
                })?;
                Self::merge(current, data, keys)?
            }
        };
        debug!(table = name, mode = %mode, rows = next.num_rows(), "Wrote table");
        versions.push(next);
        Ok(())
    }

    async fn read_table(&self, name: &str, version: Option<u64>) -> Result<Frame> {
        let tables = self.tables.read().await;
        let versions = tables
            .get(name)
            .ok_or_else(|| RuntimeError::TableNotFound(name.to_string()))?;
        let frame = match version {
            Some(v) => usize::try_from(v).ok().and_then(|v| versions.get(v)),
            None => versions.last(),
        };
        frame.cloned().ok_or_else(|| {
            RuntimeError::TableNotFound(format!("{} (version {:?})", name, version))
        })
    }

    async fn drop_table(&self, name: &str) -> Result<()> {
        if self.tables.write().await.remove(name).is_some() {
            debug!(table = name, "Dropped table");
        }
        Ok(())
    }

    async fn delete_range(
        &self,
        name: &str,
        partition_col: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let Some(versions) = tables.get_mut(name) else {
            return Ok(());
        };
        let Some(current) = versions.last() else {
            return Ok(());
        };
        let column = current.require(partition_col)?;
        let keep: Vec<bool> = column
            .values
            .iter()
            .map(|v| match v.to_timestamp() {
                Some(ts) => !(start <= ts && ts < end),
                None => true,
            })
            .collect();
        let next = current.filter(&keep);
        debug!(
            table = name,
            deleted = current.num_rows() - next.num_rows(),
            "Deleted range"
        );
        versions.push(next);
        Ok(())
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        Ok(self.tables.read().await.contains_key(name))
    }
}
