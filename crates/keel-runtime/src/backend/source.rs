//! Loading external sources into frames

use keel_core::{Frame, SourceConfig};
use tracing::debug;

use super::Backend;
use crate::error::{Result, RuntimeError};

/// Materialize a source config. `Table` sources are read from `backend`.
pub async fn load_source(backend: &dyn Backend, config: &SourceConfig) -> Result<Frame> {
    match config {
        SourceConfig::Inline { data } => Ok(data.clone()),
        SourceConfig::JsonLines { path, schema } => {
            let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                RuntimeError::Source(format!("failed to read {}: {}", path.display(), e))
            })?;
            let rows = content
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(serde_json::from_str::<serde_json::Value>)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            debug!(path = %path.display(), rows = rows.len(), "Loaded JSON lines source");
            let frame = match schema {
                Some(schema) => Frame::from_rows(schema, &rows)?,
                None => Frame::infer_from_rows(&rows)?,
            };
            Ok(frame)
        }
        SourceConfig::Table { name } => backend.read_table(name, None).await,
    }
}
