//! Point-in-time join
//!
//! Attaches to every spine row the most recent feature values known at or
//! before the row's timestamp. Feature rows stamped after the spine row are
//! never visible, and values older than a table's TTL are nulled out.
//!
//! Each feature table is indexed by entity key into a timestamp-sorted list,
//! so a spine row is matched with one hash lookup and a binary search.

use chrono::{DateTime, Duration, Utc};
use keel_core::types::KeyValue;
use keel_core::{Column, CoreError, Frame, Value};
use std::collections::HashMap;
use tracing::debug;

use crate::error::Result;

/// A feature table participating in a point-in-time join
#[derive(Debug, Clone)]
pub struct FeatureTableData {
    pub name: String,
    pub data: Frame,
    pub entity_keys: Vec<String>,
    pub timestamp_column: String,
    pub feature_columns: Vec<String>,
    /// Values older than this, relative to the spine timestamp, are expired
    pub ttl: Option<Duration>,
}

impl FeatureTableData {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        data: Frame,
        entity_keys: Vec<S>,
        timestamp_column: impl Into<String>,
        feature_columns: Vec<S>,
    ) -> Self {
        Self {
            name: name.into(),
            data,
            entity_keys: entity_keys.into_iter().map(Into::into).collect(),
            timestamp_column: timestamp_column.into(),
            feature_columns: feature_columns.into_iter().map(Into::into).collect(),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Feature rows of one entity, sorted by timestamp. Ties keep input order.
type Timeline = Vec<(DateTime<Utc>, usize)>;

/// Join `tables` onto `spine` in order.
///
/// The result holds every spine column followed by each table's feature
/// columns. Joining no tables returns the spine unchanged.
pub fn pit_join(spine: &Frame, tables: &[FeatureTableData], spine_timestamp: &str) -> Result<Frame> {
    let mut current = spine.clone();
    if tables.is_empty() {
        return Ok(current);
    }

    let spine_times = current
        .require(spine_timestamp)?
        .values
        .iter()
        .map(Value::to_timestamp)
        .collect::<Vec<_>>();

    for table in tables {
        check_columns(&current, table)?;

        let index = build_index(table)?;
        let spine_keys = key_rows(&current, &table.entity_keys)?;

        let matches: Vec<Option<usize>> = spine_keys
            .iter()
            .zip(&spine_times)
            .map(|(key, ts)| {
                let (key, ts) = (key.as_ref()?, (*ts)?);
                let timeline = index.get(key)?;
                let found = timeline.partition_point(|(feature_ts, _)| *feature_ts <= ts);
                let (feature_ts, row) = timeline.get(found.checked_sub(1)?)?;
                match table.ttl {
                    Some(ttl) if ts - *feature_ts > ttl => None,
                    _ => Some(*row),
                }
            })
            .collect();

        for name in &table.feature_columns {
            let source = table.data.require(name)?;
            let values = matches
                .iter()
                .map(|m| m.and_then(|row| source.values.get(row).cloned()).unwrap_or(Value::Null))
                .collect();
            current.push_column(Column::new(name.clone(), source.dtype, values))?;
        }

        debug!(
            table = %table.name,
            rows = current.num_rows(),
            matched = matches.iter().filter(|m| m.is_some()).count(),
            "Joined feature table"
        );
    }

    Ok(current)
}

fn check_columns(current: &Frame, table: &FeatureTableData) -> Result<()> {
    for key in &table.entity_keys {
        if !current.has_column(key) {
            return Err(CoreError::ColumnNotFound(format!(
                "entity key '{}' of '{}' is missing from the spine",
                key, table.name
            ))
            .into());
        }
    }
    for name in table
        .entity_keys
        .iter()
        .chain(std::iter::once(&table.timestamp_column))
        .chain(&table.feature_columns)
    {
        if !table.data.has_column(name) {
            return Err(CoreError::ColumnNotFound(format!("'{}' in feature table '{}'", name, table.name)).into());
        }
    }
    if let Some(clash) = table.feature_columns.iter().find(|c| current.has_column(c)) {
        return Err(CoreError::SchemaMismatch(format!(
            "feature column '{}' of '{}' is already present in the joined result",
            clash, table.name
        ))
        .into());
    }
    Ok(())
}

fn build_index(table: &FeatureTableData) -> Result<HashMap<Vec<KeyValue>, Timeline>> {
    let keys = key_rows(&table.data, &table.entity_keys)?;
    let times = &table.data.require(&table.timestamp_column)?.values;

    let mut index: HashMap<Vec<KeyValue>, Timeline> = HashMap::new();
    for (row, key) in keys.into_iter().enumerate() {
        let (Some(key), Some(ts)) = (key, times.get(row).and_then(Value::to_timestamp)) else {
            continue;
        };
        index.entry(key).or_default().push((ts, row));
    }
    for timeline in index.values_mut() {
        timeline.sort_by_key(|(ts, _)| *ts);
    }
    Ok(index)
}

/// Join key of every row, `None` where any part is null
fn key_rows(frame: &Frame, names: &[String]) -> Result<Vec<Option<Vec<KeyValue>>>> {
    let columns = names
        .iter()
        .map(|n| frame.require(n))
        .collect::<keel_core::Result<Vec<_>>>()?;
    Ok((0..frame.num_rows())
        .map(|row| columns.iter().map(|c| c.values[row].key()).collect())
        .collect())
}
