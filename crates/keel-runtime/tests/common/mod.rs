//! Common test utilities for runtime integration tests

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use keel_compiler::CompiledQuery;
use keel_core::{
    Column, DataType, Entity, FeatureTable, Frame, SourceConfig, SourceKind, TableSource, Value,
    WriteMode,
};
use keel_runtime::{Backend, Connection, MemoryBackend, Result};
use std::sync::Mutex;

/// Midnight UTC on the given day
pub fn ts(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

pub fn user_entity() -> Entity {
    Entity::new("user", vec!["user_id"]).unwrap()
}

/// Frame with `user_id`, `event_ts` and `amount` columns
pub fn transactions(rows: &[(&str, DateTime<Utc>, f64)]) -> Frame {
    Frame::new(vec![
        Column::new(
            "user_id",
            DataType::String,
            rows.iter().map(|(u, _, _)| Value::from(*u)).collect(),
        ),
        Column::new(
            "event_ts",
            DataType::Timestamp,
            rows.iter().map(|(_, t, _)| Value::from(*t)).collect(),
        ),
        Column::new(
            "amount",
            DataType::Float64,
            rows.iter().map(|(_, _, a)| Value::from(*a)).collect(),
        ),
    ])
    .unwrap()
}

/// Same rows with `event_ts` stored as RFC 3339 strings
pub fn with_string_timestamps(frame: &Frame) -> Frame {
    let columns = frame
        .columns()
        .iter()
        .map(|c| match c.name.as_str() {
            "event_ts" => Column::new(
                "event_ts",
                DataType::String,
                c.values
                    .iter()
                    .map(|v| match v {
                        Value::Timestamp(t) => Value::String(t.to_rfc3339()),
                        other => other.clone(),
                    })
                    .collect(),
            ),
            _ => c.clone(),
        })
        .collect();
    Frame::new(columns).unwrap()
}

/// Table reading inline rows from a batch source named `{name}_src`
pub fn inline_table(name: &str, data: Frame) -> FeatureTable {
    FeatureTable::new(
        name,
        TableSource::External(SourceKind::batch(
            format!("{}_src", name),
            SourceConfig::Inline { data },
        )),
        user_entity(),
    )
    .with_timestamp_field("event_ts")
}

/// Table whose source is a backend table that was never written
pub fn broken_table(name: &str) -> FeatureTable {
    FeatureTable::new(
        name,
        TableSource::External(SourceKind::batch(
            format!("{}_src", name),
            SourceConfig::Table {
                name: "does_not_exist".to_string(),
            },
        )),
        user_entity(),
    )
}

/// Memory backend that records the physical operations it receives
#[derive(Default)]
pub struct RecordingBackend {
    pub inner: MemoryBackend,
    calls: Mutex<Vec<String>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded calls such as `drop:t`, `delete:t:event_ts` or `write:t:append`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Recorded calls that touched `table`
    pub fn calls_for(&self, table: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.split(':').nth(1) == Some(table))
            .collect()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl Backend for RecordingBackend {
    async fn connect(&self) -> Result<Connection> {
        self.inner.connect().await
    }

    async fn register_source(
        &self,
        conn: &mut Connection,
        name: &str,
        config: &SourceConfig,
    ) -> Result<()> {
        self.inner.register_source(conn, name, config).await
    }

    async fn execute(&self, conn: &Connection, query: &CompiledQuery) -> Result<Frame> {
        self.inner.execute(conn, query).await
    }

    async fn write_table(
        &self,
        name: &str,
        data: &Frame,
        mode: WriteMode,
        merge_keys: Option<&[String]>,
    ) -> Result<()> {
        self.record(format!("write:{}:{}", name, mode));
        self.inner.write_table(name, data, mode, merge_keys).await
    }

    async fn read_table(&self, name: &str, version: Option<u64>) -> Result<Frame> {
        self.inner.read_table(name, version).await
    }

    async fn drop_table(&self, name: &str) -> Result<()> {
        self.record(format!("drop:{}", name));
        self.inner.drop_table(name).await
    }

    async fn delete_range(
        &self,
        name: &str,
        partition_col: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<()> {
        self.record(format!("delete:{}:{}", name, partition_col));
        self.inner.delete_range(name, partition_col, start, end).await
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        self.inner.table_exists(name).await
    }
}
