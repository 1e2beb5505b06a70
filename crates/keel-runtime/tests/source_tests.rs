//! Source loading tests

mod common;

use common::*;
use keel_core::{
    DataType, FeatureTable, SourceConfig, SourceKind, SourceTable, TableSchema, TableSource, Value,
    WriteMode,
};
use keel_runtime::{load_source, Backend, BuildEngine, BuildOptions, BuildStatus, MemoryBackend};
use std::io::Write;
use std::sync::Arc;

const ROWS: &str = r#"{"user_id": "A", "event_ts": "2024-01-05T00:00:00Z", "amount": 100.5}
{"user_id": "B", "event_ts": "2024-01-10", "amount": 7}

{"user_id": "A", "event_ts": "2024-01-15T12:00:00Z"}
"#;

fn jsonl(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

// ============================================================================
// JSON Lines
// ============================================================================

#[tokio::test]
async fn test_json_lines_infers_types() {
    let file = jsonl(ROWS);
    let backend = MemoryBackend::new();
    let config = SourceConfig::JsonLines {
        path: file.path().to_path_buf(),
        schema: None,
    };

    let frame = load_source(&backend, &config).await.unwrap();

    // blank lines are skipped
    assert_eq!(frame.num_rows(), 3);
    assert_eq!(frame.require("event_ts").unwrap().dtype, DataType::Timestamp);
    assert_eq!(frame.require("user_id").unwrap().dtype, DataType::String);
    assert_eq!(
        frame.require("event_ts").unwrap().values[1],
        Value::Timestamp(ts(2024, 1, 10))
    );
    // missing keys become nulls
    assert_eq!(frame.require("amount").unwrap().values[2], Value::Null);
}

#[tokio::test]
async fn test_json_lines_with_schema() {
    let file = jsonl(ROWS);
    let backend = MemoryBackend::new();
    let schema = TableSchema::new()
        .with_field("user_id", DataType::String)
        .with_field("amount", DataType::Float64);
    let config = SourceConfig::JsonLines {
        path: file.path().to_path_buf(),
        schema: Some(schema),
    };

    let frame = load_source(&backend, &config).await.unwrap();

    assert_eq!(frame.column_names(), vec!["user_id", "amount"]);
    assert_eq!(frame.require("amount").unwrap().values[1], Value::Float(7.0));
}

#[tokio::test]
async fn test_json_lines_missing_file() {
    let backend = MemoryBackend::new();
    let config = SourceConfig::JsonLines {
        path: "/nonexistent/rows.jsonl".into(),
        schema: None,
    };

    let err = load_source(&backend, &config).await.unwrap_err();
    assert!(err.to_string().contains("/nonexistent/rows.jsonl"));
}

#[tokio::test]
async fn test_build_from_json_lines() {
    let file = jsonl(ROWS);
    let backend = Arc::new(MemoryBackend::new());
    let engine = engine(backend.clone());

    let table = FeatureTable::new(
        "txns",
        TableSource::External(SourceKind::batch(
            "raw_txns",
            SourceConfig::JsonLines {
                path: file.path().to_path_buf(),
                schema: None,
            },
        )),
        user_entity(),
    )
    .with_timestamp_field("event_ts");

    let result = engine.build(&[table], &BuildOptions::new()).await.unwrap();
    assert_eq!(result.tables[0].status, BuildStatus::Success);
    assert_eq!(result.tables[0].row_count, Some(3));
    assert_eq!(backend.read_table("txns", None).await.unwrap().num_rows(), 3);
}

// ============================================================================
// Source Tables
// ============================================================================

fn events() -> keel_core::Frame {
    transactions(&[
        ("A", ts(2024, 1, 5), 10.0),
        ("B", ts(2024, 1, 6), 20.0),
    ])
}

fn reads_events() -> FeatureTable {
    FeatureTable::new("event_stats", TableSource::SourceTable("events".to_string()), user_entity())
        .with_timestamp_field("event_ts")
}

#[tokio::test]
async fn test_build_from_source_table() {
    let backend = Arc::new(MemoryBackend::new());
    let source_table = SourceTable::new(
        "events",
        SourceKind::batch("raw_events", SourceConfig::Inline { data: events() }),
        user_entity(),
    );
    let engine = engine(backend.clone()).with_source_tables(vec![source_table]);

    let result = engine.build(&[reads_events()], &BuildOptions::new()).await.unwrap();

    assert_eq!(result.tables.len(), 1);
    assert_eq!(result.tables[0].status, BuildStatus::Success);
    assert_eq!(backend.read_table("event_stats", None).await.unwrap().num_rows(), 2);
    // the source table itself is never written
    assert!(!backend.table_exists("events").await.unwrap());
    assert!(!backend.table_exists("raw_events").await.unwrap());
}

#[tokio::test]
async fn test_unregistered_source_table_reads_backend_table() {
    let backend = Arc::new(MemoryBackend::new());
    backend
        .write_table("events", &events(), WriteMode::Overwrite, None)
        .await
        .unwrap();

    let result = engine(backend.clone())
        .build(&[reads_events()], &BuildOptions::new())
        .await
        .unwrap();

    assert_eq!(result.tables[0].status, BuildStatus::Success);
    assert_eq!(result.tables[0].row_count, Some(2));
}

fn engine(backend: Arc<MemoryBackend>) -> BuildEngine {
    BuildEngine::new(
        backend,
        Arc::new(keel_compiler::PlanCompiler::new()),
        Arc::new(keel_runtime::FieldValidator::new()),
    )
}
