//! Integration tests for the build engine
//!
//! Covers write precedence, failure cascades, the quality gate, targeted
//! builds and registry bookkeeping.

mod common;

use common::{
    broken_table, inline_table, transactions, ts, user_entity, with_string_timestamps,
    RecordingBackend,
};
use keel_compiler::PlanCompiler;
use keel_core::{DataType, FeatureTable, Field, Severity, WriteMode};
use keel_runtime::{
    Backend, BuildEngine, BuildOptions, BuildRegistry, BuildStatus, FieldValidator, MemoryRegistry,
    DEFAULT_OVERRIDE_HINT,
};
use std::sync::Arc;

fn engine(backend: Arc<RecordingBackend>) -> BuildEngine {
    BuildEngine::new(
        backend,
        Arc::new(PlanCompiler::new()),
        Arc::new(FieldValidator::new()),
    )
}

fn january() -> FeatureTable {
    inline_table(
        "txns",
        transactions(&[
            ("A", ts(2024, 1, 5), 100.0),
            ("A", ts(2024, 1, 15), 200.0),
            ("B", ts(2024, 1, 25), 50.0),
        ]),
    )
}

// ============================================================================
// Write Precedence
// ============================================================================

#[tokio::test]
async fn test_default_build_uses_table_write_mode() {
    let backend = Arc::new(RecordingBackend::new());
    let table = january().with_write_mode(WriteMode::Merge);

    let result = engine(backend.clone())
        .build(&[table], &BuildOptions::new())
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.tables[0].row_count, Some(3));
    assert_eq!(backend.calls(), vec!["write:txns:merge"]);
}

#[tokio::test]
async fn test_full_refresh_overrides_write_mode_and_range() {
    let backend = Arc::new(RecordingBackend::new());
    let table = january().with_write_mode(WriteMode::Merge);
    let options = BuildOptions::new()
        .with_full_refresh(true)
        .with_range(ts(2024, 1, 1), ts(2024, 2, 1));

    let result = engine(backend.clone()).build(&[table], &options).await.unwrap();

    assert!(result.is_success());
    assert_eq!(backend.calls(), vec!["drop:txns", "write:txns:overwrite"]);
}

#[tokio::test]
async fn test_range_deletes_then_appends() {
    let backend = Arc::new(RecordingBackend::new());
    let engine = engine(backend.clone());

    // Seed a row outside the range and a stale one inside it
    backend
        .inner
        .write_table(
            "txns",
            &transactions(&[("Z", ts(2023, 12, 1), 1.0), ("A", ts(2024, 1, 10), 999.0)]),
            WriteMode::Overwrite,
            None,
        )
        .await
        .unwrap();

    let options = BuildOptions::new().with_range(ts(2024, 1, 1), ts(2024, 1, 20));
    let result = engine.build(&[january()], &options).await.unwrap();

    assert!(result.is_success());
    // Only the two January rows before the 20th pass the range filter
    assert_eq!(result.tables[0].row_count, Some(2));
    assert_eq!(backend.calls(), vec!["delete:txns:event_ts", "write:txns:append"]);

    let stored = backend.inner.read_table("txns", None).await.unwrap();
    assert_eq!(stored.num_rows(), 3);
    let amounts = &stored.column("amount").unwrap().values;
    assert!(!amounts.contains(&999.0.into()));
}

#[tokio::test]
async fn test_range_over_string_timestamps() {
    let backend = Arc::new(RecordingBackend::new());
    let engine = engine(backend.clone());

    backend
        .inner
        .write_table(
            "txns",
            &with_string_timestamps(&transactions(&[
                ("Z", ts(2023, 12, 1), 1.0),
                ("A", ts(2024, 1, 10), 999.0),
            ])),
            WriteMode::Overwrite,
            None,
        )
        .await
        .unwrap();

    let table = inline_table(
        "txns",
        with_string_timestamps(&transactions(&[
            ("A", ts(2024, 1, 5), 100.0),
            ("A", ts(2024, 1, 15), 200.0),
            ("B", ts(2024, 1, 25), 50.0),
        ])),
    );
    let options = BuildOptions::new().with_range(ts(2024, 1, 1), ts(2024, 1, 20));
    let result = engine.build(&[table], &options).await.unwrap();

    assert_eq!(result.tables[0].status, BuildStatus::Success);
    assert_eq!(result.tables[0].row_count, Some(2));

    let stored = backend.inner.read_table("txns", None).await.unwrap();
    assert_eq!(
        stored.column("amount").unwrap().values,
        vec![1.0.into(), 100.0.into(), 200.0.into()]
    );
}

#[tokio::test]
async fn test_range_without_timestamp_field_fails_table() {
    let backend = Arc::new(RecordingBackend::new());
    let mut table = january();
    table.timestamp_field = None;
    let options = BuildOptions::new().with_range(ts(2024, 1, 1), ts(2024, 2, 1));

    let result = engine(backend.clone()).build(&[table], &options).await.unwrap();

    assert_eq!(result.tables[0].status, BuildStatus::Failed);
    assert!(backend.calls().is_empty());
}

// ============================================================================
// Failure Cascade
// ============================================================================

#[tokio::test]
async fn test_failure_skips_descendants_but_not_siblings() {
    let backend = Arc::new(RecordingBackend::new());
    let tables = vec![
        broken_table("a"),
        FeatureTable::derived_from("b", "a", user_entity()),
        FeatureTable::derived_from("c", "b", user_entity()),
        january(),
    ];

    let result = engine(backend.clone())
        .build(&tables, &BuildOptions::new())
        .await
        .unwrap();

    let a = result.get("a").unwrap();
    assert_eq!(a.status, BuildStatus::Failed);
    assert!(a.error.is_some());

    let b = result.get("b").unwrap();
    assert_eq!(b.status, BuildStatus::Skipped);
    assert_eq!(b.error.as_deref(), Some("Upstream table(s) failed: a"));

    let c = result.get("c").unwrap();
    assert_eq!(c.status, BuildStatus::Skipped);
    assert_eq!(c.error.as_deref(), Some("Upstream table(s) failed: a, b"));

    assert_eq!(result.get("txns").unwrap().status, BuildStatus::Success);
    assert_eq!(result.failed_count(), 1);
    assert_eq!(result.skipped_count(), 2);
    assert!(!result.is_success());

    // Skipped tables never reach the backend
    assert!(backend.calls_for("b").is_empty());
    assert!(backend.calls_for("c").is_empty());
}

#[tokio::test]
async fn test_downstream_reads_materialized_upstream() {
    let backend = Arc::new(RecordingBackend::new());
    let tables = vec![
        FeatureTable::derived_from("copy", "txns", user_entity()),
        january(),
    ];

    let result = engine(backend.clone())
        .build(&tables, &BuildOptions::new())
        .await
        .unwrap();

    assert!(result.is_success());
    let order: Vec<&str> = result.tables.iter().map(|t| t.table_name.as_str()).collect();
    assert_eq!(order, vec!["txns", "copy"]);
    assert_eq!(
        backend.inner.read_table("copy", None).await.unwrap().num_rows(),
        3
    );
}

// ============================================================================
// Quality Gate
// ============================================================================

fn strict_table() -> FeatureTable {
    inline_table(
        "scores",
        transactions(&[("A", ts(2024, 1, 5), -5.0), ("B", ts(2024, 1, 6), 10.0)]),
    )
    .with_column("amount", Field::new(DataType::Float64).with_ge(0.0))
}

#[tokio::test]
async fn test_quality_gate_blocks_write_and_cascades() {
    let backend = Arc::new(RecordingBackend::new());
    let tables = vec![
        strict_table(),
        FeatureTable::derived_from("downstream", "scores", user_entity()),
    ];

    let result = engine(backend.clone())
        .build(&tables, &BuildOptions::new())
        .await
        .unwrap();

    let scores = result.get("scores").unwrap();
    assert_eq!(scores.status, BuildStatus::Failed);
    assert_eq!(scores.validated, Some(false));
    let error = scores.error.as_deref().unwrap();
    assert!(error.contains("quality check failed"));
    assert!(error.contains("amount.ge"));
    assert!(error.ends_with(DEFAULT_OVERRIDE_HINT));

    assert_eq!(result.get("downstream").unwrap().status, BuildStatus::Skipped);
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_skip_quality_writes_anyway() {
    let backend = Arc::new(RecordingBackend::new());
    let options = BuildOptions::new().with_skip_quality(true);

    let result = engine(backend.clone())
        .build(&[strict_table()], &options)
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.tables[0].validated, None);
    assert_eq!(result.validated_count(), 0);
    assert_eq!(backend.calls(), vec!["write:scores:append"]);
}

#[tokio::test]
async fn test_warn_severity_counts_but_writes() {
    let backend = Arc::new(RecordingBackend::new());
    let table = january().with_column(
        "user_id",
        Field::new(DataType::String).with_pattern("^Z").with_severity(Severity::Warn),
    );

    let result = engine(backend.clone())
        .build(&[table], &BuildOptions::new())
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.tables[0].validated, Some(true));
    assert_eq!(result.tables[0].warning_count, 1);
    assert_eq!(result.warning_count(), 1);
}

#[tokio::test]
async fn test_custom_override_hint() {
    let backend = Arc::new(RecordingBackend::new());
    let engine = engine(backend).with_validator(Arc::new(
        FieldValidator::new().with_override_hint("Pass --skip-quality to bypass."),
    ));

    let result = engine
        .build(&[strict_table()], &BuildOptions::new())
        .await
        .unwrap();

    let error = result.tables[0].error.as_deref().unwrap();
    assert!(error.ends_with("Pass --skip-quality to bypass."));
}

#[tokio::test]
async fn test_custom_check_on_undeclared_column_blocks_write() {
    let backend = Arc::new(RecordingBackend::new());
    // january() declares no columns, but its data carries `amount`
    let engine = engine(backend.clone()).with_validator(Arc::new(
        FieldValidator::new().with_custom_validator("amount", |_col: &keel_core::Column| Ok(false)),
    ));

    let result = engine.build(&[january()], &BuildOptions::new()).await.unwrap();

    assert_eq!(result.tables[0].status, BuildStatus::Failed);
    assert!(result.tables[0].error.as_deref().unwrap().contains("amount.custom"));
    assert!(backend.calls().is_empty());
}

// ============================================================================
// Targets and Structural Errors
// ============================================================================

#[tokio::test]
async fn test_targets_build_only_ancestors() {
    let backend = Arc::new(RecordingBackend::new());
    let tables = vec![
        january(),
        FeatureTable::derived_from("mid", "txns", user_entity()),
        FeatureTable::derived_from("leaf", "mid", user_entity()),
        FeatureTable::derived_from("other", "txns", user_entity()),
    ];
    let options = BuildOptions::new().with_target("mid");

    let result = engine(backend).build(&tables, &options).await.unwrap();

    let built: Vec<&str> = result.tables.iter().map(|t| t.table_name.as_str()).collect();
    assert_eq!(built, vec!["txns", "mid"]);
}

#[tokio::test]
async fn test_unknown_target_is_structural_error() {
    let backend = Arc::new(RecordingBackend::new());
    let options = BuildOptions::new().with_target("nope");

    let err = engine(backend.clone())
        .build(&[january()], &options)
        .await
        .unwrap_err();

    let structured = err.structured().expect("structured error");
    assert!(structured.context.contains("nope"));
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn test_cycle_is_structural_error() {
    let backend = Arc::new(RecordingBackend::new());
    let tables = vec![
        FeatureTable::derived_from("x", "y", user_entity()),
        FeatureTable::derived_from("y", "x", user_entity()),
    ];

    let err = engine(backend)
        .build(&tables, &BuildOptions::new())
        .await
        .unwrap_err();

    let structured = err.structured().expect("structured error");
    assert!(structured.cause.contains("x, y"));
}

#[tokio::test]
async fn test_inverted_range_rejected() {
    let backend = Arc::new(RecordingBackend::new());
    let options = BuildOptions::new().with_range(ts(2024, 2, 1), ts(2024, 1, 1));

    let err = engine(backend)
        .build(&[january()], &options)
        .await
        .unwrap_err();

    assert!(err.structured().is_some());
}

// ============================================================================
// Registry
// ============================================================================

#[tokio::test]
async fn test_records_every_table_including_skipped() {
    let backend = Arc::new(RecordingBackend::new());
    let registry = Arc::new(MemoryRegistry::new());
    let tables = vec![
        broken_table("a"),
        FeatureTable::derived_from("b", "a", user_entity()),
        january(),
    ];

    let result = engine(backend)
        .with_registry(registry.clone())
        .build(&tables, &BuildOptions::new())
        .await
        .unwrap();

    let records = registry.build_records(None, 10).await.unwrap();
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.run_id == result.run_id));

    let skipped = registry.latest_build("b").await.unwrap().unwrap();
    assert_eq!(skipped.status, BuildStatus::Skipped);

    let txns = registry.latest_successful_build("txns").await.unwrap().unwrap();
    assert_eq!(txns.row_count, Some(3));
    assert_eq!(txns.data_timestamp_max, Some(ts(2024, 1, 25)));

    let quality = registry.quality_results("txns", 10).await.unwrap();
    assert_eq!(quality.len(), 1);
    assert!(quality[0].passed);
}

#[tokio::test]
async fn test_quality_failure_still_recorded() {
    let backend = Arc::new(RecordingBackend::new());
    let registry = Arc::new(MemoryRegistry::new());

    engine(backend)
        .with_registry(registry.clone())
        .build(&[strict_table()], &BuildOptions::new())
        .await
        .unwrap();

    let quality = registry.quality_results("scores", 10).await.unwrap();
    assert_eq!(quality.len(), 1);
    assert!(!quality[0].passed);

    let record = registry.latest_build("scores").await.unwrap().unwrap();
    assert_eq!(record.status, BuildStatus::Failed);
    assert_eq!(record.row_count, Some(2));
    assert!(registry.latest_successful_build("scores").await.unwrap().is_none());
}
