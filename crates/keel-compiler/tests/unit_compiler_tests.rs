//! Unit tests for the feature table compiler
//!
//! Compiles table definitions and runs the resulting plans over small frames

use chrono::{Duration, TimeZone, Utc};
use keel_compiler::*;
use keel_core::*;

fn ts(day: u32) -> Value {
    Value::Timestamp(Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap())
}

fn transactions() -> Frame {
    Frame::new(vec![
        Column::new(
            "user_id",
            DataType::String,
            vec!["a".into(), "a".into(), "a".into(), "b".into()],
        ),
        Column::new("ts", DataType::Timestamp, vec![ts(1), ts(5), ts(9), ts(9)]),
        Column::new(
            "amount",
            DataType::Float64,
            vec![10.0.into(), 20.0.into(), 30.0.into(), 5.0.into()],
        ),
    ])
    .unwrap()
}

fn user_table() -> FeatureTable {
    FeatureTable::new(
        "user_spend",
        TableSource::External(SourceKind::batch(
            "transactions",
            SourceConfig::Table {
                name: "transactions".to_string(),
            },
        )),
        Entity::new("user", vec!["user_id"]).unwrap(),
    )
    .with_timestamp_field("ts")
}

fn column_values(frame: &Frame, name: &str) -> Vec<Value> {
    frame.column(name).unwrap().values.clone()
}

// =============================================================================
// Compilation
// =============================================================================

#[test]
fn test_compile_reports_source_tables() {
    let compiled = PlanCompiler::new().compile_table(&user_table(), None).unwrap();
    assert_eq!(compiled.table_name, "user_spend");
    assert_eq!(compiled.source_tables, vec!["transactions"]);
    assert!(compiled.sql.starts_with("SELECT * FROM transactions"));
}

#[test]
fn test_derived_table_reads_upstream() {
    let table = FeatureTable::derived_from(
        "user_rollup",
        "user_spend",
        Entity::new("user", vec!["user_id"]).unwrap(),
    );
    let compiled = PlanCompiler::new().compile_table(&table, None).unwrap();
    assert_eq!(compiled.source_tables, vec!["user_spend"]);
}

#[test]
fn test_date_range_requires_timestamp_field() {
    let mut table = user_table();
    table.timestamp_field = None;
    let range = DateRange::new(ts(1).as_timestamp().unwrap(), ts(5).as_timestamp().unwrap());
    let err = PlanCompiler::new().compile_table(&table, Some(&range)).unwrap_err();
    assert!(matches!(err, CompileError::MissingTimestampField { .. }));
}

#[test]
fn test_render_sql_can_be_disabled() {
    let compiler = PlanCompiler::with_options(CompilerOptions {
        render_sql: false,
        ..CompilerOptions::default()
    });
    let compiled = compiler.compile_table(&user_table(), None).unwrap();
    assert!(compiled.sql.is_empty());
}

// =============================================================================
// Execution
// =============================================================================

#[test]
fn test_date_range_filters_raw_rows_before_aggregation() {
    let table = user_table().with_aggregate("spend", "amount", AggFunction::Sum, None);
    let range = DateRange::new(ts(2).as_timestamp().unwrap(), ts(9).as_timestamp().unwrap());
    let compiled = PlanCompiler::new().compile_table(&table, Some(&range)).unwrap();
    assert!(compiled.sql.contains("GROUP BY user_id"));

    let out = compiled.plan.execute(&transactions()).unwrap();
    // only the Jan 5 row is inside [Jan 2 12:00, Jan 9 12:00)
    assert_eq!(out.num_rows(), 1);
    assert_eq!(column_values(&out, "user_id"), vec![Value::from("a")]);
    assert_eq!(column_values(&out, "spend"), vec![Value::Float(20.0)]);
    assert_eq!(column_values(&out, "ts"), vec![ts(5)]);
}

#[test]
fn test_window_anchors_on_newest_timestamp() {
    let table = user_table()
        .with_aggregate("spend_5d", "amount", AggFunction::Sum, Some(Duration::days(5)))
        .with_aggregate("txn_count", "amount", AggFunction::Count, None);
    let compiled = PlanCompiler::new().compile_table(&table, None).unwrap();
    let out = compiled.plan.execute(&transactions()).unwrap();

    assert_eq!(out.column_names(), vec!["user_id", "ts", "spend_5d", "txn_count"]);
    // anchor is Jan 9; window keeps Jan 5 and Jan 9 for user a
    assert_eq!(
        column_values(&out, "spend_5d"),
        vec![Value::Float(50.0), Value::Float(5.0)]
    );
    assert_eq!(column_values(&out, "txn_count"), vec![Value::Int(3), Value::Int(1)]);
}

#[test]
fn test_string_timestamps_filter_and_window() {
    let mut data = transactions();
    let as_strings: Vec<Value> = column_values(&data, "ts")
        .iter()
        .map(|v| Value::String(v.as_timestamp().unwrap().to_rfc3339()))
        .collect();
    data.rename_column("ts", "raw_ts").unwrap();
    data.push_column(Column::new("ts", DataType::String, as_strings)).unwrap();

    let table = user_table()
        .with_aggregate("spend_4d", "amount", AggFunction::Sum, Some(Duration::days(4)));
    let range = DateRange::new(ts(2).as_timestamp().unwrap(), ts(10).as_timestamp().unwrap());
    let compiled = PlanCompiler::new().compile_table(&table, Some(&range)).unwrap();
    let out = compiled.plan.execute(&data).unwrap();

    // Jan 1 falls outside the range; the window from the range end drops Jan 5
    assert_eq!(
        column_values(&out, "spend_4d"),
        vec![Value::Float(30.0), Value::Float(5.0)]
    );
    assert_eq!(out.column("ts").unwrap().dtype, DataType::Timestamp);
    assert_eq!(column_values(&out, "ts"), vec![ts(9), ts(9)]);
}

#[test]
fn test_empty_window_count_is_zero_sum_is_null() {
    let table = user_table()
        .with_aggregate("spend_1h", "amount", AggFunction::Sum, Some(Duration::hours(1)))
        .with_aggregate("count_1h", "amount", AggFunction::Count, Some(Duration::hours(1)));
    let range = DateRange::new(ts(1).as_timestamp().unwrap(), ts(6).as_timestamp().unwrap());
    let compiled = PlanCompiler::new().compile_table(&table, Some(&range)).unwrap();
    let out = compiled.plan.execute(&transactions()).unwrap();

    assert_eq!(column_values(&out, "spend_1h"), vec![Value::Null]);
    assert_eq!(column_values(&out, "count_1h"), vec![Value::Int(0)]);
}

#[test]
fn test_filters_and_derived_features() {
    let table = user_table()
        .with_filter(Filter::new("amount", FilterOperator::Gt, 10.0))
        .with_derived(
            "amount_cents",
            FeatureExpr::binary(
                ArithmeticOp::Mul,
                FeatureExpr::col("amount"),
                FeatureExpr::binary(ArithmeticOp::Mul, FeatureExpr::lit(10i64), FeatureExpr::lit(10i64)),
            ),
            Field::new(DataType::Int64),
        );
    let compiled = PlanCompiler::new().compile_table(&table, None).unwrap();
    assert_eq!(
        compiled.plan.derived[0].expr,
        FeatureExpr::binary(ArithmeticOp::Mul, FeatureExpr::col("amount"), FeatureExpr::lit(100i64))
    );

    let out = compiled.plan.execute(&transactions()).unwrap();
    assert_eq!(out.num_rows(), 2);
    assert_eq!(
        column_values(&out, "amount_cents"),
        vec![Value::Int(2000), Value::Int(3000)]
    );
}

#[test]
fn test_unknown_column_fails_at_execution() {
    let table = user_table().with_aggregate("x", "missing", AggFunction::Max, None);
    let compiled = PlanCompiler::new().compile_table(&table, None).unwrap();
    assert!(compiled.plan.execute(&transactions()).is_err());
}
