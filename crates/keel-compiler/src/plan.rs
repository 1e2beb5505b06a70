//! Query plans produced by the compiler
//!
//! A plan has a fixed step order: date filter on the raw timestamp, row
//! filters, optional group-by aggregation, then derived columns.

use chrono::{DateTime, Duration, Utc};
use keel_core::{AggFunction, DataType, FeatureExpr, Filter, FilterValue, Value};
use serde::{Deserialize, Serialize};

/// Half-open time range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateFilter {
    pub column: String,
    pub range: DateRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSpec {
    pub name: String,
    pub column: String,
    pub function: AggFunction,
    pub window: Option<Duration>,
    /// Declared output type, if any
    pub dtype: Option<DataType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationStep {
    pub group_keys: Vec<String>,
    pub timestamp_column: String,
    /// Window anchor. `None` anchors at the newest timestamp in the input.
    pub anchor: Option<DateTime<Utc>>,
    pub aggregates: Vec<AggregateSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedColumn {
    pub name: String,
    pub expr: FeatureExpr,
    pub dtype: DataType,
}

/// Executable plan for one feature table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    /// Name of the registered source or upstream table to read
    pub source: String,
    pub date_filter: Option<DateFilter>,
    pub filters: Vec<Filter>,
    pub aggregation: Option<AggregationStep>,
    pub derived: Vec<DerivedColumn>,
}

impl QueryPlan {
    pub fn scan(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            date_filter: None,
            filters: Vec::new(),
            aggregation: None,
            derived: Vec::new(),
        }
    }

    /// Render the plan as SQL for display and debugging
    pub fn to_sql(&self) -> String {
        let mut predicates = Vec::new();
        if let Some(df) = &self.date_filter {
            predicates.push(format!(
                "{col} >= {} AND {col} < {}",
                sql_literal(&Value::Timestamp(df.range.start)),
                sql_literal(&Value::Timestamp(df.range.end)),
                col = df.column
            ));
        }
        for filter in &self.filters {
            let rhs = match &filter.value {
                FilterValue::Single(v) => sql_literal(v),
                FilterValue::List(values) => format!(
                    "({})",
                    values.iter().map(sql_literal).collect::<Vec<_>>().join(", ")
                ),
            };
            predicates.push(format!("{} {} {}", filter.field, filter.operator.sql(), rhs));
        }

        let mut sql = format!("SELECT * FROM {}", self.source);
        if !predicates.is_empty() {
            sql = format!("{} WHERE {}", sql, predicates.join(" AND "));
        }

        if let Some(agg) = &self.aggregation {
            let anchor = match agg.anchor {
                Some(ts) => sql_literal(&Value::Timestamp(ts)),
                None => format!("MAX({}) OVER ()", agg.timestamp_column),
            };
            let mut select: Vec<String> = agg.group_keys.clone();
            select.push(format!(
                "MAX({ts}) AS {ts}",
                ts = agg.timestamp_column
            ));
            for spec in &agg.aggregates {
                let call = match spec.function {
                    AggFunction::CountDistinct => format!("COUNT(DISTINCT {})", spec.column),
                    f => format!("{}({})", f.sql(), spec.column),
                };
                let call = match spec.window {
                    Some(window) => format!(
                        "{} FILTER (WHERE {} >= {} - INTERVAL '{} seconds')",
                        call,
                        agg.timestamp_column,
                        anchor,
                        window.num_seconds()
                    ),
                    None => call,
                };
                select.push(format!("{} AS {}", call, spec.name));
            }
            sql = format!(
                "SELECT {} FROM ({}) GROUP BY {}",
                select.join(", "),
                sql,
                agg.group_keys.join(", ")
            );
        }

        if !self.derived.is_empty() {
            let cols = self
                .derived
                .iter()
                .map(|d| format!("CAST({} AS {}) AS {}", d.expr, d.dtype, d.name))
                .collect::<Vec<_>>()
                .join(", ");
            sql = format!("SELECT *, {} FROM ({})", cols, sql);
        }
        sql
    }
}

fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Timestamp(ts) => format!("TIMESTAMP '{}'", ts.format("%Y-%m-%d %H:%M:%S")),
        other => other.to_string(),
    }
}

/// Output of compiling a feature table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledQuery {
    pub table_name: String,
    pub plan: QueryPlan,
    pub sql: String,
    /// Tables the plan reads from
    pub source_tables: Vec<String>,
}
