//! In-process execution of query plans over frames

use chrono::{DateTime, Utc};
use keel_core::{AggFunction, Column, DataType, Frame, KeyValue, Value};
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::error::{CompileError, Result};
use crate::eval::{evaluate, filter_mask};
use crate::plan::{AggregateSpec, AggregationStep, QueryPlan};

impl QueryPlan {
    /// Run the plan against the rows of its source
    pub fn execute(&self, input: &Frame) -> Result<Frame> {
        let mut frame = input.clone();

        if let Some(df) = &self.date_filter {
            let column = frame.require(&df.column)?;
            let mask: Vec<bool> = column
                .values
                .iter()
                .map(|v| v.to_timestamp().map(|ts| df.range.contains(ts)).unwrap_or(false))
                .collect();
            frame = frame.filter(&mask);
        }

        for filter in &self.filters {
            let mask = filter_mask(&frame, filter)?;
            frame = frame.filter(&mask);
        }

        if let Some(step) = &self.aggregation {
            frame = aggregate(&frame, step)?;
        }

        for derived in &self.derived {
            let values = evaluate(&frame, &derived.expr)?
                .into_iter()
                .map(|v| v.cast(derived.dtype))
                .collect::<keel_core::Result<Vec<_>>>()?;
            frame.push_column(Column::new(derived.name.clone(), derived.dtype, values))?;
        }

        Ok(frame)
    }
}

fn aggregate(frame: &Frame, step: &AggregationStep) -> Result<Frame> {
    let ts_column = frame.require(&step.timestamp_column)?;
    let anchor: Option<DateTime<Utc>> = match step.anchor {
        Some(anchor) => Some(anchor),
        None => ts_column.values.iter().filter_map(Value::to_timestamp).max(),
    };

    let mut key_columns: Vec<Column> = step
        .group_keys
        .iter()
        .map(|k| frame.require(k).map(|c| Column::new(c.name.clone(), c.dtype, Vec::new())))
        .collect::<keel_core::Result<_>>()?;
    // the group timestamp is parsed, so string columns come out as timestamps
    let ts_dtype = match ts_column.dtype {
        DataType::String => DataType::Timestamp,
        dtype => dtype,
    };
    let mut ts_out = Column::new(step.timestamp_column.clone(), ts_dtype, Vec::new());
    let mut agg_columns: Vec<Column> = step
        .aggregates
        .iter()
        .map(|spec| -> Result<Column> {
            let input = frame.require(&spec.column)?;
            Ok(Column::new(spec.name.clone(), output_dtype(spec, input.dtype), Vec::new()))
        })
        .collect::<Result<_>>()?;

    for (key, rows) in frame.group_indices(&step.group_keys)? {
        for (column, value) in key_columns.iter_mut().zip(key) {
            column.values.push(value);
        }
        let group_ts = rows
            .iter()
            .filter_map(|&r| ts_column.values[r].to_timestamp())
            .max();
        ts_out.values.push(group_ts.map(Value::Timestamp).unwrap_or(Value::Null));

        for (spec, out) in step.aggregates.iter().zip(agg_columns.iter_mut()) {
            let input = frame.require(&spec.column)?;
            let windowed: Vec<&Value> = rows
                .iter()
                .filter(|&&r| match (spec.window, anchor) {
                    (Some(window), Some(anchor)) => ts_column.values[r]
                        .to_timestamp()
                        .map(|ts| ts >= anchor - window)
                        .unwrap_or(false),
                    _ => true,
                })
                .map(|&r| &input.values[r])
                .collect();
            let value = apply_aggregate(spec.function, &windowed)?;
            out.values.push(value.cast(out.dtype)?);
        }
    }

    let mut columns = key_columns;
    columns.push(ts_out);
    columns.extend(agg_columns);
    Ok(Frame::new(columns)?)
}

fn output_dtype(spec: &AggregateSpec, input: DataType) -> DataType {
    if let Some(dtype) = spec.dtype {
        return dtype;
    }
    match spec.function {
        AggFunction::Count | AggFunction::CountDistinct => DataType::Int64,
        AggFunction::Avg => DataType::Float64,
        AggFunction::Sum if input.is_integer() => DataType::Int64,
        AggFunction::Sum => DataType::Float64,
        AggFunction::Min | AggFunction::Max => input,
    }
}

fn apply_aggregate(function: AggFunction, values: &[&Value]) -> Result<Value> {
    let present: Vec<&Value> = values.iter().copied().filter(|v| !v.is_null()).collect();
    let value = match function {
        AggFunction::Count => Value::Int(present.len() as i64),
        AggFunction::CountDistinct => {
            let distinct: HashSet<KeyValue> = present.iter().filter_map(|v| v.key()).collect();
            Value::Int(distinct.len() as i64)
        }
        _ if present.is_empty() => Value::Null,
        AggFunction::Sum => {
            if present.iter().all(|v| matches!(v, Value::Int(_))) {
                let total = present
                    .iter()
                    .filter_map(|v| v.as_i64())
                    .try_fold(0i64, |acc, x| acc.checked_add(x))
                    .ok_or_else(|| CompileError::Execution("integer overflow in SUM".to_string()))?;
                Value::Int(total)
            } else {
                Value::Float(numeric(&present)?.iter().sum())
            }
        }
        AggFunction::Avg => {
            let nums = numeric(&present)?;
            Value::Float(nums.iter().sum::<f64>() / nums.len() as f64)
        }
        AggFunction::Min | AggFunction::Max => {
            let want = if function == AggFunction::Min {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            let mut best = present[0];
            for v in &present[1..] {
                match v.compare(best) {
                    Some(ord) if ord == want => best = *v,
                    Some(_) => {}
                    None => {
                        return Err(CompileError::Execution(format!(
                            "cannot compare {} with {}",
                            v, best
                        )))
                    }
                }
            }
            best.clone()
        }
    };
    Ok(value)
}

fn numeric(values: &[&Value]) -> Result<Vec<f64>> {
    values
        .iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| CompileError::Execution(format!("non-numeric value '{}'", v)))
        })
        .collect()
}
