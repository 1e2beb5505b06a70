//! In-memory columnar tables
//!
//! A [`Frame`] is an ordered set of equally long [`Column`]s. It is the unit
//! of data exchanged between sources, the query plan executor, the backend
//! and the point-in-time join.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{DataType, TableSchema, Value};
use crate::error::{CoreError, Result};

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub dtype: DataType,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, dtype: DataType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            dtype,
            values,
        }
    }

    /// Column of `len` nulls
    pub fn nulls(name: impl Into<String>, dtype: DataType, len: usize) -> Self {
        Self::new(name, dtype, vec![Value::Null; len])
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    /// Largest non-null value
    pub fn max(&self) -> Option<&Value> {
        self.values
            .iter()
            .filter(|v| !v.is_null())
            .fold(None, |best: Option<&Value>, v| match best {
                Some(b) if b.compare(v) != Some(std::cmp::Ordering::Less) => Some(b),
                _ => Some(v),
            })
    }

    pub fn take(&self, indices: &[usize]) -> Column {
        let values = indices
            .iter()
            .map(|&i| self.values.get(i).cloned().unwrap_or(Value::Null))
            .collect();
        Column::new(self.name.clone(), self.dtype, values)
    }
}

/// Ordered collection of equally long columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    columns: Vec<Column>,
}

impl Frame {
    /// Build a frame, rejecting duplicate names and ragged columns.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let len = first.len();
            if let Some(bad) = columns.iter().find(|c| c.len() != len) {
                return Err(CoreError::SchemaMismatch(format!(
                    "column '{}' has {} rows, expected {}",
                    bad.name,
                    bad.len(),
                    len
                )));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(CoreError::SchemaMismatch(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Zero-row frame with the given schema
    pub fn empty(schema: &TableSchema) -> Self {
        Self {
            columns: schema
                .fields()
                .iter()
                .map(|f| Column::new(f.name.clone(), f.dtype, Vec::new()))
                .collect(),
        }
    }

    /// Build from JSON objects, converting each cell to the schema's type.
    /// Keys absent from a row become nulls; keys absent from the schema are ignored.
    pub fn from_rows(schema: &TableSchema, rows: &[serde_json::Value]) -> Result<Self> {
        let mut columns: Vec<Column> = schema
            .fields()
            .iter()
            .map(|f| Column::new(f.name.clone(), f.dtype, Vec::with_capacity(rows.len())))
            .collect();
        for (idx, row) in rows.iter().enumerate() {
            let object = row.as_object().ok_or_else(|| {
                CoreError::InvalidValue(format!("row {} is not a JSON object", idx))
            })?;
            for column in columns.iter_mut() {
                let cell = match object.get(&column.name) {
                    Some(json) => Value::from_json(json, column.dtype)?,
                    None => Value::Null,
                };
                column.values.push(cell);
            }
        }
        Ok(Self { columns })
    }

    /// Build from JSON objects, inferring column types from the first
    /// non-null value of each key. Strings that parse as dates or
    /// timestamps become timestamp columns.
    pub fn infer_from_rows(rows: &[serde_json::Value]) -> Result<Self> {
        let mut schema = TableSchema::new();
        for row in rows {
            let Some(object) = row.as_object() else {
                continue;
            };
            for (key, json) in object {
                if schema.contains(key) {
                    continue;
                }
                let dtype = match json {
                    serde_json::Value::Bool(_) => Some(DataType::Bool),
                    serde_json::Value::Number(n) if n.is_i64() => Some(DataType::Int64),
                    serde_json::Value::Number(_) => Some(DataType::Float64),
                    serde_json::Value::String(s) if super::parse_timestamp(s).is_some() => {
                        Some(DataType::Timestamp)
                    }
                    serde_json::Value::String(_) => Some(DataType::String),
                    _ => None,
                };
                if let Some(dtype) = dtype {
                    schema.push(key.clone(), dtype);
                }
            }
        }
        Self::from_rows(&schema, rows)
    }

    pub fn to_rows(&self) -> Vec<serde_json::Value> {
        (0..self.num_rows())
            .map(|row| {
                let object = self
                    .columns
                    .iter()
                    .map(|c| (c.name.clone(), c.values[row].to_json()))
                    .collect::<serde_json::Map<_, _>>();
                serde_json::Value::Object(object)
            })
            .collect()
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Like [`Frame::column`] but errors when absent
    pub fn require(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .ok_or_else(|| CoreError::ColumnNotFound(name.to_string()))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn schema(&self) -> TableSchema {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.dtype))
            .collect()
    }

    /// Append a column of matching length
    pub fn push_column(&mut self, column: Column) -> Result<()> {
        if self.has_column(&column.name) {
            return Err(CoreError::SchemaMismatch(format!(
                "duplicate column '{}'",
                column.name
            )));
        }
        if !self.columns.is_empty() && column.len() != self.num_rows() {
            return Err(CoreError::SchemaMismatch(format!(
                "column '{}' has {} rows, expected {}",
                column.name,
                column.len(),
                self.num_rows()
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        if from == to {
            return Ok(());
        }
        if self.has_column(to) {
            return Err(CoreError::SchemaMismatch(format!(
                "cannot rename '{}' to existing column '{}'",
                from, to
            )));
        }
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.name == from)
            .ok_or_else(|| CoreError::ColumnNotFound(from.to_string()))?;
        column.name = to.to_string();
        Ok(())
    }

    /// Project to the named columns, in the given order
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Frame> {
        let columns = names
            .iter()
            .map(|n| self.require(n.as_ref()).cloned())
            .collect::<Result<Vec<_>>>()?;
        Frame::new(columns)
    }

    /// Gather rows by index
    pub fn take(&self, indices: &[usize]) -> Frame {
        Frame {
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
        }
    }

    /// Keep rows where `mask` is true
    pub fn filter(&self, mask: &[bool]) -> Frame {
        let indices: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, keep)| keep.then_some(i))
            .collect();
        self.take(&indices)
    }

    /// Row values for the given column names
    pub fn row_values<S: AsRef<str>>(&self, row: usize, names: &[S]) -> Result<Vec<Value>> {
        names
            .iter()
            .map(|n| {
                self.require(n.as_ref())
                    .map(|c| c.values.get(row).cloned().unwrap_or(Value::Null))
            })
            .collect()
    }

    /// Stack `other` below `self`, aligning columns by name.
    /// Columns missing on either side are filled with nulls.
    pub fn concat(&self, other: &Frame) -> Result<Frame> {
        if self.columns.is_empty() {
            return Ok(other.clone());
        }
        if other.columns.is_empty() {
            return Ok(self.clone());
        }
        let mut columns = Vec::with_capacity(self.columns.len());
        for left in &self.columns {
            let mut values = left.values.clone();
            match other.column(&left.name) {
                Some(right) if right.dtype != left.dtype => {
                    return Err(CoreError::SchemaMismatch(format!(
                        "column '{}' is {} on one side and {} on the other",
                        left.name, left.dtype, right.dtype
                    )))
                }
                Some(right) => values.extend(right.values.iter().cloned()),
                None => values.extend(std::iter::repeat(Value::Null).take(other.num_rows())),
            }
            columns.push(Column::new(left.name.clone(), left.dtype, values));
        }
        for right in other.columns.iter().filter(|c| !self.has_column(&c.name)) {
            let mut values = vec![Value::Null; self.num_rows()];
            values.extend(right.values.iter().cloned());
            columns.push(Column::new(right.name.clone(), right.dtype, values));
        }
        Frame::new(columns)
    }

    /// Row indices grouped by the key formed from `names`. Rows with a null
    /// key part are left out. Groups keep first-seen order.
    pub fn group_indices<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<(Vec<Value>, Vec<usize>)>> {
        let key_columns = names
            .iter()
            .map(|n| self.require(n.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let mut positions: HashMap<Vec<super::KeyValue>, usize> = HashMap::new();
        let mut groups: Vec<(Vec<Value>, Vec<usize>)> = Vec::new();
        'rows: for row in 0..self.num_rows() {
            let mut key = Vec::with_capacity(key_columns.len());
            for column in &key_columns {
                match column.values[row].key() {
                    Some(k) => key.push(k),
                    None => continue 'rows,
                }
            }
            match positions.get(&key) {
                Some(&pos) => groups[pos].1.push(row),
                None => {
                    positions.insert(key, groups.len());
                    let values = key_columns.iter().map(|c| c.values[row].clone()).collect();
                    groups.push((values, vec![row]));
                }
            }
        }
        Ok(groups)
    }
}
