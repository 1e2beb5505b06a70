//! Cell values stored in frames
//!
//! `Value` is the dynamically typed cell of a [`Frame`](super::Frame) column.
//! Integers and floats compare with each other numerically; nulls compare with
//! nothing and never act as join keys.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use super::DataType;
use crate::error::{CoreError, Result};

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    String(String),
}

/// Hashable form of a non-null value, used for grouping and join keys
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    Bool(bool),
    Int(i64),
    Float(u64),
    Timestamp(DateTime<Utc>),
    String(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Like [`as_timestamp`](Self::as_timestamp), but also parses strings
    /// holding a date or timestamp.
    pub fn to_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            Value::String(s) => parse_timestamp(s),
            _ => None,
        }
    }

    /// Hashable key, `None` for nulls. Integral floats collapse onto ints.
    pub fn key(&self) -> Option<KeyValue> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(KeyValue::Bool(*b)),
            Value::Int(i) => Some(KeyValue::Int(*i)),
            Value::Float(f) => {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    Some(KeyValue::Int(*f as i64))
                } else {
                    Some(KeyValue::Float(f.to_bits()))
                }
            }
            Value::Timestamp(ts) => Some(KeyValue::Timestamp(*ts)),
            Value::String(s) => Some(KeyValue::String(s.clone())),
        }
    }

    /// Compare two values. Returns `None` for nulls and incomparable types.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(_), Value::Float(_))
            | (Value::Float(_), Value::Int(_))
            | (Value::Float(_), Value::Float(_)) => self.as_f64()?.partial_cmp(&other.as_f64()?),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Best-effort type of this value, `None` for nulls
    pub fn infer_dtype(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Bool(_) => Some(DataType::Bool),
            Value::Int(_) => Some(DataType::Int64),
            Value::Float(_) => Some(DataType::Float64),
            Value::Timestamp(_) => Some(DataType::Timestamp),
            Value::String(_) => Some(DataType::String),
        }
    }

    /// Convert this value to the representation used for `dtype`.
    pub fn cast(&self, dtype: DataType) -> Result<Value> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        let cast_err = || {
            CoreError::TypeError(format!("Cannot cast {} to {}", self, dtype))
        };
        let value = match dtype {
            d if d.is_integer() => match self {
                Value::Int(i) => Value::Int(*i),
                Value::Float(f) if f.is_finite() => Value::Int(f.trunc() as i64),
                Value::Bool(b) => Value::Int(i64::from(*b)),
                Value::String(s) => Value::Int(s.trim().parse().map_err(|_| cast_err())?),
                _ => return Err(cast_err()),
            },
            d if d.is_float() => match self {
                Value::Int(i) => Value::Float(*i as f64),
                Value::Float(f) => Value::Float(*f),
                Value::String(s) => Value::Float(s.trim().parse().map_err(|_| cast_err())?),
                _ => return Err(cast_err()),
            },
            DataType::Bool => match self {
                Value::Bool(b) => Value::Bool(*b),
                Value::Int(i) => Value::Bool(*i != 0),
                Value::String(s) => Value::Bool(s.trim().parse().map_err(|_| cast_err())?),
                _ => return Err(cast_err()),
            },
            DataType::Timestamp | DataType::Date => match self {
                Value::Timestamp(ts) => Value::Timestamp(*ts),
                Value::String(s) => Value::Timestamp(parse_timestamp(s).ok_or_else(cast_err)?),
                _ => return Err(cast_err()),
            },
            _ => match self {
                Value::String(s) => Value::String(s.clone()),
                other => Value::String(other.to_string()),
            },
        };
        Ok(value)
    }

    /// Convert a JSON value into a cell of the given type
    pub fn from_json(json: &serde_json::Value, dtype: DataType) -> Result<Value> {
        let raw = match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s.clone()),
            other => {
                return Err(CoreError::InvalidValue(format!(
                    "Nested JSON values are not supported: {}",
                    other
                )))
            }
        };
        raw.cast(dtype)
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Timestamp(ts) => serde_json::Value::String(ts.to_rfc3339()),
            Value::String(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// Parse RFC 3339 timestamps, naive `YYYY-MM-DD HH:MM:SS` (taken as UTC) and bare dates.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}
