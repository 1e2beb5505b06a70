//! Column data types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Logical type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float16,
    Float32,
    Float64,
    String,
    Bool,
    Timestamp,
    Date,
}

/// Broad grouping used when comparing types across schema versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    SignedInt,
    UnsignedInt,
    Float,
    String,
    Bool,
    Temporal,
}

impl DataType {
    pub fn family(&self) -> TypeFamily {
        match self {
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
                TypeFamily::SignedInt
            }
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
                TypeFamily::UnsignedInt
            }
            DataType::Float16 | DataType::Float32 | DataType::Float64 => TypeFamily::Float,
            DataType::String => TypeFamily::String,
            DataType::Bool => TypeFamily::Bool,
            DataType::Timestamp | DataType::Date => TypeFamily::Temporal,
        }
    }

    /// Bit width for numeric types
    pub fn bit_width(&self) -> Option<u16> {
        match self {
            DataType::Int8 | DataType::UInt8 => Some(8),
            DataType::Int16 | DataType::UInt16 | DataType::Float16 => Some(16),
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => Some(32),
            DataType::Int64 | DataType::UInt64 | DataType::Float64 => Some(64),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self.family(),
            TypeFamily::SignedInt | TypeFamily::UnsignedInt
        )
    }

    pub fn is_float(&self) -> bool {
        self.family() == TypeFamily::Float
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn name(&self) -> &'static str {
        match self {
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::UInt8 => "uint8",
            DataType::UInt16 => "uint16",
            DataType::UInt32 => "uint32",
            DataType::UInt64 => "uint64",
            DataType::Float16 => "float16",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::String => "string",
            DataType::Bool => "bool",
            DataType::Timestamp => "timestamp",
            DataType::Date => "date",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DataType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dtype = match s.to_ascii_lowercase().as_str() {
            "int8" => DataType::Int8,
            "int16" => DataType::Int16,
            "int32" => DataType::Int32,
            "int64" | "int" => DataType::Int64,
            "uint8" => DataType::UInt8,
            "uint16" => DataType::UInt16,
            "uint32" => DataType::UInt32,
            "uint64" => DataType::UInt64,
            "float16" => DataType::Float16,
            "float32" => DataType::Float32,
            "float64" | "float" | "double" => DataType::Float64,
            "string" | "str" | "utf8" => DataType::String,
            "bool" | "boolean" => DataType::Bool,
            "timestamp" | "datetime" => DataType::Timestamp,
            "date" => DataType::Date,
            other => {
                return Err(CoreError::TypeError(format!("Unknown data type '{}'", other)))
            }
        };
        Ok(dtype)
    }
}
