//! Data types shared across Keel crates

pub mod dtype;
pub mod frame;
pub mod schema;
pub mod value;

pub use dtype::{DataType, TypeFamily};
pub use frame::{Column, Frame};
pub use schema::{SchemaField, TableSchema};
pub use value::{parse_timestamp, KeyValue, Value};
