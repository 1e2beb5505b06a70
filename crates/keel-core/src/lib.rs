//! Keel Core - Core types and definitions for the Keel feature store
//!
//! This crate provides the data model shared by every other Keel crate:
//! - Cell values, columnar frames and schemas
//! - Entities, feature tables, source tables, sources and datasets
//! - Structured errors
//! - Schema evolution classification

pub mod dataset;
pub mod duration;
pub mod entity;
pub mod error;
pub mod evolution;
pub mod expr;
pub mod field;
pub mod sla;
pub mod source;
pub mod source_table;
pub mod table;
pub mod types;

// Re-export commonly used types
pub use dataset::{Dataset, Feature};
pub use entity::Entity;
pub use error::{CoreError, ErrorKind, Result, StructuredError};
pub use evolution::{
    detect_schema_changes, MigrationAction, SchemaChange, SchemaChangeKind, SchemaEvolutionResult,
};
pub use expr::{AggFunction, ArithmeticOp, FeatureExpr, Filter, FilterOperator, FilterValue};
pub use field::{Field, Severity};
pub use sla::Sla;
pub use source::{BatchSource, RealTimeSource, SourceConfig, SourceKind, StreamSource};
pub use source_table::SourceTable;
pub use table::{AggregateFeature, ColumnField, DerivedFeature, FeatureTable, TableSource, WriteMode};
pub use types::{Column, DataType, Frame, KeyValue, TableSchema, Value};
