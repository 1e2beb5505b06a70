//! Keel Compiler - feature table to query plan compiler
//!
//! This crate compiles feature table definitions into query plans and
//! executes those plans over in-memory frames.

pub mod compiler;
pub mod error;
pub mod eval;
pub mod exec;
pub mod plan;

// Re-export main types
pub use compiler::{CompilerOptions, PlanCompiler, TableCompiler};
pub use error::{CompileError, Result};
pub use eval::ConstantFolder;
pub use plan::{
    AggregateSpec, AggregationStep, CompiledQuery, DateFilter, DateRange, DerivedColumn, QueryPlan,
};
