//! Keel Runtime - Build execution for the Keel feature store
//!
//! This crate turns feature table definitions into materialized data:
//! - Dependency resolution over feature tables
//! - Build orchestration with quality gates and failure isolation
//! - Point-in-time joins for training data
//! - Storage backends and build registries
//! - Freshness checks against table SLAs

pub mod backend;
pub mod build;
pub mod dag;
pub mod error;
pub mod freshness;
pub mod pit;
pub mod quality;
pub mod registry;

// Re-export commonly used types
pub use backend::{load_source, Backend, Connection, MemoryBackend};
pub use build::{BuildEngine, BuildOptions, BuildResult, BuildStatus, TableBuildResult};
pub use dag::{Dag, DagNode, NodeId};
pub use error::{Result, RuntimeError};
pub use freshness::{check_freshness, FreshnessResult, FreshnessStatus, TableFreshness};
pub use pit::{pit_join, FeatureTableData};
pub use quality::{
    ConstraintChecker, ConstraintResult, CustomValidator, FieldResult, FieldValidator,
    FrameConstraintChecker, QualityValidator, TableValidationResult, DEFAULT_OVERRIDE_HINT,
};
pub use registry::{BuildRecord, BuildRegistry, MemoryRegistry, QualityResultRecord};
