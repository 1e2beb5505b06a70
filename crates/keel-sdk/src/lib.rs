//! Keel Feature Store SDK
//!
//! High-level API for building feature tables and reading point-in-time
//! correct training data.

pub mod builder;
pub mod config;
pub mod error;
pub mod store;
pub mod telemetry;

// Re-export main types
pub use builder::FeatureStoreBuilder;
pub use config::{BackendConfig, BuildDefaults, EnvironmentConfig, ProjectConfig, RegistryConfig};
pub use error::{Result, SdkError};
pub use store::FeatureStore;
pub use telemetry::init_tracing;

// Re-export commonly used types from dependencies
pub use keel_core::{
    Dataset, Entity, Feature, FeatureTable, Frame, MigrationAction, SourceTable, Value,
};
pub use keel_runtime::{BuildOptions, BuildResult, BuildStatus, FreshnessResult, FreshnessStatus};
