//! Builder pattern for FeatureStore

use keel_compiler::{PlanCompiler, TableCompiler};
use keel_core::{Dataset, FeatureTable, SourceTable, StructuredError, TableSource};
use keel_runtime::{
    Backend, BuildRegistry, FieldValidator, MemoryBackend, MemoryRegistry, QualityValidator,
};
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{BackendConfig, ProjectConfig, RegistryConfig};
use crate::error::{Result, SdkError};
use crate::store::FeatureStore;

/// Builder for FeatureStore
///
/// # Example
///
/// ```rust,ignore
/// use keel_sdk::{FeatureStoreBuilder, ProjectConfig};
///
/// let store = FeatureStoreBuilder::new()
///     .with_config(ProjectConfig::from_file("keel.yaml")?)
///     .with_env("dev")
///     .add_table(user_transactions)
///     .add_dataset(fraud_training)
///     .build()?;
/// ```
pub struct FeatureStoreBuilder {
    config: Option<ProjectConfig>,
    env: Option<String>,
    tables: Vec<FeatureTable>,
    source_tables: Vec<SourceTable>,
    datasets: Vec<Dataset>,
    backend: Option<Arc<dyn Backend>>,
    registry: Option<Arc<dyn BuildRegistry>>,
    compiler: Option<Arc<dyn TableCompiler>>,
    validator: Option<Arc<dyn QualityValidator>>,
}

impl FeatureStoreBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            env: None,
            tables: Vec::new(),
            source_tables: Vec::new(),
            datasets: Vec::new(),
            backend: None,
            registry: None,
            compiler: None,
            validator: None,
        }
    }

    pub fn with_config(mut self, config: ProjectConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Environment to activate instead of `KEEL_ENV` or the default
    pub fn with_env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    pub fn add_table(mut self, table: FeatureTable) -> Self {
        self.tables.push(table);
        self
    }

    pub fn add_tables(mut self, tables: Vec<FeatureTable>) -> Self {
        self.tables.extend(tables);
        self
    }

    pub fn add_source_table(mut self, table: SourceTable) -> Self {
        self.source_tables.push(table);
        self
    }

    pub fn add_source_tables(mut self, tables: Vec<SourceTable>) -> Self {
        self.source_tables.extend(tables);
        self
    }

    pub fn add_dataset(mut self, dataset: Dataset) -> Self {
        self.datasets.push(dataset);
        self
    }

    // ========== Collaborator Overrides ==========

    pub fn with_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_registry(mut self, registry: Arc<dyn BuildRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_compiler(mut self, compiler: Arc<dyn TableCompiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn QualityValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Validate definitions and assemble the store
    pub fn build(self) -> Result<FeatureStore> {
        let config = self
            .config
            .unwrap_or_else(|| ProjectConfig::new("keel"));
        config.validate()?;
        let (env_name, env) = config.resolve_environment(self.env.as_deref())?;
        let env = env.clone();

        config.validate_schedules(&self.tables)?;
        Self::validate_definitions(&self.tables, &self.source_tables, &self.datasets)?;

        let backend = self.backend.unwrap_or_else(|| match env.backend {
            BackendConfig::Memory => Arc::new(MemoryBackend::new()) as Arc<dyn Backend>,
        });
        let registry = match (self.registry, &env.registry) {
            (Some(registry), _) => Some(registry),
            (None, RegistryConfig::Memory) => {
                Some(Arc::new(MemoryRegistry::new()) as Arc<dyn BuildRegistry>)
            }
            (None, RegistryConfig::None) => None,
        };
        let compiler = self
            .compiler
            .unwrap_or_else(|| Arc::new(PlanCompiler::new()) as Arc<dyn TableCompiler>);
        let validator = self.validator.unwrap_or_else(|| {
            let validator = match env.build.quality_seed {
                Some(seed) => FieldValidator::new().with_seed(seed),
                None => FieldValidator::new(),
            };
            Arc::new(validator) as Arc<dyn QualityValidator>
        });

        tracing::info!(
            "Feature store '{}' ready in environment '{}': {} table(s), {} source table(s), {} dataset(s)",
            config.name,
            env_name,
            self.tables.len(),
            self.source_tables.len(),
            self.datasets.len()
        );

        Ok(FeatureStore::new(
            env_name,
            env,
            self.tables,
            self.source_tables,
            self.datasets,
            backend,
            registry,
            compiler,
            validator,
        ))
    }

    fn validate_definitions(
        tables: &[FeatureTable],
        source_tables: &[SourceTable],
        datasets: &[Dataset],
    ) -> Result<()> {
        let mut names = HashSet::new();
        for table in tables {
            table.validate()?;
            if !names.insert(table.name.as_str()) {
                return Err(SdkError::Config(format!(
                    "feature table '{}' is defined more than once",
                    table.name
                )));
            }
        }
        for table in source_tables {
            table.validate()?;
            if !names.insert(table.name.as_str()) {
                return Err(SdkError::Config(format!(
                    "table name '{}' is defined more than once",
                    table.name
                )));
            }
        }

        for table in tables {
            if let TableSource::SourceTable(name) = &table.source {
                if !source_tables.iter().any(|s| &s.name == name) {
                    return Err(StructuredError::table_not_found(
                        format!("Validating feature table '{}'", table.name),
                        name,
                    )
                    .into());
                }
            }
        }

        for dataset in datasets {
            dataset.validate()?;
            let context = format!("Validating dataset '{}'", dataset.name);
            for feature in dataset.all_features() {
                if let Some(table) = tables.iter().find(|t| t.name == feature.table) {
                    table.get_feature(&feature.name)?;
                } else if let Some(table) = source_tables.iter().find(|t| t.name == feature.table) {
                    table.get_feature(&feature.name)?;
                } else {
                    return Err(StructuredError::table_not_found(context.as_str(), &feature.table).into());
                }
            }
        }
        Ok(())
    }
}

impl Default for FeatureStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}
