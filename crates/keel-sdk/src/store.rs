//! FeatureStore
//!
//! Entry point tying a project's definitions to its environment: builds,
//! point-in-time training reads, schema change previews and freshness.

use chrono::{DateTime, Duration, Utc};
use keel_compiler::TableCompiler;
use keel_core::{
    detect_schema_changes, Column, Dataset, ErrorKind, FeatureTable, Frame, SchemaEvolutionResult,
    SourceTable, StructuredError,
};
use keel_runtime::{
    check_freshness, load_source, pit_join, Backend, BuildEngine, BuildOptions, BuildRegistry,
    BuildResult, FeatureTableData, FreshnessResult, QualityValidator,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EnvironmentConfig;
use crate::error::Result;

/// Timestamp column assumed when a table does not name one
pub const DEFAULT_TIMESTAMP_COLUMN: &str = "event_ts";

/// A table a dataset can read features from
#[derive(Clone, Copy)]
enum ReadableTable<'a> {
    /// Read from its materialized rows
    Feature(&'a FeatureTable),
    /// Read straight from its source
    Source(&'a SourceTable),
}

impl<'a> ReadableTable<'a> {
    fn name(&self) -> &'a str {
        match self {
            ReadableTable::Feature(t) => &t.name,
            ReadableTable::Source(t) => &t.name,
        }
    }

    fn join_keys(&self) -> &'a [String] {
        match self {
            ReadableTable::Feature(t) => t.entity.join_keys(),
            ReadableTable::Source(t) => t.entity.join_keys(),
        }
    }

    fn timestamp_field(&self) -> Option<&'a str> {
        match self {
            ReadableTable::Feature(t) => t.timestamp_field.as_deref(),
            ReadableTable::Source(t) => t.effective_timestamp_field(),
        }
    }

    fn timestamp_column(&self) -> &'a str {
        self.timestamp_field().unwrap_or(DEFAULT_TIMESTAMP_COLUMN)
    }

    fn ttl(&self) -> Option<Duration> {
        match self {
            ReadableTable::Feature(t) => t.ttl(),
            ReadableTable::Source(t) => t.ttl(),
        }
    }
}

pub struct FeatureStore {
    env_name: String,
    env: EnvironmentConfig,
    tables: Vec<FeatureTable>,
    source_tables: Vec<SourceTable>,
    datasets: Vec<Dataset>,
    backend: Arc<dyn Backend>,
    registry: Option<Arc<dyn BuildRegistry>>,
    compiler: Arc<dyn TableCompiler>,
    engine: BuildEngine,
}

impl FeatureStore {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        env_name: String,
        env: EnvironmentConfig,
        tables: Vec<FeatureTable>,
        source_tables: Vec<SourceTable>,
        datasets: Vec<Dataset>,
        backend: Arc<dyn Backend>,
        registry: Option<Arc<dyn BuildRegistry>>,
        compiler: Arc<dyn TableCompiler>,
        validator: Arc<dyn QualityValidator>,
    ) -> Self {
        let mut engine = BuildEngine::new(backend.clone(), compiler.clone(), validator)
            .with_source_tables(source_tables.clone());
        if let Some(registry) = &registry {
            engine = engine.with_registry(registry.clone());
        }
        Self {
            env_name,
            env,
            tables,
            source_tables,
            datasets,
            backend,
            registry,
            compiler,
            engine,
        }
    }

    /// Name of the active environment
    pub fn env(&self) -> &str {
        &self.env_name
    }

    pub fn tables(&self) -> &[FeatureTable] {
        &self.tables
    }

    pub fn source_tables(&self) -> &[SourceTable] {
        &self.source_tables
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn registry(&self) -> Option<&Arc<dyn BuildRegistry>> {
        self.registry.as_ref()
    }

    pub fn table(&self, name: &str) -> Result<&FeatureTable> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| StructuredError::table_not_found(format!("Getting table '{}'", name), name).into())
    }

    pub fn source_table(&self, name: &str) -> Result<&SourceTable> {
        self.source_tables.iter().find(|t| t.name == name).ok_or_else(|| {
            StructuredError::table_not_found(format!("Getting source table '{}'", name), name).into()
        })
    }

    fn readable_table(&self, name: &str) -> Result<ReadableTable<'_>> {
        if let Some(table) = self.tables.iter().find(|t| t.name == name) {
            return Ok(ReadableTable::Feature(table));
        }
        if let Some(table) = self.source_tables.iter().find(|t| t.name == name) {
            return Ok(ReadableTable::Source(table));
        }
        Err(StructuredError::table_not_found(format!("Getting table '{}'", name), name).into())
    }

    pub fn dataset(&self, name: &str) -> Result<&Dataset> {
        self.datasets.iter().find(|d| d.name == name).ok_or_else(|| {
            let available: Vec<&str> = self.datasets.iter().map(|d| d.name.as_str()).collect();
            StructuredError::new(
                ErrorKind::General,
                format!("Getting dataset '{}'", name),
                "Dataset is not defined",
                format!("Use one of the defined datasets: {}", available.join(", ")),
            )
            .into()
        })
    }

    /// Build feature tables. `skip_quality` is forced on when the
    /// environment's build defaults skip quality checks.
    pub async fn build(&self, options: BuildOptions) -> Result<BuildResult> {
        let mut options = options;
        options.skip_quality |= self.env.build.skip_quality;
        Ok(self.engine.build(&self.tables, &options).await?)
    }

    /// Point-in-time correct training data for a dataset.
    ///
    /// Without `spine`, the first table the dataset references supplies one:
    /// its rows in `[start, end)` projected to entity keys and timestamp.
    /// Source tables are read from their source and need no build.
    pub async fn read_features(
        &self,
        dataset_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        spine: Option<Frame>,
    ) -> Result<Frame> {
        let dataset = self.dataset(dataset_name)?;
        let context = format!("Reading features from dataset '{}'", dataset.name);
        if start >= end {
            return Err(StructuredError::invalid_date_range(
                context,
                &start.to_rfc3339(),
                &end.to_rfc3339(),
            )
            .into());
        }

        let features = dataset.all_features();
        let table_names = dataset.tables();
        let Some(&spine_table_name) = table_names.first() else {
            return Err(StructuredError::new(
                ErrorKind::General,
                context,
                "Dataset has no feature references",
                "Add features to the dataset definition.",
            )
            .into());
        };
        let spine_table = self.readable_table(spine_table_name)?;
        let spine_timestamp = spine_table.timestamp_column();

        let spine = match spine {
            Some(spine) => spine,
            None => self.implicit_spine(spine_table, &context, start, end).await?,
        };

        let mut inputs = Vec::with_capacity(table_names.len());
        for name in &table_names {
            let table = self.readable_table(name)?;
            let mut data = self.read_table_data(table, &context).await?;

            // Qualified names keep same-named features of different tables apart
            let mut columns = Vec::new();
            for feature in features.iter().filter(|f| f.table == *name) {
                let qualified = feature.qualified_name();
                if !columns.contains(&qualified) {
                    data.rename_column(&feature.name, &qualified)?;
                    columns.push(qualified);
                }
            }

            inputs.push(FeatureTableData {
                name: table.name().to_string(),
                data,
                entity_keys: table.join_keys().to_vec(),
                timestamp_column: table.timestamp_column().to_string(),
                feature_columns: columns,
                ttl: table.ttl(),
            });
        }

        let joined = pit_join(&spine, &inputs, spine_timestamp)?;

        let mut output: Vec<Column> = spine.columns().to_vec();
        for feature in &features {
            let mut column = joined.require(&feature.qualified_name())?.clone();
            column.name = feature.output_name(dataset.prefix_features);
            output.push(column);
        }
        let result = Frame::new(output)?;

        tracing::info!(
            "Read {} row(s) for dataset '{}' from {} table(s)",
            result.num_rows(),
            dataset.name,
            table_names.len()
        );
        Ok(result)
    }

    async fn implicit_spine(
        &self,
        table: ReadableTable<'_>,
        context: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Frame> {
        let Some(ts_column) = table.timestamp_field() else {
            return Err(StructuredError::new(
                ErrorKind::General,
                context,
                format!("Spine table '{}' has no timestamp_field", table.name()),
                "Set timestamp_field on the table definition, or provide an explicit spine.",
            )
            .into());
        };
        let data = self.read_table_data(table, context).await?;

        let mask: Vec<bool> = data
            .require(ts_column)?
            .values
            .iter()
            .map(|v| v.to_timestamp().is_some_and(|ts| ts >= start && ts < end))
            .collect();

        let mut columns: Vec<&str> = table.join_keys().iter().map(String::as_str).collect();
        columns.push(ts_column);
        Ok(data.filter(&mask).select(&columns)?)
    }

    async fn read_table_data(&self, table: ReadableTable<'_>, context: &str) -> Result<Frame> {
        match table {
            ReadableTable::Feature(t) => self.read_built(&t.name, context).await,
            ReadableTable::Source(t) => {
                tracing::debug!("Reading source table '{}' from its source", t.name);
                Ok(load_source(&*self.backend, t.source.config_for(false)).await?)
            }
        }
    }

    async fn read_built(&self, name: &str, context: &str) -> Result<Frame> {
        if !self.backend.table_exists(name).await? {
            return Err(StructuredError::table_not_built(context, name).into());
        }
        Ok(self.backend.read_table(name, None).await?)
    }

    /// Classify how a rebuild of `table_name` would change its materialized schema
    pub async fn preview_schema_changes(&self, table_name: &str) -> Result<SchemaEvolutionResult> {
        let table = self.table(table_name)?;

        let mut conn = self.backend.connect().await?;
        self.engine.register_table_source(&mut conn, table, false).await?;
        let compiled = self.compiler.compile_table(table, None)?;
        let new_schema = self.backend.execute(&conn, &compiled).await?.schema();

        let old_schema = if self.backend.table_exists(table_name).await? {
            Some(self.backend.read_table(table_name, None).await?.schema())
        } else {
            None
        };

        let result = detect_schema_changes(old_schema.as_ref(), &new_schema);
        tracing::debug!(
            "Schema preview for '{}': {} change(s), action {:?}",
            table_name,
            result.changes.len(),
            result.action
        );
        Ok(result)
    }

    /// Freshness of every table against its SLA, from the latest successful builds
    pub async fn freshness(&self, now: DateTime<Utc>) -> Result<FreshnessResult> {
        let mut latest = HashMap::new();
        if let Some(registry) = &self.registry {
            for table in &self.tables {
                if let Some(record) = registry.latest_successful_build(&table.name).await? {
                    latest.insert(table.name.clone(), record);
                }
            }
        } else {
            tracing::warn!("No registry configured; every table reports unknown freshness");
        }
        Ok(check_freshness(&self.tables, &latest, now))
    }
}
