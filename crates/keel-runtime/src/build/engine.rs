//! Build engine
//!
//! Materializes feature tables in dependency order. Each table is compiled,
//! executed, validated and written; a failure marks the table and every
//! table downstream of it, while unrelated tables keep building.

use chrono::{DateTime, Utc};
use keel_compiler::{DateRange, TableCompiler};
use keel_core::{FeatureTable, Frame, SourceTable, StructuredError, TableSource, WriteMode};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use super::{BuildOptions, BuildResult, BuildStatus, TableBuildResult};
use crate::backend::{Backend, Connection};
use crate::dag::Dag;
use crate::error::{Result, RuntimeError};
use crate::quality::{QualityValidator, TableValidationResult};
use crate::registry::{BuildRecord, BuildRegistry, QualityResultRecord};

/// Outcome of one attempted table build, with the data it produced
struct TableOutcome {
    result: TableBuildResult,
    data: Option<Frame>,
}

/// Orchestrates compiler, validator, backend and registry for a build run
pub struct BuildEngine {
    backend: Arc<dyn Backend>,
    compiler: Arc<dyn TableCompiler>,
    validator: Arc<dyn QualityValidator>,
    registry: Option<Arc<dyn BuildRegistry>>,
    source_tables: HashMap<String, SourceTable>,
}

impl BuildEngine {
    pub fn new(
        backend: Arc<dyn Backend>,
        compiler: Arc<dyn TableCompiler>,
        validator: Arc<dyn QualityValidator>,
    ) -> Self {
        Self {
            backend,
            compiler,
            validator,
            registry: None,
            source_tables: HashMap::new(),
        }
    }

    /// Persist build and quality records to `registry`
    pub fn with_registry(mut self, registry: Arc<dyn BuildRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn QualityValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Source tables feature tables may read from
    pub fn with_source_tables(mut self, source_tables: Vec<SourceTable>) -> Self {
        self.source_tables
            .extend(source_tables.into_iter().map(|t| (t.name.clone(), t)));
        self
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Build `tables` in dependency order.
    ///
    /// Only structural problems (a cycle, an unknown target, an invalid date
    /// range) return an error. Per-table failures are reported in the result.
    pub async fn build(&self, tables: &[FeatureTable], options: &BuildOptions) -> Result<BuildResult> {
        options.validate()?;

        let dag = Dag::from_tables(tables);
        let full_order = dag.topological_sort()?;
        let build_names = if options.targets.is_empty() {
            full_order
        } else {
            let mut names: Vec<String> = Vec::new();
            for target in &options.targets {
                if !dag.contains(target) {
                    return Err(StructuredError::unknown_target(target, &dag.table_names()).into());
                }
                for name in dag.get_upstream(target, true)? {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
            names
        };

        let run_id = Uuid::new_v4();
        tracing::info!(
            "Starting build {} for {} table(s): {}",
            run_id,
            build_names.len(),
            build_names.join(", ")
        );

        let mut conn = self.backend.connect().await?;
        let mut result = BuildResult::new(run_id);
        let mut failed: HashSet<String> = HashSet::new();

        for name in &build_names {
            let table = dag.get_table(name)?;

            let upstream_failed: Vec<String> = dag
                .get_upstream(name, false)?
                .into_iter()
                .filter(|dep| failed.contains(dep))
                .collect();
            if !upstream_failed.is_empty() {
                let message = format!("Upstream table(s) failed: {}", upstream_failed.join(", "));
                tracing::warn!("Skipping '{}': {}", name, message);
                failed.insert(name.clone());
                let skipped = TableBuildResult::skipped(name.clone(), message);
                self.persist_build_record(run_id, table, &skipped, None).await;
                result.tables.push(skipped);
                continue;
            }

            let outcome = self.build_table(&mut conn, table, options, run_id).await;
            if outcome.result.status != BuildStatus::Success {
                failed.insert(name.clone());
            }
            self.persist_build_record(run_id, table, &outcome.result, outcome.data.as_ref())
                .await;
            result.tables.push(outcome.result);
        }

        tracing::info!(
            "Build {} finished: {} succeeded, {} failed, {} skipped",
            run_id,
            result.success_count(),
            result.failed_count(),
            result.skipped_count()
        );
        Ok(result)
    }

    async fn build_table(
        &self,
        conn: &mut Connection,
        table: &FeatureTable,
        options: &BuildOptions,
        run_id: Uuid,
    ) -> TableOutcome {
        let started = Instant::now();
        match self.try_build_table(conn, table, options, run_id, started).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Build failed for '{}': {}", table.name, e);
                TableOutcome {
                    result: TableBuildResult::failed(table.name.clone(), e.to_string(), elapsed_ms(started)),
                    data: None,
                }
            }
        }
    }

    async fn try_build_table(
        &self,
        conn: &mut Connection,
        table: &FeatureTable,
        options: &BuildOptions,
        run_id: Uuid,
        started: Instant,
    ) -> Result<TableOutcome> {
        let range = options.date_range();

        self.register_table_source(conn, table, range.is_some()).await?;

        let compiled = self.compiler.compile_table(table, range.as_ref())?;
        let data = self.backend.execute(conn, &compiled).await?;

        let mut validated = None;
        let mut warning_count = 0;
        if !options.skip_quality {
            let validation = self.validator.validate_table(table, &data)?;
            validated = Some(validation.passed);
            warning_count = validation.warning_count();
            self.persist_quality_result(run_id, &validation).await;

            if !validation.passed {
                let message = validation.failure_message(self.validator.override_hint());
                tracing::error!("Validation failed for '{}': {}", table.name, message);
                return Ok(TableOutcome {
                    result: TableBuildResult {
                        table_name: table.name.clone(),
                        status: BuildStatus::Failed,
                        error: Some(message),
                        row_count: Some(data.num_rows()),
                        duration_ms: Some(elapsed_ms(started)),
                        validated,
                        warning_count,
                    },
                    data: Some(data),
                });
            }
            if validation.has_warnings {
                tracing::warn!(
                    "Validation passed with {} warning(s) for '{}'",
                    warning_count,
                    table.name
                );
            }
        }

        self.write(table, &data, options, range.as_ref()).await?;

        let row_count = data.num_rows();
        let duration_ms = elapsed_ms(started);
        tracing::info!("Built '{}': {} row(s) in {:.1}ms", table.name, row_count, duration_ms);

        Ok(TableOutcome {
            result: TableBuildResult {
                table_name: table.name.clone(),
                status: BuildStatus::Success,
                error: None,
                row_count: Some(row_count),
                duration_ms: Some(duration_ms),
                validated,
                warning_count,
            },
            data: Some(data),
        })
    }

    /// Register what `table` reads from on `conn`.
    ///
    /// Upstream feature tables are already materialized. A source table is
    /// registered under its own name, and one the engine was not given is
    /// expected to exist as a backend table of that name.
    pub async fn register_table_source(
        &self,
        conn: &mut Connection,
        table: &FeatureTable,
        backfill: bool,
    ) -> Result<()> {
        match &table.source {
            TableSource::External(source) => {
                let config = source.config_for(backfill);
                self.backend.register_source(conn, source.name(), config).await
            }
            TableSource::SourceTable(name) => match self.source_tables.get(name) {
                Some(source_table) => {
                    let config = source_table.source.config_for(backfill);
                    self.backend.register_source(conn, name, config).await
                }
                None => {
                    tracing::debug!("Source table '{}' not registered, reading backend table", name);
                    Ok(())
                }
            },
            TableSource::Upstream(_) => Ok(()),
        }
    }

    /// Full refresh beats a backfill range, which beats the table's write mode.
    async fn write(
        &self,
        table: &FeatureTable,
        data: &Frame,
        options: &BuildOptions,
        range: Option<&DateRange>,
    ) -> Result<()> {
        if options.full_refresh {
            tracing::debug!("Full refresh of '{}': drop and overwrite", table.name);
            self.backend.drop_table(&table.name).await?;
            return self
                .backend
                .write_table(&table.name, data, WriteMode::Overwrite, None)
                .await;
        }

        if let Some(range) = range {
            let partition_col = table.timestamp_field.as_deref().ok_or_else(|| {
                RuntimeError::InvalidOperation(format!(
                    "Cannot backfill table '{}': a date range requires a timestamp_field",
                    table.name
                ))
            })?;
            tracing::debug!(
                "Backfill of '{}': replace [{}, {})",
                table.name,
                range.start,
                range.end
            );
            self.backend
                .delete_range(&table.name, partition_col, range.start, range.end)
                .await?;
            return self
                .backend
                .write_table(&table.name, data, WriteMode::Append, None)
                .await;
        }

        let merge_keys = match table.write_mode {
            WriteMode::Merge => Some(table.effective_merge_keys()),
            _ => None,
        };
        tracing::debug!("Writing '{}' with mode {}", table.name, table.write_mode);
        self.backend
            .write_table(&table.name, data, table.write_mode, merge_keys)
            .await
    }

    async fn persist_quality_result(&self, run_id: Uuid, validation: &TableValidationResult) {
        let Some(registry) = &self.registry else {
            return;
        };
        let results_json = match validation.results_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(
                    "Could not serialize quality result for '{}': {}",
                    validation.table_name,
                    e
                );
                return;
            }
        };
        let record = QualityResultRecord {
            run_id,
            timestamp: Utc::now(),
            table_name: validation.table_name.clone(),
            passed: validation.passed,
            has_warnings: validation.has_warnings,
            rows_checked: validation.rows_checked,
            results_json,
        };
        if let Err(e) = registry.put_quality_result(record).await {
            tracing::warn!(
                "Could not save quality result for '{}': {}",
                validation.table_name,
                e
            );
        }
    }

    async fn persist_build_record(
        &self,
        run_id: Uuid,
        table: &FeatureTable,
        result: &TableBuildResult,
        data: Option<&Frame>,
    ) {
        let Some(registry) = &self.registry else {
            return;
        };
        let data_timestamp_max = match (data, table.timestamp_field.as_deref()) {
            (Some(data), Some(field)) => max_timestamp(data, field),
            _ => None,
        };
        let record = BuildRecord {
            run_id,
            timestamp: Utc::now(),
            table_name: table.name.clone(),
            status: result.status,
            row_count: result.row_count,
            duration_ms: result.duration_ms,
            data_timestamp_max,
        };
        if let Err(e) = registry.put_build_record(record).await {
            tracing::warn!("Could not save build record for '{}': {}", table.name, e);
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Newest value of `column`, if present and timestamp-like
fn max_timestamp(data: &Frame, column: &str) -> Option<DateTime<Utc>> {
    data.column(column)?.max()?.to_timestamp()
}
