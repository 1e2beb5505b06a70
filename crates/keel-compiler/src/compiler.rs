//! Feature table compiler
//!
//! Turns a [`FeatureTable`] definition into a [`CompiledQuery`]: a plan the
//! backend can run, the SQL rendering of that plan, and the tables it reads.

use keel_core::FeatureTable;

use crate::error::{CompileError, Result};
use crate::eval::ConstantFolder;
use crate::plan::{
    AggregateSpec, AggregationStep, CompiledQuery, DateFilter, DateRange, DerivedColumn, QueryPlan,
};

/// Compiles feature tables into executable queries
pub trait TableCompiler: Send + Sync {
    /// Compile `table`. A date range restricts the raw timestamp column
    /// before any aggregation runs.
    fn compile_table(&self, table: &FeatureTable, date_range: Option<&DateRange>) -> Result<CompiledQuery>;
}

/// Compiler options
#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// Fold literal-only subexpressions of derived features
    pub enable_constant_folding: bool,
    /// Render the SQL text of each plan
    pub render_sql: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            enable_constant_folding: true,
            render_sql: true,
        }
    }
}

/// The default compiler, producing [`QueryPlan`]s
pub struct PlanCompiler {
    options: CompilerOptions,
    constant_folder: ConstantFolder,
}

impl PlanCompiler {
    /// Create a new compiler instance with default options
    pub fn new() -> Self {
        Self::with_options(CompilerOptions::default())
    }

    /// Create a new compiler instance with custom options
    pub fn with_options(options: CompilerOptions) -> Self {
        Self {
            options,
            constant_folder: ConstantFolder::new(),
        }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    fn timestamp_field<'a>(table: &'a FeatureTable, purpose: &str) -> Result<&'a str> {
        table
            .timestamp_field
            .as_deref()
            .ok_or_else(|| CompileError::MissingTimestampField {
                table: table.name.clone(),
                purpose: purpose.to_string(),
            })
    }
}

impl Default for PlanCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl TableCompiler for PlanCompiler {
    fn compile_table(&self, table: &FeatureTable, date_range: Option<&DateRange>) -> Result<CompiledQuery> {
        let mut plan = QueryPlan::scan(table.source_name());

        if let Some(range) = date_range {
            if range.start >= range.end {
                return Err(CompileError::InvalidExpression(format!(
                    "date range start {} is not before end {}",
                    range.start, range.end
                )));
            }
            plan.date_filter = Some(DateFilter {
                column: Self::timestamp_field(table, "a date range")?.to_string(),
                range: *range,
            });
        }

        plan.filters = table.filters.clone();

        if !table.aggregates.is_empty() {
            let timestamp_column = Self::timestamp_field(table, "aggregation")?.to_string();
            plan.aggregation = Some(AggregationStep {
                group_keys: table.entity.join_keys().to_vec(),
                timestamp_column,
                anchor: date_range.map(|r| r.end),
                aggregates: table
                    .aggregates
                    .iter()
                    .map(|a| AggregateSpec {
                        name: a.name.clone(),
                        column: a.column.clone(),
                        function: a.function,
                        window: a.window,
                        dtype: a.field.as_ref().map(|f| f.dtype),
                    })
                    .collect(),
            });
        }

        plan.derived = table
            .derived
            .iter()
            .map(|d| DerivedColumn {
                name: d.name.clone(),
                expr: if self.options.enable_constant_folding {
                    self.constant_folder.fold(&d.expr)
                } else {
                    d.expr.clone()
                },
                dtype: d.field.dtype,
            })
            .collect();

        let sql = if self.options.render_sql {
            plan.to_sql()
        } else {
            String::new()
        };

        Ok(CompiledQuery {
            table_name: table.name.clone(),
            source_tables: vec![plan.source.clone()],
            sql,
            plan,
        })
    }
}
