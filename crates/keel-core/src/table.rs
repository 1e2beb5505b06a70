//! Feature table definitions
//!
//! A [`FeatureTable`] is the unit of materialization. Its source is an
//! external data source, a source table, or another feature table; only the
//! last forms an edge in the build DAG.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::dataset::Feature;
use crate::entity::Entity;
use crate::error::{CoreError, Result};
use crate::expr::{AggFunction, FeatureExpr, Filter};
use crate::field::Field;
use crate::sla::Sla;
use crate::source::SourceKind;

/// What a feature table reads from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableSource {
    External(SourceKind),
    /// Name of another feature table
    Upstream(String),
    /// Name of a source table, read as-is without a build step
    SourceTable(String),
}

/// How freshly computed rows are applied to the materialized table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    #[default]
    Append,
    Merge,
    Overwrite,
}

impl std::fmt::Display for WriteMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WriteMode::Append => "append",
            WriteMode::Merge => "merge",
            WriteMode::Overwrite => "overwrite",
        };
        f.write_str(s)
    }
}

/// Windowed aggregate grouped by the entity keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateFeature {
    pub name: String,
    /// Input column
    pub column: String,
    pub function: AggFunction,
    /// Only rows within this distance of the window anchor are aggregated
    #[serde(default, with = "crate::duration::option")]
    pub window: Option<Duration>,
    #[serde(default)]
    pub field: Option<Field>,
}

/// Per-row computed feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeature {
    pub name: String,
    pub expr: FeatureExpr,
    pub field: Field,
}

/// A pass-through column declared for documentation and quality checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnField {
    pub name: String,
    #[serde(flatten)]
    pub field: Field,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub source: TableSource,
    pub entity: Entity,
    #[serde(default)]
    pub timestamp_field: Option<String>,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub write_mode: WriteMode,
    #[serde(default)]
    pub merge_keys: Option<Vec<String>>,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub sla: Option<Sla>,
    /// Percentage of rows sampled by quality checks, 1..=100
    #[serde(default)]
    pub sample_pct: Option<u8>,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub columns: Vec<ColumnField>,
    #[serde(default)]
    pub aggregates: Vec<AggregateFeature>,
    #[serde(default)]
    pub derived: Vec<DerivedFeature>,
}

impl FeatureTable {
    pub fn new(name: impl Into<String>, source: TableSource, entity: Entity) -> Self {
        Self {
            name: name.into(),
            description: None,
            source,
            entity,
            timestamp_field: None,
            schedule: None,
            owner: None,
            tags: Vec::new(),
            write_mode: WriteMode::Append,
            merge_keys: None,
            online: false,
            sla: None,
            sample_pct: None,
            filters: Vec::new(),
            columns: Vec::new(),
            aggregates: Vec::new(),
            derived: Vec::new(),
        }
    }

    /// Table reading from another feature table
    pub fn derived_from(name: impl Into<String>, upstream: impl Into<String>, entity: Entity) -> Self {
        Self::new(name, TableSource::Upstream(upstream.into()), entity)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_timestamp_field(mut self, field: impl Into<String>) -> Self {
        self.timestamp_field = Some(field.into());
        self
    }

    pub fn with_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    pub fn with_merge_keys<S: Into<String>>(mut self, keys: Vec<S>) -> Self {
        self.merge_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_online(mut self, online: bool) -> Self {
        self.online = online;
        self
    }

    pub fn with_sla(mut self, sla: Sla) -> Self {
        self.sla = Some(sla);
        self
    }

    pub fn with_sample_pct(mut self, pct: u8) -> Self {
        self.sample_pct = Some(pct);
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_column(mut self, name: impl Into<String>, field: Field) -> Self {
        self.columns.push(ColumnField {
            name: name.into(),
            field,
        });
        self
    }

    pub fn with_aggregate(
        mut self,
        name: impl Into<String>,
        column: impl Into<String>,
        function: AggFunction,
        window: Option<Duration>,
    ) -> Self {
        self.aggregates.push(AggregateFeature {
            name: name.into(),
            column: column.into(),
            function,
            window,
            field: None,
        });
        self
    }

    /// Attach constraints to the most recently added aggregate
    pub fn with_aggregate_field(mut self, field: Field) -> Self {
        if let Some(last) = self.aggregates.last_mut() {
            last.field = Some(field);
        }
        self
    }

    pub fn with_derived(mut self, name: impl Into<String>, expr: FeatureExpr, field: Field) -> Self {
        self.derived.push(DerivedFeature {
            name: name.into(),
            expr,
            field,
        });
        self
    }

    /// Upstream feature table name, if this table is derived
    pub fn upstream(&self) -> Option<&str> {
        match &self.source {
            TableSource::Upstream(name) => Some(name),
            TableSource::External(_) | TableSource::SourceTable(_) => None,
        }
    }

    /// Name the compiled query reads from
    pub fn source_name(&self) -> &str {
        match &self.source {
            TableSource::Upstream(name) | TableSource::SourceTable(name) => name,
            TableSource::External(source) => source.name(),
        }
    }

    /// Merge keys, defaulting to the entity join keys
    pub fn effective_merge_keys(&self) -> &[String] {
        match &self.merge_keys {
            Some(keys) => keys,
            None => self.entity.join_keys(),
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        match &self.source {
            TableSource::External(source) => source.ttl(),
            TableSource::Upstream(_) | TableSource::SourceTable(_) => None,
        }
    }

    /// Output feature names in declaration order
    pub fn feature_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.aggregates.iter().map(|a| a.name.as_str()))
            .chain(self.derived.iter().map(|d| d.name.as_str()))
            .collect()
    }

    /// Every declared field with its constraints
    pub fn fields(&self) -> Vec<(&str, &Field)> {
        let mut fields: Vec<(&str, &Field)> = self
            .columns
            .iter()
            .map(|c| (c.name.as_str(), &c.field))
            .collect();
        fields.extend(
            self.aggregates
                .iter()
                .filter_map(|a| a.field.as_ref().map(|f| (a.name.as_str(), f))),
        );
        fields.extend(self.derived.iter().map(|d| (d.name.as_str(), &d.field)));
        fields
    }

    /// Reference a feature of this table by name
    pub fn get_feature(&self, name: &str) -> Result<Feature> {
        let names = self.feature_names();
        if names.contains(&name) {
            Ok(Feature::new(self.name.clone(), name))
        } else {
            Err(CoreError::FeatureNotFound {
                table: self.name.clone(),
                feature: name.to_string(),
                available: names.into_iter().map(String::from).collect(),
            })
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CoreError::InvalidDefinition(
                "feature table name must not be empty".to_string(),
            ));
        }
        if let Some(pct) = self.sample_pct {
            if !(1..=100).contains(&pct) {
                return Err(CoreError::InvalidDefinition(format!(
                    "table '{}': sample_pct must be between 1 and 100, got {}",
                    self.name, pct
                )));
            }
        }
        if self.upstream() == Some(self.name.as_str()) {
            return Err(CoreError::InvalidDefinition(format!(
                "table '{}' cannot read from itself",
                self.name
            )));
        }
        if let Some(keys) = &self.merge_keys {
            if keys.is_empty() {
                return Err(CoreError::InvalidDefinition(format!(
                    "table '{}': merge_keys must not be empty when set",
                    self.name
                )));
            }
        }
        if !self.aggregates.is_empty() && self.timestamp_field.is_none() {
            return Err(CoreError::InvalidDefinition(format!(
                "table '{}' declares aggregates but no timestamp_field",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for name in self.feature_names() {
            if !seen.insert(name) {
                return Err(CoreError::InvalidDefinition(format!(
                    "table '{}' declares feature '{}' more than once",
                    self.name, name
                )));
            }
        }
        Ok(())
    }
}
