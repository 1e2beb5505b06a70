//! Source table definitions
//!
//! A [`SourceTable`] exposes raw source columns as features without a build
//! step. Datasets read it straight from its source, and feature tables can
//! name it as their input.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::dataset::Feature;
use crate::entity::Entity;
use crate::error::{CoreError, Result};
use crate::field::Field;
use crate::source::SourceKind;
use crate::table::ColumnField;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceTable {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub source: SourceKind,
    pub entity: Entity,
    #[serde(default)]
    pub timestamp_field: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Source columns exposed as features
    #[serde(default)]
    pub columns: Vec<ColumnField>,
}

impl SourceTable {
    pub fn new(name: impl Into<String>, source: SourceKind, entity: Entity) -> Self {
        Self {
            name: name.into(),
            description: None,
            source,
            entity,
            timestamp_field: None,
            owner: None,
            tags: Vec::new(),
            columns: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_timestamp_field(mut self, field: impl Into<String>) -> Self {
        self.timestamp_field = Some(field.into());
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

    pub fn with_column(mut self, name: impl Into<String>, field: Field) -> Self {
        self.columns.push(ColumnField {
            name: name.into(),
            field,
        });
        self
    }

    /// Declared timestamp field, falling back to the source's
    pub fn effective_timestamp_field(&self) -> Option<&str> {
        self.timestamp_field
            .as_deref()
            .or_else(|| self.source.timestamp_field())
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.source.ttl()
    }

    pub fn feature_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn fields(&self) -> Vec<(&str, &Field)> {
        self.columns.iter().map(|c| (c.name.as_str(), &c.field)).collect()
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
                "source table name must not be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for name in self.feature_names() {
            if !seen.insert(name) {
                return Err(CoreError::InvalidDefinition(format!(
                    "source table '{}' declares feature '{}' more than once",
                    self.name, name
                )));
            }
        }
        Ok(())
    }
}
