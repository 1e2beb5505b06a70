//! Feature references and datasets

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{CoreError, Result};

/// Reference to one feature of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub table: String,
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
}

impl Feature {
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// `table__feature`
    pub fn qualified_name(&self) -> String {
        format!("{}__{}", self.table, self.name)
    }

    /// Column name this feature gets in a dataset read
    pub fn output_name(&self, prefix: bool) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None if prefix => self.qualified_name(),
            None => self.name.clone(),
        }
    }
}

/// A named selection of features read together, optionally with a label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub features: Vec<Feature>,
    #[serde(default)]
    pub label: Option<Feature>,
    #[serde(default)]
    pub prefix_features: bool,
}

impl Dataset {
    pub fn new(name: impl Into<String>, features: Vec<Feature>) -> Self {
        Self {
            name: name.into(),
            description: None,
            features,
            label: None,
            prefix_features: false,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_label(mut self, label: Feature) -> Self {
        self.label = Some(label);
        self
    }

    pub fn with_prefix_features(mut self, prefix: bool) -> Self {
        self.prefix_features = prefix;
        self
    }

    /// Features followed by the label when it is not already among them
    pub fn all_features(&self) -> Vec<&Feature> {
        let mut all: Vec<&Feature> = self.features.iter().collect();
        if let Some(label) = &self.label {
            if !self
                .features
                .iter()
                .any(|f| f.table == label.table && f.name == label.name)
            {
                all.push(label);
            }
        }
        all
    }

    /// Tables referenced, in first-reference order
    pub fn tables(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.all_features()
            .into_iter()
            .map(|f| f.table.as_str())
            .filter(|t| seen.insert(*t))
            .collect()
    }

    pub fn output_columns(&self) -> Vec<String> {
        self.all_features()
            .into_iter()
            .map(|f| f.output_name(self.prefix_features))
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.features.is_empty() {
            return Err(CoreError::InvalidDefinition(format!(
                "dataset '{}' has no features",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for column in self.output_columns() {
            if !seen.insert(column.clone()) {
                return Err(CoreError::InvalidDefinition(format!(
                    "dataset '{}' produces column '{}' more than once; use an alias or prefix_features",
                    self.name, column
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_names() {
        let f = Feature::new("user_stats", "spend");
        assert_eq!(f.output_name(false), "spend");
        assert_eq!(f.output_name(true), "user_stats__spend");
        assert_eq!(f.clone().with_alias("s").output_name(true), "s");
    }

    #[test]
    fn test_duplicate_output_columns_rejected() {
        let ds = Dataset::new(
            "training",
            vec![Feature::new("a", "spend"), Feature::new("b", "spend")],
        );
        assert!(ds.validate().is_err());
        assert!(ds.with_prefix_features(true).validate().is_ok());
    }

    #[test]
    fn test_label_included_once() {
        let ds = Dataset::new("training", vec![Feature::new("a", "x")])
            .with_label(Feature::new("labels", "is_fraud"));
        assert_eq!(ds.tables(), vec!["a", "labels"]);
        assert_eq!(ds.output_columns(), vec!["x", "is_fraud"]);
    }
}
