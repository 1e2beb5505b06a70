//! Project configuration
//!
//! A project is described by a `keel.yaml` file:
//!
//! ```yaml
//! name: fraud-features
//! default_env: dev
//! schedules: [hourly, daily]
//! environments:
//!   dev:
//!     backend:
//!       kind: memory
//!     registry:
//!       kind: memory
//!     build:
//!       skip_quality: false
//!       quality_seed: 42
//! ```

use anyhow::Context;
use keel_core::{FeatureTable, StructuredError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, SdkError};

/// Environment variable selecting the active environment
pub const ENV_VAR: &str = "KEEL_ENV";

/// Top-level project configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,

    /// Environment used when none is requested
    pub default_env: String,

    /// Allowed schedule tags; empty allows any
    #[serde(default)]
    pub schedules: Vec<String>,

    pub environments: BTreeMap<String, EnvironmentConfig>,
}

/// Per-environment collaborators and build defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub build: BuildDefaults,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    #[default]
    Memory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistryConfig {
    /// Build and quality records are not kept
    None,
    #[default]
    Memory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildDefaults {
    #[serde(default)]
    pub skip_quality: bool,

    /// Seed for quality-check row sampling
    #[serde(default)]
    pub quality_seed: Option<u64>,
}

impl ProjectConfig {
    /// Single-environment configuration with in-memory collaborators
    pub fn new(name: impl Into<String>) -> Self {
        let mut environments = BTreeMap::new();
        environments.insert("dev".to_string(), EnvironmentConfig::default());
        Self {
            name: name.into(),
            default_env: "dev".to_string(),
            schedules: Vec::new(),
            environments,
        }
    }

    pub fn with_environment(mut self, name: impl Into<String>, env: EnvironmentConfig) -> Self {
        self.environments.insert(name.into(), env);
        self
    }

    pub fn with_schedules<S: Into<String>>(mut self, schedules: Vec<S>) -> Self {
        self.schedules = schedules.into_iter().map(Into::into).collect();
        self
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: ProjectConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a project file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        tracing::debug!("Loading project config from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read project config: {}", path.display()))?;

        Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid project config: {}", path.display()))
    }

    /// `default_env` must name a configured environment
    pub fn validate(&self) -> Result<()> {
        if !self.environments.contains_key(&self.default_env) {
            return Err(SdkError::Config(format!(
                "default_env '{}' not found in environments: {}",
                self.default_env,
                self.environment_names().join(", ")
            )));
        }
        Ok(())
    }

    pub fn environment_names(&self) -> Vec<String> {
        self.environments.keys().cloned().collect()
    }

    /// Pick the active environment: `requested`, then `KEEL_ENV`, then `default_env`.
    pub fn resolve_environment(&self, requested: Option<&str>) -> Result<(String, &EnvironmentConfig)> {
        let from_env = std::env::var(ENV_VAR).ok().filter(|v| !v.is_empty());
        let name = requested
            .map(str::to_string)
            .or(from_env)
            .unwrap_or_else(|| self.default_env.clone());

        match self.environments.get(&name) {
            Some(env) => Ok((name, env)),
            None => Err(StructuredError::environment_not_found(&name, &self.environment_names()).into()),
        }
    }

    /// Every table's schedule tag must be an allowed schedule
    pub fn validate_schedules(&self, tables: &[FeatureTable]) -> Result<()> {
        if self.schedules.is_empty() {
            return Ok(());
        }
        for table in tables {
            if let Some(schedule) = &table.schedule {
                if !self.schedules.contains(schedule) {
                    return Err(
                        StructuredError::invalid_schedule(&table.name, schedule, &self.schedules).into(),
                    );
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_core::{Entity, SourceConfig, SourceKind, TableSource};

    const YAML: &str = r#"
name: fraud-features
default_env: dev
schedules: [hourly, daily]
environments:
  dev:
    backend:
      kind: memory
  ci:
    registry:
      kind: none
    build:
      skip_quality: true
      quality_seed: 7
"#;

    fn table(schedule: &str) -> FeatureTable {
        FeatureTable::new(
            "t",
            TableSource::External(SourceKind::batch(
                "s",
                SourceConfig::Table {
                    name: "s".to_string(),
                },
            )),
            Entity::new("user", vec!["user_id"]).unwrap(),
        )
        .with_schedule(schedule)
    }

    #[test]
    fn test_parse_yaml() {
        let config = ProjectConfig::from_yaml_str(YAML).unwrap();
        assert_eq!(config.name, "fraud-features");
        assert_eq!(config.environment_names(), vec!["ci", "dev"]);

        let ci = &config.environments["ci"];
        assert_eq!(ci.backend, BackendConfig::Memory);
        assert_eq!(ci.registry, RegistryConfig::None);
        assert!(ci.build.skip_quality);
        assert_eq!(ci.build.quality_seed, Some(7));
        assert_eq!(config.environments["dev"].registry, RegistryConfig::Memory);
    }

    #[test]
    fn test_default_env_must_exist() {
        let yaml = "name: x\ndefault_env: prod\nenvironments:\n  dev: {}\n";
        let err = ProjectConfig::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("default_env 'prod'"));
    }

    #[test]
    fn test_explicit_environment_wins() {
        let config = ProjectConfig::from_yaml_str(YAML).unwrap();
        let (name, env) = config.resolve_environment(Some("ci")).unwrap();
        assert_eq!(name, "ci");
        assert!(env.build.skip_quality);
    }

    #[test]
    fn test_unknown_environment() {
        let config = ProjectConfig::from_yaml_str(YAML).unwrap();
        let err = config.resolve_environment(Some("prod")).unwrap_err();
        let structured = err.structured().unwrap();
        assert!(structured.fix.contains("ci, dev"));
    }

    #[test]
    fn test_schedules() {
        let config = ProjectConfig::from_yaml_str(YAML).unwrap();
        assert!(config.validate_schedules(&[table("daily")]).is_ok());

        let err = config.validate_schedules(&[table("weekly")]).unwrap_err();
        assert!(err.to_string().contains("weekly"));

        let open = ProjectConfig::new("x");
        assert!(open.validate_schedules(&[table("weekly")]).is_ok());
    }
}
