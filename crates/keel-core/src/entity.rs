//! Entities: named join key sets

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// A real-world object identified by one or more join key columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EntityDef")]
pub struct Entity {
    name: String,
    join_keys: Vec<String>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct EntityDef {
    name: String,
    join_keys: Vec<String>,
    #[serde(default)]
    description: Option<String>,
}

impl TryFrom<EntityDef> for Entity {
    type Error = CoreError;

    fn try_from(def: EntityDef) -> Result<Self> {
        let entity = Entity::new(def.name, def.join_keys)?;
        Ok(match def.description {
            Some(d) => entity.with_description(d),
            None => entity,
        })
    }
}

impl Entity {
    pub fn new<S: Into<String>>(name: impl Into<String>, join_keys: Vec<S>) -> Result<Self> {
        let name = name.into();
        let join_keys: Vec<String> = join_keys.into_iter().map(Into::into).collect();
        if join_keys.is_empty() {
            return Err(CoreError::InvalidDefinition(format!(
                "entity '{}' must declare at least one join key",
                name
            )));
        }
        Ok(Self {
            name,
            join_keys,
            description: None,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn join_keys(&self) -> &[String] {
        &self.join_keys
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_join_keys_rejected() {
        assert!(Entity::new("user", Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Entity = serde_json::from_str(r#"{"name":"user","join_keys":["user_id"]}"#).unwrap();
        assert_eq!(ok.join_keys(), ["user_id".to_string()]);
        let bad = serde_json::from_str::<Entity>(r#"{"name":"user","join_keys":[]}"#);
        assert!(bad.is_err());
    }
}
