//! Ordered column schemas

use serde::{Deserialize, Serialize};

use super::DataType;

/// A named, typed column in a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub dtype: DataType,
}

/// Ordered list of columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableSchema {
    fields: Vec<SchemaField>,
}

impl TableSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column; replaces the type if the name already exists.
    pub fn with_field(mut self, name: impl Into<String>, dtype: DataType) -> Self {
        self.push(name, dtype);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, dtype: DataType) {
        let name = name.into();
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(field) => field.dtype = dtype,
            None => self.fields.push(SchemaField { name, dtype }),
        }
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<DataType> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.dtype)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, DataType)> for TableSchema {
    fn from_iter<I: IntoIterator<Item = (S, DataType)>>(iter: I) -> Self {
        let mut schema = TableSchema::new();
        for (name, dtype) in iter {
            schema.push(name, dtype);
        }
        schema
    }
}
