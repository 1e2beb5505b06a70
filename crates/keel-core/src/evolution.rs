//! Schema evolution detection
//!
//! Compares the materialized schema of a table with the schema its definition
//! now produces and decides the cheapest safe migration:
//! - column added: full backfill, history lacks the new column
//! - column removed: continue incrementally, new rows simply omit it
//! - type widened (int32 -> int64, signed int -> float): continue incrementally
//! - type narrowed or any other cross-type change: full backfill

use serde::{Deserialize, Serialize};

use crate::types::{DataType, TableSchema, TypeFamily};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaChangeKind {
    ColumnAdded,
    ColumnRemoved,
    TypeWidened,
    TypeNarrowed,
}

/// Remediation required by a change. Ordered from least to most conservative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationAction {
    None,
    ContinueIncremental,
    FullBackfill,
}

impl SchemaChangeKind {
    pub fn action(&self) -> MigrationAction {
        match self {
            SchemaChangeKind::ColumnAdded | SchemaChangeKind::TypeNarrowed => {
                MigrationAction::FullBackfill
            }
            SchemaChangeKind::ColumnRemoved | SchemaChangeKind::TypeWidened => {
                MigrationAction::ContinueIncremental
            }
        }
    }
}

/// A single detected change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaChange {
    pub kind: SchemaChangeKind,
    pub column: String,
    pub old_type: Option<DataType>,
    pub new_type: Option<DataType>,
    pub action: MigrationAction,
}

impl SchemaChange {
    fn new(
        kind: SchemaChangeKind,
        column: &str,
        old_type: Option<DataType>,
        new_type: Option<DataType>,
    ) -> Self {
        Self {
            kind,
            column: column.to_string(),
            old_type,
            new_type,
            action: kind.action(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaEvolutionResult {
    pub changes: Vec<SchemaChange>,
    pub action: MigrationAction,
}

impl SchemaEvolutionResult {
    pub fn requires_backfill(&self) -> bool {
        self.action == MigrationAction::FullBackfill
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

/// Classify a change between two distinct types. `None` if they are equal.
pub fn classify_type_change(old: DataType, new: DataType) -> Option<SchemaChangeKind> {
    if old == new {
        return None;
    }
    let kind = match (old.family(), new.family()) {
        (a, b) if a == b && old.is_numeric() => {
            if new.bit_width() >= old.bit_width() {
                SchemaChangeKind::TypeWidened
            } else {
                SchemaChangeKind::TypeNarrowed
            }
        }
        (TypeFamily::SignedInt, TypeFamily::Float) => SchemaChangeKind::TypeWidened,
        _ => SchemaChangeKind::TypeNarrowed,
    };
    Some(kind)
}

/// Detect changes from `old` to `new`. A missing old schema means a new table.
///
/// Changes are reported removed columns first, then added columns, then type
/// changes, each group in schema order.
pub fn detect_schema_changes(old: Option<&TableSchema>, new: &TableSchema) -> SchemaEvolutionResult {
    let Some(old) = old else {
        return SchemaEvolutionResult {
            changes: Vec::new(),
            action: MigrationAction::None,
        };
    };

    let mut changes = Vec::new();
    for field in old.fields() {
        if !new.contains(&field.name) {
            changes.push(SchemaChange::new(
                SchemaChangeKind::ColumnRemoved,
                &field.name,
                Some(field.dtype),
                None,
            ));
        }
    }
    for field in new.fields() {
        if !old.contains(&field.name) {
            changes.push(SchemaChange::new(
                SchemaChangeKind::ColumnAdded,
                &field.name,
                None,
                Some(field.dtype),
            ));
        }
    }
    for field in old.fields() {
        let Some(new_type) = new.get(&field.name) else {
            continue;
        };
        if let Some(kind) = classify_type_change(field.dtype, new_type) {
            changes.push(SchemaChange::new(
                kind,
                &field.name,
                Some(field.dtype),
                Some(new_type),
            ));
        }
    }

    let action = changes
        .iter()
        .map(|c| c.action)
        .max()
        .unwrap_or(MigrationAction::None);
    SchemaEvolutionResult { changes, action }
}
