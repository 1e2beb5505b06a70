//! Dependency graph over feature tables
//!
//! Nodes live in an arena and refer to each other by index. A table whose
//! source is another feature table gets an upstream edge to it; the matching
//! downstream edge is recorded on the upstream node. Edges to tables that are
//! not registered are remembered by name and linked when the table arrives.

use keel_core::{FeatureTable, StructuredError};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

use crate::error::Result;

/// Stable index of a node in the arena
pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct DagNode {
    table: FeatureTable,
    upstream: Vec<NodeId>,
    downstream: Vec<NodeId>,
}

impl DagNode {
    pub fn table(&self) -> &FeatureTable {
        &self.table
    }

    pub fn name(&self) -> &str {
        &self.table.name
    }
}

/// Feature table dependency graph
#[derive(Debug, Clone, Default)]
pub struct Dag {
    nodes: Vec<DagNode>,
    index: HashMap<String, NodeId>,
}

impl Dag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a set of tables
    pub fn from_tables<'a>(tables: impl IntoIterator<Item = &'a FeatureTable>) -> Self {
        let mut dag = Self::new();
        dag.add_tables(tables);
        dag
    }

    /// Register a table. Re-registering a name replaces its definition.
    pub fn add_table(&mut self, table: &FeatureTable) {
        match self.index.get(&table.name) {
            Some(&id) => {
                self.nodes[id].table = table.clone();
                self.reconcile();
            }
            None => {
                let id = self.nodes.len();
                self.nodes.push(DagNode {
                    table: table.clone(),
                    upstream: Vec::new(),
                    downstream: Vec::new(),
                });
                self.index.insert(table.name.clone(), id);
                self.link(id);
                // tables added earlier may be waiting on this one
                let waiting: Vec<NodeId> = self
                    .nodes
                    .iter()
                    .enumerate()
                    .filter(|(other, n)| *other != id && n.table.upstream() == Some(table.name.as_str()))
                    .map(|(other, _)| other)
                    .collect();
                for other in waiting {
                    self.link(other);
                }
            }
        }
        debug!(table = %table.name, "Registered table in DAG");
    }

    /// Register several tables, then rebuild every edge list
    pub fn add_tables<'a>(&mut self, tables: impl IntoIterator<Item = &'a FeatureTable>) {
        for table in tables {
            self.add_table(table);
        }
        self.reconcile();
    }

    fn link(&mut self, id: NodeId) {
        let Some(upstream_name) = self.nodes[id].table.upstream() else {
            return;
        };
        let Some(&up) = self.index.get(upstream_name) else {
            return;
        };
        if !self.nodes[id].upstream.contains(&up) {
            self.nodes[id].upstream.push(up);
        }
        if !self.nodes[up].downstream.contains(&id) {
            self.nodes[up].downstream.push(id);
        }
    }

    /// Recompute all adjacency lists from the table definitions
    fn reconcile(&mut self) {
        for node in &mut self.nodes {
            node.upstream.clear();
            node.downstream.clear();
        }
        for id in 0..self.nodes.len() {
            self.link(id);
        }
    }

    fn id(&self, name: &str, operation: impl FnOnce() -> String) -> Result<NodeId> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| StructuredError::table_not_found(operation(), name).into())
    }

    fn name_of(&self, id: NodeId) -> &str {
        &self.nodes[id].table.name
    }

    /// Kahn's algorithm; ready nodes are taken in name order.
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        let mut in_degree: Vec<usize> = self.nodes.iter().map(|n| n.upstream.len()).collect();
        let mut ready: BTreeSet<&str> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(id, _)| in_degree[*id] == 0)
            .map(|(_, n)| n.name())
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(name) = ready.pop_first() {
            let id = self.index[name];
            order.push(name.to_string());
            for &down in &self.nodes[id].downstream {
                in_degree[down] -= 1;
                if in_degree[down] == 0 {
                    ready.insert(self.name_of(down));
                }
            }
        }

        if order.len() != self.nodes.len() {
            let done: HashSet<&str> = order.iter().map(String::as_str).collect();
            let remaining: Vec<String> = self
                .nodes
                .iter()
                .map(|n| n.name())
                .filter(|n| !done.contains(n))
                .map(String::from)
                .collect();
            return Err(StructuredError::dependency_cycle(&remaining).into());
        }
        Ok(order)
    }

    /// Ancestors of `name`, root-most first, ending with `name` itself
    /// when `include_self` is set.
    pub fn get_upstream(&self, name: &str, include_self: bool) -> Result<Vec<String>> {
        let id = self.id(name, || format!("Getting dependencies for '{}'", name))?;
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        self.visit_upstream(id, &mut visited, &mut out);
        if !include_self {
            out.retain(|&n| n != id);
        }
        Ok(out.into_iter().map(|n| self.name_of(n).to_string()).collect())
    }

    fn visit_upstream(&self, id: NodeId, visited: &mut HashSet<NodeId>, out: &mut Vec<NodeId>) {
        if !visited.insert(id) {
            return;
        }
        for &up in &self.nodes[id].upstream {
            self.visit_upstream(up, visited, out);
        }
        out.push(id);
    }

    /// Descendants of `name` in pre-order, starting with `name` itself
    /// when `include_self` is set. Siblings are visited in name order.
    pub fn get_downstream(&self, name: &str, include_self: bool) -> Result<Vec<String>> {
        let id = self.id(name, || format!("Getting dependents for '{}'", name))?;
        let mut visited = HashSet::new();
        let mut out = Vec::new();
        self.visit_downstream(id, &mut visited, &mut out);
        if !include_self {
            out.retain(|&n| n != id);
        }
        Ok(out.into_iter().map(|n| self.name_of(n).to_string()).collect())
    }

    fn visit_downstream(&self, id: NodeId, visited: &mut HashSet<NodeId>, out: &mut Vec<NodeId>) {
        if !visited.insert(id) {
            return;
        }
        out.push(id);
        let mut children = self.nodes[id].downstream.clone();
        children.sort_by(|a, b| self.name_of(*a).cmp(self.name_of(*b)));
        for down in children {
            self.visit_downstream(down, visited, out);
        }
    }

    pub fn get_table(&self, name: &str) -> Result<&FeatureTable> {
        let id = self.id(name, || format!("Getting table '{}'", name))?;
        Ok(&self.nodes[id].table)
    }

    /// Direct upstream table names of `name`
    pub fn upstream_of(&self, name: &str) -> Result<Vec<&str>> {
        let id = self.id(name, || format!("Getting dependencies for '{}'", name))?;
        Ok(self.nodes[id].upstream.iter().map(|&n| self.name_of(n)).collect())
    }

    /// Direct downstream table names of `name`
    pub fn downstream_of(&self, name: &str) -> Result<Vec<&str>> {
        let id = self.id(name, || format!("Getting dependents for '{}'", name))?;
        Ok(self.nodes[id].downstream.iter().map(|&n| self.name_of(n)).collect())
    }

    pub fn nodes(&self) -> &[DagNode] {
        &self.nodes
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.index.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
