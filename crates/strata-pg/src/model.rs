//! Catalog model for graph partitions and index reconciliation.
//!
//! Reconciliation is a pure diff between what the catalog reports for a
//! partition and what a graph definition requires. The diff is computed
//! without touching the database so it can be tested in isolation; the
//! schema manager executes the resulting change set.

use std::collections::HashMap;

use strata_core::{Constraint, GraphError, GraphSchema, Index, IndexType, Result};

use crate::sql;

/// A named graph resolved against the catalog: its interned identifier and
/// the two partition tables that hold its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphDescriptor {
    pub id: i32,
    pub name: String,
    pub node_partition: String,
    pub edge_partition: String,
}

impl GraphDescriptor {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        GraphDescriptor {
            id,
            name: name.into(),
            node_partition: sql::partition_name(sql::NODE_TABLE, id),
            edge_partition: sql::partition_name(sql::EDGE_TABLE, id),
        }
    }
}

/// Property indexes observed on one partition table. A `None` type records
/// an index whose access method has no logical equivalent; it never matches
/// a requirement and is rebuilt when one exists under the same name.
#[derive(Debug, Default, Clone)]
pub struct PresentPartition {
    pub indexes: HashMap<String, Option<IndexType>>,
    pub constraints: HashMap<String, Option<IndexType>>,
}

impl PresentPartition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one catalog index definition in. Definitions that do not cover
    /// the property column belong to the base schema and are ignored.
    pub fn observe(&mut self, parsed: &sql::ParsedIndex) {
        if !parsed.fields.contains(sql::PROPERTIES_COLUMN) {
            return;
        }

        let index_type = sql::parse_index_type(&parsed.method);

        if parsed.unique {
            self.constraints.insert(parsed.name.clone(), index_type);
        } else {
            self.indexes.insert(parsed.name.clone(), index_type);
        }
    }
}

/// Indexes and constraints a graph definition requires of its node
/// partition, keyed by index name.
#[derive(Debug, Default, Clone)]
pub struct RequiredPartition {
    pub indexes: HashMap<String, Index>,
    pub constraints: HashMap<String, Constraint>,
}

impl RequiredPartition {
    /// Empty requirement set. Diffing a partition against this removes every
    /// property index it carries.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_graph(partition: &str, graph: &GraphSchema) -> Result<Self> {
        let mut required = RequiredPartition::default();

        for index in &graph.node_indexes {
            let name = index
                .name
                .clone()
                .unwrap_or_else(|| format!("{partition}_{}_index", index.field));
            required.indexes.insert(name, index.clone());
        }

        for constraint in &graph.node_constraints {
            if constraint.index_type == IndexType::FullText {
                return Err(GraphError::SchemaConflict(format!(
                    "full-text constraint on field {} is not expressible as a unique index",
                    constraint.field
                )));
            }

            let name = constraint
                .name
                .clone()
                .unwrap_or_else(|| format!("{partition}_{}_constraint", constraint.field));
            required.constraints.insert(name, constraint.clone());
        }

        Ok(required)
    }
}

/// The work needed to bring one partition in line with its requirements.
/// Removals run before additions so a type change frees the name first.
#[derive(Debug, Default, Clone)]
pub struct IndexChangeSet {
    pub removals: Vec<String>,
    pub index_additions: Vec<(String, Index)>,
    pub constraint_additions: Vec<(String, Constraint)>,
}

impl IndexChangeSet {
    pub fn is_empty(&self) -> bool {
        self.removals.is_empty()
            && self.index_additions.is_empty()
            && self.constraint_additions.is_empty()
    }
}

/// Diff a partition's observed indexes against its requirements.
///
/// Present entries with no requirement are dropped. Required entries with no
/// present counterpart are created. A name present on both sides with a
/// differing index type is dropped and re-created. Output ordering is
/// name-sorted so repeated runs produce identical change sets.
pub fn diff_partition(present: &PresentPartition, required: &RequiredPartition) -> IndexChangeSet {
    let mut changes = IndexChangeSet::default();

    for (name, present_type) in &present.indexes {
        match required.indexes.get(name) {
            None => changes.removals.push(name.clone()),
            Some(index) if Some(index.index_type) != *present_type => {
                changes.removals.push(name.clone());
                changes.index_additions.push((name.clone(), index.clone()));
            }
            Some(_) => {}
        }
    }

    for (name, present_type) in &present.constraints {
        match required.constraints.get(name) {
            None => changes.removals.push(name.clone()),
            Some(constraint) if Some(constraint.index_type) != *present_type => {
                changes.removals.push(name.clone());
                changes
                    .constraint_additions
                    .push((name.clone(), constraint.clone()));
            }
            Some(_) => {}
        }
    }

    for (name, index) in &required.indexes {
        if !present.indexes.contains_key(name) {
            changes.index_additions.push((name.clone(), index.clone()));
        }
    }

    for (name, constraint) in &required.constraints {
        if !present.constraints.contains_key(name) {
            changes
                .constraint_additions
                .push((name.clone(), constraint.clone()));
        }
    }

    changes.removals.sort();
    changes.removals.dedup();
    changes.index_additions.sort_by(|a, b| a.0.cmp(&b.0));
    changes.constraint_additions.sort_by(|a, b| a.0.cmp(&b.0));

    changes
}
