//! Declarative schema model: graphs, indexes, and constraints.
//!
//! A [`Schema`] is what a caller wants ensured to exist. Backends reconcile
//! it against their live state: missing kinds are interned, missing graphs
//! are materialized, and index/constraint definitions are diffed by name
//! with removals executing before additions.

use crate::types::{Kind, Kinds};

/// Structural category of an acceleration structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    BTree,
    FullText,
}

impl IndexType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexType::BTree => "btree",
            IndexType::FullText => "fts",
        }
    }
}

/// A non-unique acceleration structure over one property field.
///
/// Identity is (graph, field, category). When `name` is not supplied the
/// backend derives one deterministically so reconciliation stays idempotent.
/// Composite (multi-field) indexes are structurally unsupported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub field: String,
    pub index_type: IndexType,
    pub name: Option<String>,
}

impl Index {
    pub fn new(field: impl Into<String>, index_type: IndexType) -> Self {
        Index {
            field: field.into(),
            index_type,
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A uniqueness guarantee over one property field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub field: String,
    pub index_type: IndexType,
    pub name: Option<String>,
}

impl Constraint {
    pub fn new(field: impl Into<String>, index_type: IndexType) -> Self {
        Constraint {
            field: field.into(),
            index_type,
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A named logical partition of the store and everything it requires:
/// node/edge kinds, indexes, and constraints.
///
/// Graphs are materialized on first reference (partitions created, indexes
/// synchronized), cached thereafter, and never deleted at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSchema {
    pub name: String,
    pub node_kinds: Kinds,
    pub edge_kinds: Kinds,
    pub node_indexes: Vec<Index>,
    pub node_constraints: Vec<Constraint>,
}

impl GraphSchema {
    pub fn new(name: impl Into<String>) -> Self {
        GraphSchema {
            name: name.into(),
            node_kinds: Kinds::new(),
            edge_kinds: Kinds::new(),
            node_indexes: Vec::new(),
            node_constraints: Vec::new(),
        }
    }

    pub fn with_node_kinds<I, K>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Kind>,
    {
        self.node_kinds.extend(kinds.into_iter().map(Into::into));
        self
    }

    pub fn with_edge_kinds<I, K>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Kind>,
    {
        self.edge_kinds.extend(kinds.into_iter().map(Into::into));
        self
    }

    pub fn with_node_index(mut self, index: Index) -> Self {
        self.node_indexes.push(index);
        self
    }

    pub fn with_node_constraint(mut self, constraint: Constraint) -> Self {
        self.node_constraints.push(constraint);
        self
    }
}

/// Ordered collection of graph declarations a caller wants ensured to exist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub graphs: Vec<GraphSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_graph(mut self, graph: GraphSchema) -> Self {
        self.graphs.push(graph);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_schema_builder_collects_requirements() {
        let schema = GraphSchema::new("ad_graph")
            .with_node_kinds(["User", "Computer"])
            .with_edge_kinds(["Contains"])
            .with_node_index(Index::new("name", IndexType::FullText))
            .with_node_constraint(Constraint::new("object_id", IndexType::BTree));

        assert_eq!(schema.name, "ad_graph");
        assert_eq!(schema.node_kinds.len(), 2);
        assert_eq!(schema.edge_kinds, vec![Kind::new("Contains")]);
        assert_eq!(schema.node_indexes[0].index_type, IndexType::FullText);
        assert!(schema.node_constraints[0].name.is_none());
    }
}
