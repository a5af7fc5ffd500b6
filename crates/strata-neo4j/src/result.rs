//! Row cursor and bolt-shape conversion for the native graph backend.
//!
//! Bolt rows carry structural values (nodes, relationships, paths) that the
//! shared base table cannot recognize, so conversion tries those shapes
//! first and only then delegates to the base coercion table.

use std::collections::VecDeque;

use anyhow::anyhow;
use async_trait::async_trait;

use strata_core::{Cursor, GraphError, Id, Kind, Node, Path, Properties, Relationship, Result, Wire};

pub fn node_from_bolt(node: &neo4rs::Node) -> Node {
    let kinds = node.labels().iter().map(Kind::new).collect();
    Node::new(Id(node.id()), kinds, properties_from_keys(node.keys(), |key| node.get(key)))
}

pub fn relationship_from_bolt(relation: &neo4rs::Relation) -> Relationship {
    Relationship::new(
        Id(relation.id()),
        Id(relation.start_node_id()),
        Id(relation.end_node_id()),
        Kind::new(relation.typ()),
        properties_from_keys(relation.keys(), |key| relation.get(key)),
    )
}

/// Path segments arrive as unbounded relationships with no endpoint ids;
/// the walk order of the flanking nodes supplies them.
pub fn path_from_bolt(path: &neo4rs::Path) -> Result<Path> {
    let nodes: Vec<Node> = path.nodes().iter().map(node_from_bolt).collect();
    let rels = path.rels();

    let mut relationships = Vec::with_capacity(rels.len());
    for (position, relation) in rels.iter().enumerate() {
        let (start, end) = match (nodes.get(position), nodes.get(position + 1)) {
            (Some(start), Some(end)) => (start.id, end.id),
            _ => {
                return Err(GraphError::Backend(anyhow!(
                    "path relationship {position} has no flanking nodes"
                )))
            }
        };

        relationships.push(Relationship::new(
            Id(relation.id()),
            start,
            end,
            Kind::new(relation.typ()),
            properties_from_keys(relation.keys(), |key| relation.get(key)),
        ));
    }

    Ok(Path {
        nodes,
        relationships,
    })
}

/// Extract a property bag, keeping only fields that negotiate into a
/// representable property value.
fn properties_from_keys<'a, F>(keys: Vec<&'a str>, mut get: F) -> Properties
where
    F: FnMut(&'a str) -> std::result::Result<Wire, neo4rs::DeError>,
{
    let mut properties = Properties::new();

    for key in keys {
        if let Ok(wire) = get(key) {
            if let Ok(value) = wire.into_value() {
                properties.set(key, value);
            }
        }
    }

    properties
}

/// Convert one column of a bolt row, trying structural shapes before the
/// shared base table.
pub fn wire_from_row(row: &neo4rs::Row, column: &str) -> Result<Wire> {
    if let Ok(node) = row.get::<neo4rs::Node>(column) {
        return Ok(Wire::Node(node_from_bolt(&node)));
    }

    if let Ok(relation) = row.get::<neo4rs::Relation>(column) {
        return Ok(Wire::Relationship(relationship_from_bolt(&relation)));
    }

    if let Ok(path) = row.get::<neo4rs::Path>(column) {
        return Ok(Wire::Path(path_from_bolt(&path)?));
    }

    row.get::<Wire>(column)
        .map_err(|err| GraphError::Backend(anyhow!("column {column:?} did not convert: {err}")))
}

/// Cursor over the fully-buffered rows of one executed statement.
pub struct Neo4jCursor {
    rows: VecDeque<neo4rs::Row>,
    current: Option<neo4rs::Row>,
}

impl Neo4jCursor {
    pub fn new(rows: Vec<neo4rs::Row>) -> Self {
        Neo4jCursor {
            rows: rows.into(),
            current: None,
        }
    }
}

#[async_trait]
impl Cursor for Neo4jCursor {
    async fn advance(&mut self) -> Result<bool> {
        self.current = self.rows.pop_front();
        Ok(self.current.is_some())
    }

    fn wire(&self, column: &str) -> Result<Wire> {
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| GraphError::Backend(anyhow!("cursor is not positioned on a row")))?;

        wire_from_row(row, column)
    }

    fn close(&mut self) {
        self.rows.clear();
        self.current = None;
    }
}
