//! Index and constraint synchronization through the procedure surface.
//!
//! Logical graphs share one label namespace here, so a declared index
//! expands to one physical index per node kind. Present definitions come
//! from `db.indexes()`; the diff against requirements is computed offline
//! and then applied with removals running before additions.

use std::collections::HashMap;

use neo4rs::{query, Graph};
use tracing::{debug, warn};

use strata_core::{GraphError, IndexType, Kind, Result, Schema};

const BTREE_PROVIDER: &str = "native-btree-1.0";
const LUCENE_PROVIDER: &str = "lucene+native-3.0";

const DROP_INDEX: &str = "drop index $name;";
const DROP_CONSTRAINT: &str = "drop constraint $name;";
const CREATE_INDEX: &str = "call db.createIndex($name, $labels, $properties, $provider);";
const CREATE_CONSTRAINT: &str =
    "call db.createUniquePropertyConstraint($name, $labels, $properties, $provider);";
const LIST_INDEXES: &str =
    "call db.indexes() yield name, uniqueness, provider, labelsOrTypes, properties;";

pub fn provider_for(index_type: IndexType) -> &'static str {
    match index_type {
        IndexType::BTree => BTREE_PROVIDER,
        IndexType::FullText => LUCENE_PROVIDER,
    }
}

pub fn parse_provider(provider: &str) -> Option<IndexType> {
    match provider {
        BTREE_PROVIDER => Some(IndexType::BTree),
        LUCENE_PROVIDER => Some(IndexType::FullText),
        _ => None,
    }
}

/// One label-scoped index or constraint requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelIndex {
    pub kind: Kind,
    pub field: String,
    pub index_type: IndexType,
}

fn derived_name(kind: &Kind, field: &str, suffix: &str) -> String {
    format!(
        "{}_{}_{suffix}",
        kind.as_str().to_lowercase(),
        field.to_lowercase()
    )
}

/// Expand every declared graph into per-label physical requirements. Two
/// graphs declaring the same kind and field collapse onto one name.
pub fn required_definitions(
    schema: &Schema,
) -> (HashMap<String, LabelIndex>, HashMap<String, LabelIndex>) {
    let mut indexes = HashMap::new();
    let mut constraints = HashMap::new();

    for graph in &schema.graphs {
        for kind in &graph.node_kinds {
            for index in &graph.node_indexes {
                let name = index
                    .name
                    .clone()
                    .unwrap_or_else(|| derived_name(kind, &index.field, "index"));

                indexes.insert(
                    name,
                    LabelIndex {
                        kind: kind.clone(),
                        field: index.field.clone(),
                        index_type: index.index_type,
                    },
                );
            }

            for constraint in &graph.node_constraints {
                let name = constraint
                    .name
                    .clone()
                    .unwrap_or_else(|| derived_name(kind, &constraint.field, "constraint"));

                constraints.insert(
                    name,
                    LabelIndex {
                        kind: kind.clone(),
                        field: constraint.field.clone(),
                        index_type: constraint.index_type,
                    },
                );
            }
        }
    }

    (indexes, constraints)
}

/// Definitions currently live on the backend, keyed by name. A `None` type
/// records an unrecognized provider; it never matches a requirement.
#[derive(Debug, Default, Clone)]
pub struct PresentDefinitions {
    pub indexes: HashMap<String, Option<IndexType>>,
    pub constraints: HashMap<String, Option<IndexType>>,
}

/// The work needed to bring the backend in line with the declared schema.
#[derive(Debug, Default, Clone)]
pub struct ChangeSet {
    pub index_removals: Vec<String>,
    pub constraint_removals: Vec<String>,
    pub index_additions: Vec<(String, LabelIndex)>,
    pub constraint_additions: Vec<(String, LabelIndex)>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.index_removals.is_empty()
            && self.constraint_removals.is_empty()
            && self.index_additions.is_empty()
            && self.constraint_additions.is_empty()
    }
}

/// Diff present definitions against requirements. Stale names are dropped,
/// missing names are created, and a name whose category differs is dropped
/// and re-created. Output ordering is name-sorted.
pub fn diff_definitions(
    present: &PresentDefinitions,
    required_indexes: &HashMap<String, LabelIndex>,
    required_constraints: &HashMap<String, LabelIndex>,
) -> ChangeSet {
    let mut changes = ChangeSet::default();

    for (name, present_type) in &present.indexes {
        match required_indexes.get(name) {
            None => changes.index_removals.push(name.clone()),
            Some(required) if Some(required.index_type) != *present_type => {
                changes.index_removals.push(name.clone());
                changes
                    .index_additions
                    .push((name.clone(), required.clone()));
            }
            Some(_) => {}
        }
    }

    for (name, present_type) in &present.constraints {
        match required_constraints.get(name) {
            None => changes.constraint_removals.push(name.clone()),
            Some(required) if Some(required.index_type) != *present_type => {
                changes.constraint_removals.push(name.clone());
                changes
                    .constraint_additions
                    .push((name.clone(), required.clone()));
            }
            Some(_) => {}
        }
    }

    for (name, required) in required_indexes {
        if !present.indexes.contains_key(name) {
            changes
                .index_additions
                .push((name.clone(), required.clone()));
        }
    }

    for (name, required) in required_constraints {
        if !present.constraints.contains_key(name) {
            changes
                .constraint_additions
                .push((name.clone(), required.clone()));
        }
    }

    changes.index_removals.sort();
    changes.index_removals.dedup();
    changes.constraint_removals.sort();
    changes.constraint_removals.dedup();
    changes.index_additions.sort_by(|a, b| a.0.cmp(&b.0));
    changes.constraint_additions.sort_by(|a, b| a.0.cmp(&b.0));

    changes
}

async fn fetch_present(graph: &Graph) -> Result<PresentDefinitions> {
    let mut present = PresentDefinitions::default();
    let mut stream = graph
        .execute(query(LIST_INDEXES))
        .await
        .map_err(GraphError::backend)?;

    while let Some(row) = stream.next().await.map_err(GraphError::backend)? {
        let name: String = row.get("name").map_err(GraphError::backend)?;
        let uniqueness: String = row.get("uniqueness").map_err(GraphError::backend)?;
        let provider: String = row.get("provider").map_err(GraphError::backend)?;
        let labels: Vec<String> = row.get("labelsOrTypes").unwrap_or_default();
        let properties: Vec<String> = row.get("properties").unwrap_or_default();

        // Token-lookup indexes created by the backend itself carry no labels.
        if labels.is_empty() {
            continue;
        }

        if labels.len() > 1 || properties.len() > 1 {
            return Err(GraphError::SchemaConflict(format!(
                "index {name} is composite; composite definitions are not supported"
            )));
        }

        let index_type = parse_provider(&provider);
        if index_type.is_none() {
            warn!(name, provider, "index uses an unrecognized provider");
        }

        if uniqueness == "UNIQUE" {
            present.constraints.insert(name, index_type);
        } else {
            present.indexes.insert(name, index_type);
        }
    }

    Ok(present)
}

struct PlannedChange<'a> {
    statement: &'static str,
    name: &'a str,
    definition: Option<&'a LabelIndex>,
}

/// Flatten a change set into statement order: every removal executes before
/// any addition, so a name migrating between the index and constraint
/// categories never collides with its old definition.
fn plan_changes(changes: &ChangeSet) -> Vec<PlannedChange<'_>> {
    let mut plan = Vec::new();

    for name in &changes.constraint_removals {
        plan.push(PlannedChange {
            statement: DROP_CONSTRAINT,
            name,
            definition: None,
        });
    }
    for name in &changes.index_removals {
        plan.push(PlannedChange {
            statement: DROP_INDEX,
            name,
            definition: None,
        });
    }
    for (name, definition) in &changes.constraint_additions {
        plan.push(PlannedChange {
            statement: CREATE_CONSTRAINT,
            name,
            definition: Some(definition),
        });
    }
    for (name, definition) in &changes.index_additions {
        plan.push(PlannedChange {
            statement: CREATE_INDEX,
            name,
            definition: Some(definition),
        });
    }

    plan
}

async fn apply_changes(graph: &Graph, changes: &ChangeSet) -> Result<()> {
    for change in plan_changes(changes) {
        let mut statement = query(change.statement).param("name", change.name);

        if let Some(definition) = change.definition {
            statement = statement
                .param("labels", vec![definition.kind.as_str().to_string()])
                .param("properties", vec![definition.field.clone()])
                .param("provider", provider_for(definition.index_type));
        }

        graph.run(statement).await.map_err(GraphError::backend)?;
    }

    Ok(())
}

/// Reconcile the declared schema against the live backend. Definition DDL
/// auto-commits on this backend, so this runs outside any transaction.
pub async fn assert_schema(graph: &Graph, schema: &Schema) -> Result<()> {
    let present = fetch_present(graph).await?;
    let (required_indexes, required_constraints) = required_definitions(schema);
    let changes = diff_definitions(&present, &required_indexes, &required_constraints);

    if changes.is_empty() {
        return Ok(());
    }

    debug!(
        removals = changes.index_removals.len() + changes.constraint_removals.len(),
        additions = changes.index_additions.len() + changes.constraint_additions.len(),
        "synchronizing index definitions"
    );

    apply_changes(graph, &changes).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{Constraint, GraphSchema, Index};

    fn schema() -> Schema {
        Schema::new().with_graph(
            GraphSchema::new("ad")
                .with_node_kinds(["User", "Group"])
                .with_node_index(Index::new("name", IndexType::BTree))
                .with_node_constraint(Constraint::new("objectid", IndexType::BTree)),
        )
    }

    #[test]
    fn requirements_expand_per_label() {
        let (indexes, constraints) = required_definitions(&schema());

        assert_eq!(indexes.len(), 2);
        assert_eq!(constraints.len(), 2);
        assert!(indexes.contains_key("user_name_index"));
        assert!(indexes.contains_key("group_name_index"));
        assert!(constraints.contains_key("user_objectid_constraint"));
        assert_eq!(indexes["user_name_index"].kind, Kind::new("User"));
    }

    #[test]
    fn providers_round_trip() {
        assert_eq!(parse_provider(provider_for(IndexType::BTree)), Some(IndexType::BTree));
        assert_eq!(
            parse_provider(provider_for(IndexType::FullText)),
            Some(IndexType::FullText)
        );
        assert_eq!(parse_provider("range-1.0"), None);
    }

    #[test]
    fn diff_drops_stale_and_creates_missing() {
        let (required_indexes, required_constraints) = required_definitions(&schema());

        let mut present = PresentDefinitions::default();
        present
            .indexes
            .insert("user_name_index".to_string(), Some(IndexType::BTree));
        present
            .indexes
            .insert("stale_index".to_string(), Some(IndexType::BTree));

        let changes = diff_definitions(&present, &required_indexes, &required_constraints);
        assert_eq!(changes.index_removals, vec!["stale_index"]);
        assert_eq!(changes.index_additions.len(), 1);
        assert_eq!(changes.index_additions[0].0, "group_name_index");
        assert_eq!(changes.constraint_additions.len(), 2);
        assert!(changes.constraint_removals.is_empty());
    }

    #[test]
    fn provider_change_rebuilds_under_the_same_name() {
        let (required_indexes, required_constraints) = required_definitions(&schema());

        let mut present = PresentDefinitions::default();
        present
            .indexes
            .insert("user_name_index".to_string(), Some(IndexType::FullText));

        let changes = diff_definitions(&present, &required_indexes, &required_constraints);
        assert!(changes.index_removals.contains(&"user_name_index".to_string()));
        assert!(changes
            .index_additions
            .iter()
            .any(|(name, definition)| name == "user_name_index"
                && definition.index_type == IndexType::BTree));
    }

    #[test]
    fn unrecognized_providers_never_match() {
        let (required_indexes, required_constraints) = required_definitions(&schema());

        let mut present = PresentDefinitions::default();
        present.indexes.insert("user_name_index".to_string(), None);

        let changes = diff_definitions(&present, &required_indexes, &required_constraints);
        assert_eq!(changes.index_removals, vec!["user_name_index"]);
    }

    #[test]
    fn removals_are_planned_before_additions() {
        // A name migrating from the index category to the constraint
        // category is dropped before anything is created under it.
        let schema = Schema::new().with_graph(
            GraphSchema::new("g")
                .with_node_kinds(["User"])
                .with_node_constraint(
                    Constraint::new("objectid", IndexType::BTree).named("user_objectid"),
                ),
        );
        let (required_indexes, required_constraints) = required_definitions(&schema);

        let mut present = PresentDefinitions::default();
        present
            .indexes
            .insert("user_objectid".to_string(), Some(IndexType::BTree));

        let changes = diff_definitions(&present, &required_indexes, &required_constraints);
        let plan = plan_changes(&changes);

        let drop = plan
            .iter()
            .position(|change| change.statement == DROP_INDEX && change.name == "user_objectid");
        let create = plan.iter().position(|change| {
            change.statement == CREATE_CONSTRAINT && change.name == "user_objectid"
        });
        assert!(drop.unwrap() < create.unwrap());
    }

    #[test]
    fn explicit_names_bypass_derivation() {
        let schema = Schema::new().with_graph(
            GraphSchema::new("g")
                .with_node_kinds(["User"])
                .with_node_index(Index::new("name", IndexType::BTree).named("custom_name")),
        );

        let (indexes, _) = required_definitions(&schema);
        assert!(indexes.contains_key("custom_name"));
    }
}
