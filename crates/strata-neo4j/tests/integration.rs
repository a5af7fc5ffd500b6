//! Integration tests for strata-neo4j against a live Neo4j instance.
//!
//! Point STRATA_NEO4J_URI (plus STRATA_NEO4J_USER / STRATA_NEO4J_PASSWORD)
//! at a scratch instance and run with:
//! cargo test --package strata-neo4j --test integration -- --ignored
//!
//! Skipped automatically if Neo4j is not available.

use std::sync::Arc;

use uuid::Uuid;

use strata_core::{
    Constraint, Database, DriverConfig, FromWire, GraphSchema, Id, Index, IndexType, Kind, Node,
    Parameters, Path, Properties, Relationship, Schema, Value,
};

async fn connect_or_skip() -> Option<Arc<dyn Database>> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let uri = std::env::var("STRATA_NEO4J_URI")
        .unwrap_or_else(|_| "bolt://localhost:7687".to_string());
    let user = std::env::var("STRATA_NEO4J_USER").unwrap_or_else(|_| "neo4j".to_string());
    let password =
        std::env::var("STRATA_NEO4J_PASSWORD").unwrap_or_else(|_| "neo4j".to_string());

    match strata_neo4j::connect(DriverConfig::new(uri).with_credentials(user, password)).await {
        Ok(database) => Some(database),
        Err(e) => {
            eprintln!("Skipping integration test (Neo4j not available): {e}");
            None
        }
    }
}

fn unique(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

fn test_graph(user_kind: &str, member_kind: &str) -> GraphSchema {
    GraphSchema::new(unique("graph"))
        .with_node_kinds([user_kind])
        .with_edge_kinds([member_kind])
}

async fn cleanup(database: &Arc<dyn Database>, kind: &str) {
    let _ = database
        .run(
            &format!("match (n:`{kind}`) detach delete n"),
            Parameters::new(),
        )
        .await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn node_lifecycle_round_trips_properties() {
    let Some(database) = connect_or_skip().await else {
        return;
    };

    let user_kind = unique("User");
    let graph = test_graph(&user_kind, &unique("MemberOf"));

    let mut tx = database.write_transaction().await.unwrap();
    tx.with_graph(graph.clone());

    let mut properties = Properties::new();
    properties
        .set("name", "alice")
        .set("logon_count", 42i64)
        .set("enabled", true);

    let created = tx
        .create_node(properties, vec![Kind::new(&user_kind)])
        .await
        .unwrap();

    let mut parameters = Parameters::new();
    parameters.insert("id".to_string(), Value::Int(created.id.0));
    let mut cursor = tx
        .run("match (n) where id(n) = $id return n", parameters)
        .await
        .unwrap();
    assert!(cursor.advance().await.unwrap());

    let node = Node::from_wire(cursor.wire("n").unwrap()).unwrap();
    assert_eq!(node.id, created.id);
    assert!(node.kinds.contains(&Kind::new(&user_kind)));
    assert_eq!(node.properties.get("name"), Some(&Value::String("alice".into())));
    assert_eq!(node.properties.get("logon_count"), Some(&Value::Int(42)));

    tx.close().await.unwrap();
    cleanup(&database, &user_kind).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn update_replaces_the_property_bag_wholesale() {
    let Some(database) = connect_or_skip().await else {
        return;
    };

    let user_kind = unique("User");
    let graph = test_graph(&user_kind, &unique("MemberOf"));

    let mut tx = database.write_transaction().await.unwrap();
    tx.with_graph(graph.clone());

    let mut bag = Properties::new();
    bag.set("name", "alice").set("logon_count", 42i64);
    let mut node = tx
        .create_node(bag, vec![Kind::new(&user_kind)])
        .await
        .unwrap();

    let mut replacement = Properties::new();
    replacement.set("name", "alice2");
    node.properties = replacement;
    tx.update_node(&node).await.unwrap();

    let mut parameters = Parameters::new();
    parameters.insert("id".to_string(), Value::Int(node.id.0));
    let mut cursor = tx
        .run("match (n) where id(n) = $id return n", parameters)
        .await
        .unwrap();
    assert!(cursor.advance().await.unwrap());

    let stored = Node::from_wire(cursor.wire("n").unwrap()).unwrap();
    assert_eq!(stored.properties.get("name"), Some(&Value::String("alice2".into())));
    assert_eq!(stored.properties.get("logon_count"), None);

    tx.commit().await.unwrap();
    cleanup(&database, &user_kind).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn relationships_connect_existing_nodes() {
    let Some(database) = connect_or_skip().await else {
        return;
    };

    let user_kind = unique("User");
    let member_kind = unique("MemberOf");
    let graph = test_graph(&user_kind, &member_kind);

    let mut tx = database.write_transaction().await.unwrap();
    tx.with_graph(graph.clone());

    let mut alice_bag = Properties::new();
    alice_bag.set("name", "alice");
    let alice = tx
        .create_node(alice_bag, vec![Kind::new(&user_kind)])
        .await
        .unwrap();

    let mut group_bag = Properties::new();
    group_bag.set("name", "admins");
    let group = tx
        .create_node(group_bag, vec![Kind::new(&user_kind)])
        .await
        .unwrap();

    let edge = tx
        .create_relationship_by_ids(
            alice.id,
            group.id,
            Kind::new(&member_kind),
            Properties::new(),
        )
        .await
        .unwrap();

    let mut parameters = Parameters::new();
    parameters.insert("id".to_string(), Value::Int(edge.id.0));
    let mut cursor = tx
        .run("match ()-[r]->() where id(r) = $id return r", parameters)
        .await
        .unwrap();
    assert!(cursor.advance().await.unwrap());

    let stored = Relationship::from_wire(cursor.wire("r").unwrap()).unwrap();
    assert_eq!(stored.kind, Kind::new(&member_kind));
    assert_eq!(stored.start_id, alice.id);
    assert_eq!(stored.end_id, group.id);

    tx.commit().await.unwrap();
    cleanup(&database, &user_kind).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn paths_rebuild_segment_endpoints_from_walk_order() {
    let Some(database) = connect_or_skip().await else {
        return;
    };

    let user_kind = unique("User");
    let member_kind = unique("MemberOf");
    let graph = test_graph(&user_kind, &member_kind);

    let mut tx = database.write_transaction().await.unwrap();
    tx.with_graph(graph.clone());

    let mut alice_bag = Properties::new();
    alice_bag.set("name", "alice");
    let alice = tx
        .create_node(alice_bag, vec![Kind::new(&user_kind)])
        .await
        .unwrap();

    let mut group_bag = Properties::new();
    group_bag.set("name", "admins");
    let group = tx
        .create_node(group_bag, vec![Kind::new(&user_kind)])
        .await
        .unwrap();

    let edge = tx
        .create_relationship_by_ids(
            alice.id,
            group.id,
            Kind::new(&member_kind),
            Properties::new(),
        )
        .await
        .unwrap();

    let mut parameters = Parameters::new();
    parameters.insert("id".to_string(), Value::Int(alice.id.0));
    let mut cursor = tx
        .run("match p = (a)-[]->(b) where id(a) = $id return p", parameters)
        .await
        .unwrap();
    assert!(cursor.advance().await.unwrap());

    let path = Path::from_wire(cursor.wire("p").unwrap()).unwrap();
    assert_eq!(path.nodes.len(), 2);
    assert_eq!(path.relationships.len(), 1);
    assert_eq!(path.relationships[0].id, edge.id);
    assert_eq!(path.relationships[0].kind, Kind::new(&member_kind));
    assert_eq!(path.relationships[0].start_id, alice.id);
    assert_eq!(path.relationships[0].end_id, group.id);

    tx.commit().await.unwrap();
    cleanup(&database, &user_kind).await;
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn dangling_endpoints_fail_relationship_creation() {
    let Some(database) = connect_or_skip().await else {
        return;
    };

    let graph = test_graph(&unique("User"), &unique("MemberOf"));

    let mut tx = database.write_transaction().await.unwrap();
    tx.with_graph(graph);

    let result = tx
        .create_relationship_by_ids(
            Id(i64::MAX - 1),
            Id(i64::MAX - 2),
            Kind::new("MemberOf"),
            Properties::new(),
        )
        .await;
    assert!(result.is_err());

    tx.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn assert_schema_converges_index_definitions() {
    let Some(database) = connect_or_skip().await else {
        return;
    };

    let user_kind = unique("User");
    let graph = GraphSchema::new(unique("graph"))
        .with_node_kinds([user_kind.as_str()])
        .with_node_index(Index::new("name", IndexType::BTree))
        .with_node_constraint(Constraint::new("objectid", IndexType::BTree));
    let schema = Schema::new().with_graph(graph);

    database.assert_schema(&schema).await.unwrap();
    database.assert_schema(&schema).await.unwrap();

    let expected_index = format!("{}_name_index", user_kind.to_lowercase());
    let mut tx = database.read_transaction().await.unwrap();
    let mut cursor = tx
        .run(
            "call db.indexes() yield name, uniqueness return name, uniqueness",
            Parameters::new(),
        )
        .await
        .unwrap();

    let mut found = false;
    while cursor.advance().await.unwrap() {
        if String::from_wire(cursor.wire("name").unwrap()).unwrap() == expected_index {
            found = true;
        }
    }
    assert!(found, "expected {expected_index} to exist");

    tx.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires live Neo4j"]
async fn mutations_require_a_graph_target() {
    let Some(database) = connect_or_skip().await else {
        return;
    };

    let mut tx = database.write_transaction().await.unwrap();
    let result = tx
        .create_node(Properties::new(), vec![Kind::new("User")])
        .await;
    assert!(matches!(
        result,
        Err(strata_core::GraphError::MissingGraphScope)
    ));

    tx.close().await.unwrap();
}
