//! Write and read transactions over the partitioned graph tables.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgConnection, Postgres};

use strata_core::{
    Cursor, GraphError, GraphSchema, Id, Kind, Kinds, Node, Parameters, Properties, Relationship,
    Result, Transaction, Value,
};

use crate::manager::SchemaManager;
use crate::model::GraphDescriptor;
use crate::result::PgCursor;
use crate::sql;

const INSERT_NODE: &str =
    "insert into node (graph_id, kind_ids, properties) values ($1, $2, $3) returning id";
const UPDATE_NODE: &str =
    "update node set kind_ids = $1, properties = $2 where id = $3 and graph_id = $4";
const INSERT_EDGE: &str =
    "insert into edge (graph_id, start_id, end_id, kind_id, properties) values ($1, $2, $3, $4, $5) returning id";
const UPDATE_EDGE: &str = "update edge set properties = $1 where id = $2 and graph_id = $3";

/// One open relational transaction. The target graph is resolved lazily on
/// the first mutation and cached for the transaction's lifetime.
pub struct PgTransaction {
    manager: Arc<SchemaManager>,
    tx: Option<sqlx::Transaction<'static, Postgres>>,
    target: Option<GraphSchema>,
    descriptor: Option<GraphDescriptor>,
}

impl PgTransaction {
    pub fn new(manager: Arc<SchemaManager>, tx: sqlx::Transaction<'static, Postgres>) -> Self {
        PgTransaction {
            manager,
            tx: Some(tx),
            target: None,
            descriptor: None,
        }
    }

    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.tx
            .as_mut()
            .map(|tx| &mut **tx)
            .ok_or_else(|| GraphError::Connection("transaction is closed".into()))
    }

    async fn descriptor(&mut self) -> Result<GraphDescriptor> {
        if let Some(descriptor) = &self.descriptor {
            return Ok(descriptor.clone());
        }

        let schema = self
            .target
            .clone()
            .ok_or(GraphError::MissingGraphScope)?;
        let descriptor = self.manager.assert_graph(&schema).await?;

        self.descriptor = Some(descriptor.clone());
        Ok(descriptor)
    }

    async fn kind_ids(&mut self, kinds: &Kinds) -> Result<Vec<i16>> {
        self.manager.assert_kinds(kinds).await
    }
}

fn entity_id(id: Id) -> Result<i32> {
    i32::try_from(id.0).map_err(|_| GraphError::TypeMismatch {
        observed: format!("int({})", id.0),
        requested: "i32",
    })
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    value: Value,
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(value) => query.bind(value),
        Value::Int(value) => query.bind(value),
        Value::Float(value) => query.bind(value),
        Value::String(value) => query.bind(value),
        Value::Time(value) => query.bind(value),
        Value::Kind(kind) => query.bind(kind.as_str().to_string()),
        Value::StringList(values) => query.bind(values),
        Value::KindList(kinds) => query.bind(
            kinds
                .iter()
                .map(|kind| kind.as_str().to_string())
                .collect::<Vec<_>>(),
        ),
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    fn with_graph(&mut self, schema: GraphSchema) {
        self.target = Some(schema);
        self.descriptor = None;
    }

    async fn create_node(&mut self, properties: Properties, kinds: Kinds) -> Result<Node> {
        if kinds.is_empty() {
            return Err(GraphError::MissingKinds);
        }

        let descriptor = self.descriptor().await?;
        let kind_ids = self.kind_ids(&kinds).await?;
        let document = properties.to_json();

        let id: i32 = sqlx::query_scalar(INSERT_NODE)
            .bind(descriptor.id)
            .bind(&kind_ids)
            .bind(&document)
            .fetch_one(self.conn()?)
            .await
            .map_err(GraphError::backend)?;

        Ok(Node::new(Id(id.into()), kinds, properties))
    }

    async fn update_node(&mut self, node: &Node) -> Result<()> {
        let descriptor = self.descriptor().await?;
        let kind_ids = self.kind_ids(&node.kinds).await?;
        let id = entity_id(node.id)?;

        let result = sqlx::query(UPDATE_NODE)
            .bind(&kind_ids)
            .bind(node.properties.to_json())
            .bind(id)
            .bind(descriptor.id)
            .execute(self.conn()?)
            .await
            .map_err(GraphError::backend)?;

        if result.rows_affected() == 0 {
            return Err(GraphError::NoRows);
        }

        Ok(())
    }

    async fn create_relationship_by_ids(
        &mut self,
        start_id: Id,
        end_id: Id,
        kind: Kind,
        properties: Properties,
    ) -> Result<Relationship> {
        let descriptor = self.descriptor().await?;
        let kinds = vec![kind.clone()];
        let kind_ids = self.kind_ids(&kinds).await?;
        let document = properties.to_json();

        let id: i32 = sqlx::query_scalar(INSERT_EDGE)
            .bind(descriptor.id)
            .bind(entity_id(start_id)?)
            .bind(entity_id(end_id)?)
            .bind(kind_ids[0])
            .bind(&document)
            .fetch_one(self.conn()?)
            .await
            .map_err(GraphError::backend)?;

        Ok(Relationship::new(
            Id(id.into()),
            start_id,
            end_id,
            kind,
            properties,
        ))
    }

    async fn update_relationship(&mut self, relationship: &Relationship) -> Result<()> {
        let descriptor = self.descriptor().await?;
        let id = entity_id(relationship.id)?;

        let result = sqlx::query(UPDATE_EDGE)
            .bind(relationship.properties.to_json())
            .bind(id)
            .bind(descriptor.id)
            .execute(self.conn()?)
            .await
            .map_err(GraphError::backend)?;

        if result.rows_affected() == 0 {
            return Err(GraphError::NoRows);
        }

        Ok(())
    }

    async fn run(&mut self, statement: &str, parameters: Parameters) -> Result<Box<dyn Cursor>> {
        let (rendered, values) = sql::render_named(statement, &parameters)?;

        let mut query = sqlx::query(&rendered);
        for value in values {
            query = bind_value(query, value);
        }

        let rows = query
            .fetch_all(self.conn()?)
            .await
            .map_err(GraphError::backend)?;

        Ok(Box::new(PgCursor::new(rows)))
    }

    async fn commit(&mut self) -> Result<()> {
        match self.tx.take() {
            Some(tx) => tx.commit().await.map_err(GraphError::backend),
            None => Err(GraphError::Connection("transaction is closed".into())),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await.map_err(GraphError::backend)?;
        }
        Ok(())
    }
}
