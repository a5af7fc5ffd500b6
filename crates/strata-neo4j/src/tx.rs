//! Explicit bolt transactions over the native graph.

use async_trait::async_trait;
use neo4rs::{query, Query, Txn};

use strata_core::{
    Cursor, GraphError, GraphSchema, Id, Kind, Kinds, Node, Parameters, Properties, Relationship,
    Result, Transaction, Value,
};

use crate::result::Neo4jCursor;

/// One open bolt transaction. Kinds pass through as labels and relationship
/// types; the scoped graph carries declarations only, since this backend
/// keeps every logical graph in one label namespace.
pub struct Neo4jTransaction {
    txn: Option<Txn>,
    target: Option<GraphSchema>,
}

impl Neo4jTransaction {
    pub fn new(txn: Txn) -> Self {
        Neo4jTransaction {
            txn: Some(txn),
            target: None,
        }
    }

    fn txn(&mut self) -> Result<&mut Txn> {
        self.txn
            .as_mut()
            .ok_or_else(|| GraphError::Connection("transaction is closed".into()))
    }

    fn ensure_scoped(&self) -> Result<()> {
        if self.target.is_none() {
            return Err(GraphError::MissingGraphScope);
        }
        Ok(())
    }

    /// Run a statement expected to produce exactly one `id` column.
    async fn run_returning_id(&mut self, q: Query) -> Result<i64> {
        let txn = self.txn()?;
        let mut stream = txn.execute(q).await.map_err(GraphError::backend)?;

        let row = stream
            .next(txn.handle())
            .await
            .map_err(GraphError::backend)?
            .ok_or(GraphError::NoRows)?;

        row.get("id").map_err(GraphError::backend)
    }
}

fn label_fragment(kinds: &Kinds) -> String {
    kinds
        .iter()
        .map(|kind| format!(":`{}`", kind.as_str()))
        .collect()
}

/// Bind one parameter with its bolt-typed value. Null has no outbound wire
/// representation here; statements use the Cypher `null` literal instead.
pub(crate) fn bind_value(q: Query, name: &str, value: &Value) -> Result<Query> {
    Ok(match value {
        Value::Null => {
            return Err(GraphError::TypeMismatch {
                observed: "null".to_string(),
                requested: "bolt parameter",
            })
        }
        Value::Bool(value) => q.param(name, *value),
        Value::Int(value) => q.param(name, *value),
        Value::Float(value) => q.param(name, *value),
        Value::String(value) => q.param(name, value.clone()),
        Value::Time(value) => q.param(name, value.to_rfc3339()),
        Value::Kind(kind) => q.param(name, kind.as_str().to_string()),
        Value::StringList(values) => q.param(name, values.clone()),
        Value::KindList(kinds) => q.param(
            name,
            kinds
                .iter()
                .map(|kind| kind.as_str().to_string())
                .collect::<Vec<_>>(),
        ),
    })
}

/// Render `set` assignments for a property bag: the assignment fragment (or
/// an empty string) plus the parameter bindings it references. Null-valued
/// fields are skipped; on this backend an absent property and a null
/// property are the same thing.
fn render_assignments<'p>(
    entity: &str,
    properties: &'p Properties,
) -> (String, Vec<(String, &'p Value)>) {
    let mut assignments = Vec::with_capacity(properties.len());
    let mut bindings = Vec::with_capacity(properties.len());

    for (position, (field, value)) in properties.iter().enumerate() {
        if matches!(value, Value::Null) {
            continue;
        }

        let parameter = format!("p{position}");
        assignments.push(format!("{entity}.`{field}` = ${parameter}"));
        bindings.push((parameter, value));
    }

    let fragment = if assignments.is_empty() {
        String::new()
    } else {
        format!(" set {}", assignments.join(", "))
    };

    (fragment, bindings)
}

fn bind_all<'p>(mut q: Query, bindings: &[(String, &'p Value)]) -> Result<Query> {
    for (name, value) in bindings {
        q = bind_value(q, name, value)?;
    }
    Ok(q)
}

#[async_trait]
impl Transaction for Neo4jTransaction {
    fn with_graph(&mut self, schema: GraphSchema) {
        self.target = Some(schema);
    }

    async fn create_node(&mut self, properties: Properties, kinds: Kinds) -> Result<Node> {
        if kinds.is_empty() {
            return Err(GraphError::MissingKinds);
        }
        self.ensure_scoped()?;

        let (assignments, bindings) = render_assignments("n", &properties);
        let cypher = format!(
            "create (n{}){assignments} return id(n) as id",
            label_fragment(&kinds)
        );

        let q = bind_all(query(&cypher), &bindings)?;
        let id = self.run_returning_id(q).await?;
        Ok(Node::new(Id(id), kinds, properties))
    }

    async fn update_node(&mut self, node: &Node) -> Result<()> {
        self.ensure_scoped()?;

        let (assignments, bindings) = render_assignments("n", &node.properties);
        let labels = if node.kinds.is_empty() {
            String::new()
        } else {
            format!(" set n{}", label_fragment(&node.kinds))
        };
        let cypher = format!(
            "match (n) where id(n) = $id set n = {{}}{assignments}{labels} return id(n) as id"
        );

        let q = bind_all(query(&cypher).param("id", node.id.0), &bindings)?;
        self.run_returning_id(q).await?;
        Ok(())
    }

    async fn create_relationship_by_ids(
        &mut self,
        start_id: Id,
        end_id: Id,
        kind: Kind,
        properties: Properties,
    ) -> Result<Relationship> {
        self.ensure_scoped()?;

        let (assignments, bindings) = render_assignments("r", &properties);
        let cypher = format!(
            "match (s), (e) where id(s) = $start_id and id(e) = $end_id \
             create (s)-[r:`{}`]->(e){assignments} return id(r) as id",
            kind.as_str()
        );

        let q = bind_all(
            query(&cypher)
                .param("start_id", start_id.0)
                .param("end_id", end_id.0),
            &bindings,
        )?;
        let id = self.run_returning_id(q).await?;
        Ok(Relationship::new(Id(id), start_id, end_id, kind, properties))
    }

    async fn update_relationship(&mut self, relationship: &Relationship) -> Result<()> {
        self.ensure_scoped()?;

        // The relationship type is immutable here; only the bag is replaced.
        let (assignments, bindings) = render_assignments("r", &relationship.properties);
        let cypher = format!(
            "match ()-[r]->() where id(r) = $id set r = {{}}{assignments} return id(r) as id"
        );

        let q = bind_all(query(&cypher).param("id", relationship.id.0), &bindings)?;
        self.run_returning_id(q).await?;
        Ok(())
    }

    async fn run(&mut self, statement: &str, parameters: Parameters) -> Result<Box<dyn Cursor>> {
        let mut q = query(statement);
        for (name, value) in &parameters {
            q = bind_value(q, name, value)?;
        }

        let txn = self.txn()?;
        let mut stream = txn.execute(q).await.map_err(GraphError::backend)?;

        let mut rows = Vec::new();
        while let Some(row) = stream
            .next(txn.handle())
            .await
            .map_err(GraphError::backend)?
        {
            rows.push(row);
        }

        Ok(Box::new(Neo4jCursor::new(rows)))
    }

    async fn commit(&mut self) -> Result<()> {
        match self.txn.take() {
            Some(txn) => txn.commit().await.map_err(GraphError::backend),
            None => Err(GraphError::Connection("transaction is closed".into())),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(txn) = self.txn.take() {
            txn.rollback().await.map_err(GraphError::backend)?;
        }
        Ok(())
    }
}
