//! Backend-facing traits: `Database`, `Transaction`, and `Cursor`.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::schema::{GraphSchema, Schema};
use crate::types::{Id, Kind, Kinds, Node, Properties, Relationship, Value};
use crate::wire::{RowReader, Wire};

/// Parameters for a raw backend statement.
pub type Parameters = HashMap<String, Value>;

/// Iterator over the rows of one executed statement.
///
/// Drivers materialize the statement's rows when `run` returns, so backend
/// cursor resources are released eagerly; `close` drops whatever remains
/// buffered.
#[async_trait]
pub trait Cursor: Send {
    /// Move to the next row. Returns `false` once the rows are exhausted.
    async fn advance(&mut self) -> Result<bool>;

    /// Decode one column of the current row into an untyped wire value.
    fn wire(&self, column: &str) -> Result<Wire>;

    /// Build a row-scoped positional reader over the named columns, in the
    /// given order.
    fn reader(&self, columns: &[&str]) -> Result<RowReader> {
        let mut values = Vec::with_capacity(columns.len());
        for column in columns {
            values.push(self.wire(column)?);
        }
        Ok(RowReader::new(values))
    }

    /// Release any rows still buffered.
    fn close(&mut self);
}

/// One open backend transaction, bound to at most one target graph.
///
/// A transaction is owned by exactly one calling task and is not safe for
/// simultaneous multi-caller use. Statements execute in issue order;
/// cross-transaction ordering is whatever the backend's isolation level
/// provides.
#[async_trait]
pub trait Transaction: Send {
    /// Scope all subsequent mutations to the given graph. Mutations issued
    /// before scoping fail with `MissingGraphScope`.
    fn with_graph(&mut self, schema: GraphSchema);

    /// Create a node with at least one kind, resolving kind identifiers
    /// through the backend's schema manager. Returns the node carrying its
    /// backend-assigned ID.
    async fn create_node(&mut self, properties: Properties, kinds: Kinds) -> Result<Node>;

    /// Re-resolve the node's kinds and overwrite its stored property bag
    /// wholesale.
    async fn update_node(&mut self, node: &Node) -> Result<()>;

    /// Create a relationship with exactly one kind between two existing
    /// node IDs.
    ///
    /// Endpoint membership in the scoped graph is not verified at this
    /// layer; enforcement is left to the backend's referential and
    /// partition constraints.
    async fn create_relationship_by_ids(
        &mut self,
        start_id: Id,
        end_id: Id,
        kind: Kind,
        properties: Properties,
    ) -> Result<Relationship>;

    /// Overwrite the relationship's stored property bag wholesale.
    async fn update_relationship(&mut self, relationship: &Relationship) -> Result<()>;

    /// Execute a raw backend-native statement and return a cursor over its
    /// rows. Callers drain or close the cursor.
    async fn run(&mut self, statement: &str, parameters: Parameters) -> Result<Box<dyn Cursor>>;

    /// Finalize the bound backend transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Roll back if not yet committed; a no-op afterwards.
    async fn close(&mut self) -> Result<()>;
}

/// One configured backend: owns the connection pool, opens transactions,
/// and reconciles declarative schemas against live backend state.
#[async_trait]
pub trait Database: Send + Sync {
    /// Open a read-write transaction.
    async fn write_transaction(&self) -> Result<Box<dyn Transaction>>;

    /// Open a read-only transaction where the backend supports the
    /// distinction.
    async fn read_transaction(&self) -> Result<Box<dyn Transaction>>;

    /// Reconcile the desired schema against live backend state: intern
    /// kinds, materialize graphs and partitions, and synchronize index and
    /// constraint definitions, inside one backend write transaction.
    async fn assert_schema(&self, schema: &Schema) -> Result<()>;

    /// Execute a single statement inside a one-shot write transaction,
    /// discarding any rows.
    async fn run(&self, statement: &str, parameters: Parameters) -> Result<()>;

    /// Release the underlying connection pool.
    async fn close(&self) -> Result<()>;
}
