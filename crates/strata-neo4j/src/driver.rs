//! Database handle and driver registration for the native graph backend.

use std::sync::Arc;

use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph};
use tracing::info;

use strata_core::{
    Database, DriverConfig, GraphError, Parameters, Registry, Result, Schema, Transaction,
};

use crate::index;
use crate::tx::{bind_value, Neo4jTransaction};

pub const DRIVER_NAME: &str = "neo4j";

/// A connected native graph backend. Clone-cheap; the bolt pool lives
/// inside the handle.
pub struct Neo4jDatabase {
    graph: Graph,
}

/// Connect a bolt pool against the configured instance. Credentials come
/// from the dedicated config fields on this backend.
pub async fn connect(config: DriverConfig) -> Result<Arc<dyn Database>> {
    let user = config.user.clone().unwrap_or_else(|| "neo4j".to_string());
    let password = config.password.clone().unwrap_or_default();

    let neo_config = ConfigBuilder::default()
        .uri(&config.connection_string)
        .user(&user)
        .password(&password)
        .max_connections(config.max_connections as usize)
        .fetch_size(config.fetch_size)
        .build()
        .map_err(|err| GraphError::Connection(err.to_string()))?;

    let graph = Graph::connect(neo_config)
        .await
        .map_err(|err| GraphError::Connection(err.to_string()))?;

    info!(
        driver = DRIVER_NAME,
        uri = %config.connection_string,
        "connected"
    );

    Ok(Arc::new(Neo4jDatabase { graph }))
}

/// Make this backend resolvable by name.
pub fn register(registry: &mut Registry) {
    registry.register(DRIVER_NAME, connect);
}

#[async_trait]
impl Database for Neo4jDatabase {
    async fn write_transaction(&self) -> Result<Box<dyn Transaction>> {
        let txn = self.graph.start_txn().await.map_err(GraphError::backend)?;
        Ok(Box::new(Neo4jTransaction::new(txn)))
    }

    /// Bolt sessions opened here do not carry an access-mode hint, so a read
    /// transaction is a plain transaction; the split exists for contract
    /// parity with backends that enforce it.
    async fn read_transaction(&self) -> Result<Box<dyn Transaction>> {
        self.write_transaction().await
    }

    async fn assert_schema(&self, schema: &Schema) -> Result<()> {
        index::assert_schema(&self.graph, schema).await
    }

    /// Definition procedures auto-commit on this backend, which is why this
    /// runs outside an explicit transaction.
    async fn run(&self, statement: &str, parameters: Parameters) -> Result<()> {
        let mut q = query(statement);
        for (name, value) in &parameters {
            q = bind_value(q, name, value)?;
        }

        self.graph.run(q).await.map_err(GraphError::backend)
    }

    async fn close(&self) -> Result<()> {
        // The bolt pool is released when the last handle drops.
        Ok(())
    }
}
