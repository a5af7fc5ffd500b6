//! Database handle and driver registration for the relational backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use strata_core::{
    Database, DriverConfig, GraphError, Parameters, Registry, Result, Schema, Transaction,
};

use crate::manager::SchemaManager;
use crate::tx::PgTransaction;

pub const DRIVER_NAME: &str = "pg";

/// A connected relational backend: connection pool plus the shared schema
/// manager every transaction consults.
pub struct PgDatabase {
    pool: PgPool,
    manager: Arc<SchemaManager>,
}

/// Connect a pool against the configured database. Credentials ride in the
/// connection string for this backend.
pub async fn connect(config: DriverConfig) -> Result<Arc<dyn Database>> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(&config.connection_string)
        .await
        .map_err(|err| GraphError::Connection(err.to_string()))?;

    info!(
        driver = DRIVER_NAME,
        max_connections = config.max_connections,
        "connected"
    );

    let manager = Arc::new(SchemaManager::new(pool.clone()));
    Ok(Arc::new(PgDatabase { pool, manager }))
}

/// Make this backend resolvable by name.
pub fn register(registry: &mut Registry) {
    registry.register(DRIVER_NAME, connect);
}

#[async_trait]
impl Database for PgDatabase {
    async fn write_transaction(&self) -> Result<Box<dyn Transaction>> {
        let tx = self.pool.begin().await.map_err(GraphError::backend)?;
        Ok(Box::new(PgTransaction::new(Arc::clone(&self.manager), tx)))
    }

    async fn read_transaction(&self) -> Result<Box<dyn Transaction>> {
        let mut tx = self.pool.begin().await.map_err(GraphError::backend)?;

        sqlx::query("set transaction read only")
            .execute(&mut *tx)
            .await
            .map_err(GraphError::backend)?;

        Ok(Box::new(PgTransaction::new(Arc::clone(&self.manager), tx)))
    }

    async fn assert_schema(&self, schema: &Schema) -> Result<()> {
        self.manager.assert_schema(schema).await
    }

    async fn run(&self, statement: &str, parameters: Parameters) -> Result<()> {
        let mut tx = self.write_transaction().await?;
        let mut cursor = tx.run(statement, parameters).await?;
        cursor.close();
        tx.commit().await
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
