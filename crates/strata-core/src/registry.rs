//! Explicit, injectable registry of driver constructors.
//!
//! Each backend crate registers a named constructor at process start; the
//! registry is read-only thereafter. Holding the registry as a value (rather
//! than a process-wide global) keeps driver resolution testable and lets
//! tests hold multiple isolated registries.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::DriverConfig;
use crate::database::Database;
use crate::error::{GraphError, Result};

type ConnectFuture = Pin<Box<dyn Future<Output = Result<Arc<dyn Database>>> + Send>>;
type DriverConstructor = Arc<dyn Fn(DriverConfig) -> ConnectFuture + Send + Sync>;

#[derive(Default, Clone)]
pub struct Registry {
    constructors: HashMap<String, DriverConstructor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver constructor under a name. A later registration
    /// under the same name replaces the earlier one.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, constructor: F)
    where
        F: Fn(DriverConfig) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn Database>>> + Send + 'static,
    {
        self.constructors.insert(
            name.into(),
            Arc::new(move |config| Box::pin(constructor(config))),
        );
    }

    /// Resolve a registered driver by name and connect it with the given
    /// configuration.
    pub async fn open(&self, name: &str, config: DriverConfig) -> Result<Arc<dyn Database>> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| GraphError::DriverNotFound(name.to_string()))?;

        constructor(config).await
    }

    pub fn driver_names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Parameters, Transaction};
    use crate::schema::Schema;
    use async_trait::async_trait;

    struct NullDatabase;

    #[async_trait]
    impl Database for NullDatabase {
        async fn write_transaction(&self) -> Result<Box<dyn Transaction>> {
            Err(GraphError::Connection("null database".into()))
        }

        async fn read_transaction(&self) -> Result<Box<dyn Transaction>> {
            Err(GraphError::Connection("null database".into()))
        }

        async fn assert_schema(&self, _schema: &Schema) -> Result<()> {
            Ok(())
        }

        async fn run(&self, _statement: &str, _parameters: Parameters) -> Result<()> {
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn resolves_registered_drivers_by_name() {
        let mut registry = Registry::new();
        registry.register("null", |_config| async {
            Ok(Arc::new(NullDatabase) as Arc<dyn Database>)
        });

        let database = registry
            .open("null", DriverConfig::new("null://"))
            .await
            .unwrap();
        assert!(database.assert_schema(&Schema::new()).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_driver_names_are_rejected() {
        let registry = Registry::new();
        let err = registry
            .open("missing", DriverConfig::new("null://"))
            .await
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, GraphError::DriverNotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn registries_are_isolated_values() {
        let mut first = Registry::new();
        first.register("null", |_config| async {
            Ok(Arc::new(NullDatabase) as Arc<dyn Database>)
        });
        let second = Registry::new();

        assert_eq!(first.driver_names(), vec!["null"]);
        assert!(second.driver_names().is_empty());
    }
}
