//! Facade over the Strata storage layer: one logical property graph
//! persisted on either a native graph database or partitioned relational
//! tables, behind one `Database` contract.
//!
//! ```no_run
//! use strata::{DriverConfig, GraphSchema, IndexType, Index, Schema};
//!
//! # async fn example() -> strata::Result<()> {
//! let database = strata::open(
//!     strata::POSTGRES,
//!     DriverConfig::new("postgres://localhost/strata"),
//! )
//! .await?;
//!
//! let schema = Schema::new().with_graph(
//!     GraphSchema::new("ad")
//!         .with_node_kinds(["User", "Group"])
//!         .with_node_index(Index::new("name", IndexType::BTree)),
//! );
//! database.assert_schema(&schema).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

pub use strata_core::{
    Constraint, Cursor, Database, DriverConfig, FromWire, GraphError, GraphSchema, Id, Index,
    IndexType, Kind, Kinds, Mapped, Node, Parameters, Path, Properties, Registry, Relationship,
    Result, RowReader, Schema, Transaction, TypeHint, Value, Wire,
};

/// Driver name for the relational backend.
pub const POSTGRES: &str = strata_pg::DRIVER_NAME;

/// Driver name for the native graph backend.
pub const NEO4J: &str = strata_neo4j::DRIVER_NAME;

/// A registry with every built-in backend registered. Callers that need a
/// different driver set build their own [`Registry`] instead.
pub fn default_registry() -> Registry {
    let mut registry = Registry::new();
    strata_pg::register(&mut registry);
    strata_neo4j::register(&mut registry);
    registry
}

/// Resolve a built-in driver by name and connect it.
pub async fn open(driver: &str, config: DriverConfig) -> Result<Arc<dyn Database>> {
    default_registry().open(driver, config).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_backends_are_registered() {
        let registry = default_registry();
        let mut names = registry.driver_names();
        names.sort();
        assert_eq!(names, vec![NEO4J, POSTGRES]);
    }

    #[tokio::test]
    async fn unknown_drivers_are_rejected() {
        let err = open("sqlite", DriverConfig::new("sqlite://"))
            .await
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, GraphError::DriverNotFound(name) if name == "sqlite"));
    }
}
