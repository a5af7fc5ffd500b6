//! Neo4j backend for Strata.
//!
//! The native graph backend stores nodes and relationships directly: kind
//! names become labels and relationship types with no interning step, and
//! logical graphs share one label namespace. Index and constraint
//! definitions are expanded per label and synchronized through the
//! procedure surface (`db.createIndex`, `db.createUniquePropertyConstraint`).

pub mod driver;
pub mod index;
pub mod result;
pub mod tx;

pub use driver::{connect, register, Neo4jDatabase, DRIVER_NAME};
pub use tx::Neo4jTransaction;
