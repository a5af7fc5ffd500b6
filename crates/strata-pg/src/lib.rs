//! PostgreSQL backend for Strata.
//!
//! The relational backend emulates a property graph with partitioned tables
//! and interned integer identifiers: every kind name is assigned a small
//! integer ID on first use, every named graph maps to one list partition of
//! the global `node` and `edge` tables, and property bags live in JSONB
//! columns with functional indexes over `properties ->> '<field>'`.

pub mod driver;
pub mod manager;
pub mod model;
pub mod result;
pub mod sql;
pub mod tx;

pub use driver::{connect, register, PgDatabase, DRIVER_NAME};
pub use manager::SchemaManager;
pub use model::GraphDescriptor;
pub use tx::PgTransaction;
