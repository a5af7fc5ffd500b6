//! strata-core: Shared graph model and driver seams for the Strata storage layer.
//!
//! This crate provides everything a Strata backend driver implements against:
//! - The property-graph data model (kinds, nodes, relationships, property bags)
//! - The declarative schema model (graphs, indexes, constraints)
//! - Value negotiation between untyped backend values and host types
//! - The `Database` / `Transaction` / `Cursor` traits
//! - The injectable driver registry and driver configuration

pub mod config;
pub mod database;
pub mod error;
pub mod registry;
pub mod schema;
pub mod types;
pub mod wire;

pub use config::DriverConfig;
pub use database::{Cursor, Database, Parameters, Transaction};
pub use error::{GraphError, Result};
pub use registry::Registry;
pub use schema::{Constraint, GraphSchema, Index, IndexType, Schema};
pub use types::{Id, Kind, Kinds, Node, Path, Properties, Relationship, Value};
pub use wire::{FromWire, Mapped, RowReader, TypeHint, Wire};
