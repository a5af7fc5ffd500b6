//! Kind interning and graph materialization against the live catalog.
//!
//! The manager owns its own handle on the pool and holds a process-local
//! cache of kind identifiers and graph descriptors behind a read/write
//! lock. Lookups take the read lock; only a cache miss escalates to the
//! write lock, where the missing set is recomputed before touching the
//! catalog so concurrent fillers do not repeat each other's work.
//!
//! Catalog and definition statements run on dedicated pool connections in
//! autocommit, outside any caller's data transaction. An interned kind or
//! materialized partition therefore stays durable even when the data
//! transaction that first referenced it rolls back; the dictionary is
//! append-only, so the stray row is harmless.

use std::collections::HashMap;

use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use strata_core::{GraphError, GraphSchema, Kind, Kinds, Result, Schema};

use crate::model::{
    diff_partition, GraphDescriptor, IndexChangeSet, PresentPartition, RequiredPartition,
};
use crate::sql;

#[derive(Default)]
struct SchemaCache {
    kinds: HashMap<Kind, i16>,
    graphs: HashMap<String, GraphDescriptor>,
}

/// Shared per-database schema state. One instance lives on the database
/// handle and is shared by every transaction it opens.
pub struct SchemaManager {
    pool: PgPool,
    cache: RwLock<SchemaCache>,
}

impl SchemaManager {
    pub fn new(pool: PgPool) -> Self {
        SchemaManager {
            pool,
            cache: RwLock::new(SchemaCache::default()),
        }
    }

    /// Resolve the identifier of every kind, interning the ones the catalog
    /// has not seen. Identifiers come back in input order.
    pub async fn assert_kinds(&self, kinds: &Kinds) -> Result<Vec<i16>> {
        {
            let cache = self.cache.read().await;
            let resolved: Vec<i16> = kinds
                .iter()
                .filter_map(|kind| cache.kinds.get(kind).copied())
                .collect();

            if resolved.len() == kinds.len() {
                return Ok(resolved);
            }
        }

        let mut cache = self.cache.write().await;

        // Another task may have filled part of the missing set between the
        // lock handoff; recompute it under the write lock.
        for kind in kinds {
            if !cache.kinds.contains_key(kind) {
                let id = self.intern_kind(kind).await?;
                cache.kinds.insert(kind.clone(), id);
            }
        }

        kinds
            .iter()
            .map(|kind| {
                cache
                    .kinds
                    .get(kind)
                    .copied()
                    .ok_or_else(|| GraphError::UnresolvedKind(kind.clone()))
            })
            .collect()
    }

    /// Resolve a graph by name, materializing it on first reference:
    /// catalog row, node/edge partitions, property indexes, and the kinds
    /// the definition declares.
    pub async fn assert_graph(&self, schema: &GraphSchema) -> Result<GraphDescriptor> {
        {
            let cache = self.cache.read().await;
            if let Some(descriptor) = cache.graphs.get(&schema.name) {
                return Ok(descriptor.clone());
            }
        }

        let mut cache = self.cache.write().await;

        if let Some(descriptor) = cache.graphs.get(&schema.name) {
            return Ok(descriptor.clone());
        }

        let descriptor = self.define_graph(schema).await?;
        self.reconcile_partitions(schema, &descriptor).await?;

        for kind in schema.node_kinds.iter().chain(schema.edge_kinds.iter()) {
            if !cache.kinds.contains_key(kind) {
                let id = self.intern_kind(kind).await?;
                cache.kinds.insert(kind.clone(), id);
            }
        }

        cache
            .graphs
            .insert(schema.name.clone(), descriptor.clone());
        Ok(descriptor)
    }

    /// Full reconciliation pass: ensure the base tables exist, warm the
    /// cache from the catalog, then materialize and synchronize every
    /// declared graph.
    pub async fn assert_schema(&self, schema: &Schema) -> Result<()> {
        let mut cache = self.cache.write().await;

        sqlx::raw_sql(sql::SCHEMA_UP)
            .execute(&self.pool)
            .await
            .map_err(GraphError::backend)?;

        let kind_rows: Vec<(i16, String)> = sqlx::query_as(sql::SELECT_KINDS)
            .fetch_all(&self.pool)
            .await
            .map_err(GraphError::backend)?;

        cache.kinds = kind_rows
            .into_iter()
            .map(|(id, name)| (Kind::new(name), id))
            .collect();

        let graph_rows: Vec<(i32, String)> = sqlx::query_as(sql::SELECT_GRAPHS)
            .fetch_all(&self.pool)
            .await
            .map_err(GraphError::backend)?;

        cache.graphs = graph_rows
            .into_iter()
            .map(|(id, name)| (name.clone(), GraphDescriptor::new(id, name)))
            .collect();

        for graph in &schema.graphs {
            let descriptor = match cache.graphs.get(&graph.name) {
                Some(descriptor) => descriptor.clone(),
                None => self.define_graph(graph).await?,
            };

            self.reconcile_partitions(graph, &descriptor).await?;

            for kind in graph.node_kinds.iter().chain(graph.edge_kinds.iter()) {
                if !cache.kinds.contains_key(kind) {
                    let id = self.intern_kind(kind).await?;
                    cache.kinds.insert(kind.clone(), id);
                }
            }

            cache.graphs.insert(graph.name.clone(), descriptor);
        }

        Ok(())
    }

    async fn intern_kind(&self, kind: &Kind) -> Result<i16> {
        let inserted: Option<i16> = sqlx::query_scalar(sql::INSERT_KIND)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(GraphError::backend)?;

        if let Some(id) = inserted {
            debug!(kind = %kind, id, "interned kind");
            return Ok(id);
        }

        // Conflict with an existing row: the name is already interned.
        sqlx::query_scalar(sql::SELECT_KIND_BY_NAME)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(GraphError::backend)?
            .ok_or_else(|| GraphError::UnresolvedKind(kind.clone()))
    }

    async fn define_graph(&self, schema: &GraphSchema) -> Result<GraphDescriptor> {
        if let Some(id) = sqlx::query_scalar::<_, i32>(sql::SELECT_GRAPH_BY_NAME)
            .bind(&schema.name)
            .fetch_optional(&self.pool)
            .await
            .map_err(GraphError::backend)?
        {
            return Ok(GraphDescriptor::new(id, schema.name.clone()));
        }

        let id: i32 = sqlx::query_scalar(sql::INSERT_GRAPH)
            .bind(&schema.name)
            .fetch_optional(&self.pool)
            .await
            .map_err(GraphError::backend)?
            .ok_or(GraphError::NoRows)?;

        let descriptor = GraphDescriptor::new(id, schema.name.clone());

        sqlx::query(&sql::partition_sql(sql::NODE_TABLE, id))
            .execute(&self.pool)
            .await
            .map_err(GraphError::backend)?;
        sqlx::query(&sql::partition_sql(sql::EDGE_TABLE, id))
            .execute(&self.pool)
            .await
            .map_err(GraphError::backend)?;

        info!(graph = %schema.name, id, "materialized graph partitions");
        Ok(descriptor)
    }

    async fn fetch_partition(&self, partition: &str) -> Result<PresentPartition> {
        let definitions: Vec<String> = sqlx::query_scalar(sql::SELECT_TABLE_INDEXES)
            .bind(partition)
            .fetch_all(&self.pool)
            .await
            .map_err(GraphError::backend)?;

        let mut present = PresentPartition::new();

        for definition in &definitions {
            match sql::parse_index_definition(definition) {
                Some(parsed) => present.observe(&parsed),
                None => {
                    warn!(definition, "index definition did not match the expected shape");
                }
            }
        }

        Ok(present)
    }

    async fn apply_changes(&self, partition: &str, changes: &IndexChangeSet) -> Result<()> {
        for name in &changes.removals {
            sqlx::query(&sql::drop_index_sql(name))
                .execute(&self.pool)
                .await
                .map_err(GraphError::backend)?;
        }

        for (name, index) in &changes.index_additions {
            sqlx::query(&sql::create_index_sql(
                partition,
                name,
                &index.field,
                index.index_type,
            ))
            .execute(&self.pool)
            .await
            .map_err(GraphError::backend)?;
        }

        for (name, constraint) in &changes.constraint_additions {
            sqlx::query(&sql::create_constraint_sql(partition, name, &constraint.field))
                .execute(&self.pool)
                .await
                .map_err(GraphError::backend)?;
        }

        Ok(())
    }

    async fn reconcile_partitions(
        &self,
        schema: &GraphSchema,
        descriptor: &GraphDescriptor,
    ) -> Result<()> {
        let node_required = RequiredPartition::from_graph(&descriptor.node_partition, schema)?;
        let node_present = self.fetch_partition(&descriptor.node_partition).await?;
        let node_changes = diff_partition(&node_present, &node_required);

        if !node_changes.is_empty() {
            debug!(
                graph = %schema.name,
                removals = node_changes.removals.len(),
                additions =
                    node_changes.index_additions.len() + node_changes.constraint_additions.len(),
                "synchronizing node partition indexes"
            );
            self.apply_changes(&descriptor.node_partition, &node_changes)
                .await?;
        }

        // Edge properties carry no declared indexes; reconciling against the
        // empty requirement set clears any strays left by older definitions.
        let edge_present = self.fetch_partition(&descriptor.edge_partition).await?;
        let edge_changes = diff_partition(&edge_present, &RequiredPartition::empty());

        if !edge_changes.is_empty() {
            self.apply_changes(&descriptor.edge_partition, &edge_changes)
                .await?;
        }

        Ok(())
    }
}
