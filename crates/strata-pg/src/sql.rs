//! Statement text, DDL, and catalog introspection helpers for the
//! relational backend.

use std::sync::OnceLock;

use regex::Regex;

use strata_core::{GraphError, IndexType, Parameters, Result, Value};

pub const NODE_TABLE: &str = "node";
pub const EDGE_TABLE: &str = "edge";

/// Base physical schema. Executed by `assert_schema` before reconciliation;
/// every statement is idempotent.
pub const SCHEMA_UP: &str = r#"
create extension if not exists pg_trgm;

create table if not exists graph (
    id serial,
    name varchar(256) not null,

    primary key (id),
    unique (name)
);

create table if not exists kind (
    id smallserial,
    name varchar(256) not null,

    primary key (id),
    unique (name)
);

create table if not exists node (
    id serial,
    graph_id integer not null references graph(id),
    kind_ids smallint[8] not null,
    properties jsonb not null,

    primary key (id, graph_id)
) partition by list (graph_id);

alter table node alter column properties set storage main;

create index if not exists node_graph_id_index on node using btree (graph_id);
create index if not exists node_kind_ids_index on node using gin (kind_ids);

create table if not exists edge (
    id serial,
    graph_id integer not null references graph(id),
    start_id integer not null,
    end_id integer not null,
    kind_id smallint not null,
    properties jsonb not null,

    primary key (id, graph_id)
) partition by list (graph_id);

alter table edge alter column properties set storage main;

create index if not exists edge_graph_id_index on edge using btree (graph_id);
create index if not exists edge_start_id_index on edge using btree (start_id);
create index if not exists edge_end_id_index on edge using btree (end_id);
create index if not exists edge_kind_index on edge using btree (kind_id);
"#;

pub const SELECT_GRAPHS: &str = "select id, name from graph";
pub const SELECT_GRAPH_BY_NAME: &str = "select id from graph where name = $1";
pub const INSERT_GRAPH: &str =
    "insert into graph (name) values ($1) on conflict (name) do nothing returning id";
pub const SELECT_KINDS: &str = "select id, name from kind";
pub const SELECT_KIND_BY_NAME: &str = "select id from kind where name = $1";
pub const INSERT_KIND: &str =
    "insert into kind (name) values ($1) on conflict (name) do nothing returning id";
pub const SELECT_TABLE_INDEXES: &str =
    "select indexdef from pg_catalog.pg_indexes where tablename = $1";

const INDEX_TYPE_BTREE: &str = "btree";
const INDEX_TYPE_GIN: &str = "gin";
pub const PROPERTIES_COLUMN: &str = "properties";

pub fn partition_name(parent: &str, graph_id: i32) -> String {
    format!("{parent}_{graph_id}")
}

pub fn partition_sql(parent: &str, graph_id: i32) -> String {
    format!(
        "create table {parent}_{graph_id} partition of {parent} for values in ({graph_id})"
    )
}

pub fn index_type_sql(index_type: IndexType) -> &'static str {
    match index_type {
        IndexType::BTree => INDEX_TYPE_BTREE,
        IndexType::FullText => INDEX_TYPE_GIN,
    }
}

pub fn parse_index_type(method: &str) -> Option<IndexType> {
    match method.to_lowercase().as_str() {
        INDEX_TYPE_BTREE => Some(IndexType::BTree),
        INDEX_TYPE_GIN => Some(IndexType::FullText),
        _ => None,
    }
}

pub fn drop_index_sql(name: &str) -> String {
    format!("drop index if exists {name}")
}

/// Functional index over one property field. GIN text search requires the
/// expression to carry the trigram operator class.
pub fn create_index_sql(
    partition: &str,
    name: &str,
    field: &str,
    index_type: IndexType,
) -> String {
    match index_type {
        IndexType::BTree => format!(
            "create index {name} on {partition} using btree (({partition}.{PROPERTIES_COLUMN}->>'{field}'))"
        ),
        IndexType::FullText => format!(
            "create index {name} on {partition} using gin (({partition}.{PROPERTIES_COLUMN}->>'{field}') gin_trgm_ops)"
        ),
    }
}

/// Unique functional index backing a constraint. Only B-tree uniqueness is
/// expressible; full-text constraints are rejected before reaching here.
pub fn create_constraint_sql(partition: &str, name: &str, field: &str) -> String {
    format!(
        "create unique index {name} on {partition} using btree (({partition}.{PROPERTIES_COLUMN}->>'{field}'))"
    )
}

/// One `CREATE INDEX` catalog definition, decomposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedIndex {
    pub unique: bool,
    pub name: String,
    pub method: String,
    pub fields: String,
}

fn index_definition_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)^CREATE (UNIQUE)? ?INDEX ([^ ]+).+USING ([^ ]+) \(([^)]+)\)$")
            .unwrap()
    })
}

/// Decompose a `pg_indexes.indexdef` row. Definitions that do not match the
/// expected shape (e.g. backend-default indexes) yield `None` and are
/// skipped by the caller, not treated as introspection failure.
pub fn parse_index_definition(definition: &str) -> Option<ParsedIndex> {
    let captures = index_definition_regex().captures(definition)?;

    Some(ParsedIndex {
        unique: captures
            .get(1)
            .map(|m| m.as_str().eq_ignore_ascii_case("unique"))
            .unwrap_or(false),
        name: captures.get(2)?.as_str().to_string(),
        method: captures.get(3)?.as_str().to_string(),
        fields: captures.get(4)?.as_str().to_string(),
    })
}

fn named_parameter_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"@([A-Za-z_][A-Za-z0-9_]*)").unwrap())
}

/// Rewrite `@name` placeholders into positional `$n` binds, returning the
/// rewritten statement and the values in bind order. Repeated references to
/// one parameter share a single bind slot.
pub fn render_named(statement: &str, parameters: &Parameters) -> Result<(String, Vec<Value>)> {
    let mut rendered = String::with_capacity(statement.len());
    let mut order: Vec<(String, Value)> = Vec::new();
    let mut last_end = 0;

    for captures in named_parameter_regex().captures_iter(statement) {
        let whole = captures.get(0).expect("capture 0 is the whole match");
        let name = &captures[1];

        let position = match order.iter().position(|(bound, _)| bound == name) {
            Some(position) => position,
            None => {
                let value = parameters
                    .get(name)
                    .cloned()
                    .ok_or_else(|| GraphError::MissingParameter(name.to_string()))?;
                order.push((name.to_string(), value));
                order.len() - 1
            }
        };

        rendered.push_str(&statement[last_end..whole.start()]);
        rendered.push_str(&format!("${}", position + 1));
        last_end = whole.end();
    }

    rendered.push_str(&statement[last_end..]);
    Ok((rendered, order.into_iter().map(|(_, value)| value).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_sql_matches_backend_syntax() {
        assert_eq!(
            partition_sql(NODE_TABLE, 1),
            "create table node_1 partition of node for values in (1)"
        );
        assert_eq!(
            partition_sql(EDGE_TABLE, 1),
            "create table edge_1 partition of edge for values in (1)"
        );
    }

    #[test]
    fn parses_unique_and_plain_index_definitions() {
        let plain = parse_index_definition(
            "CREATE INDEX node_1_name_index ON public.node_1 USING btree (((properties ->> 'name'::text)))",
        )
        .unwrap();
        assert!(!plain.unique);
        assert_eq!(plain.name, "node_1_name_index");
        assert_eq!(plain.method, "btree");
        assert!(plain.fields.contains(PROPERTIES_COLUMN));

        let unique = parse_index_definition(
            "CREATE UNIQUE INDEX node_1_object_id_constraint ON public.node_1 USING btree (((properties ->> 'object_id'::text)))",
        )
        .unwrap();
        assert!(unique.unique);
        assert_eq!(unique.method, "btree");
    }

    #[test]
    fn unparseable_definitions_are_skipped_not_failed() {
        assert!(parse_index_definition("CREATE STATISTICS something ON node_1").is_none());
    }

    #[test]
    fn gin_definitions_map_to_full_text() {
        assert_eq!(parse_index_type("gin"), Some(IndexType::FullText));
        assert_eq!(parse_index_type("BTREE"), Some(IndexType::BTree));
        assert_eq!(parse_index_type("gist"), None);
    }

    #[test]
    fn named_binds_rewrite_to_positional() {
        let mut parameters = Parameters::new();
        parameters.insert("name".to_string(), Value::from("alice"));
        parameters.insert("graph_id".to_string(), Value::from(1i64));

        let (sql, values) = render_named(
            "select id from node where graph_id = @graph_id and properties->>'name' = @name and properties->>'alias' = @name",
            &parameters,
        )
        .unwrap();

        assert_eq!(
            sql,
            "select id from node where graph_id = $1 and properties->>'name' = $2 and properties->>'alias' = $2"
        );
        assert_eq!(values, vec![Value::from(1i64), Value::from("alice")]);
    }

    #[test]
    fn unbound_named_parameters_are_reported() {
        let err = render_named("select @missing", &Parameters::new()).unwrap_err();
        assert!(matches!(err, GraphError::MissingParameter(name) if name == "missing"));
    }

    #[test]
    fn operators_with_at_signs_are_left_alone() {
        let (sql, values) =
            render_named("select properties @> '{}' from node", &Parameters::new()).unwrap();
        assert_eq!(sql, "select properties @> '{}' from node");
        assert!(values.is_empty());
    }
}
