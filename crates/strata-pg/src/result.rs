//! Row cursor and native-shape conversion for the relational backend.
//!
//! Postgres rows are self-describing through the column type catalog, so
//! conversion dispatches on the declared type name: arrays and JSONB are
//! recognized here, and JSONB contents delegate to the shared base table.

use std::collections::VecDeque;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Column, Row, TypeInfo};

use strata_core::{Cursor, GraphError, Result, Wire};

/// Cursor over the fully-buffered rows of one executed statement.
pub struct PgCursor {
    rows: VecDeque<PgRow>,
    current: Option<PgRow>,
}

impl PgCursor {
    pub fn new(rows: Vec<PgRow>) -> Self {
        PgCursor {
            rows: rows.into(),
            current: None,
        }
    }
}

#[async_trait]
impl Cursor for PgCursor {
    async fn advance(&mut self) -> Result<bool> {
        self.current = self.rows.pop_front();
        Ok(self.current.is_some())
    }

    fn wire(&self, column: &str) -> Result<Wire> {
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| GraphError::Backend(anyhow!("cursor is not positioned on a row")))?;

        let index = row
            .columns()
            .iter()
            .position(|candidate| candidate.name() == column)
            .ok_or_else(|| GraphError::Backend(anyhow!("result has no column named {column:?}")))?;

        wire_from_row(row, index)
    }

    fn close(&mut self) {
        self.rows.clear();
        self.current = None;
    }
}

fn decode<'r, T>(row: &'r PgRow, index: usize) -> Result<Option<T>>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get::<Option<T>, _>(index)
        .map_err(GraphError::backend)
}

/// Convert one column of a row into an untyped wire value, dispatching on
/// the column's declared type.
pub fn wire_from_row(row: &PgRow, index: usize) -> Result<Wire> {
    let type_name = row.columns()[index].type_info().name().to_uppercase();

    let wire = match type_name.as_str() {
        "BOOL" => decode::<bool>(row, index)?.map(Wire::Bool),
        "INT2" => decode::<i16>(row, index)?.map(|v| Wire::Int(v.into())),
        "INT4" => decode::<i32>(row, index)?.map(|v| Wire::Int(v.into())),
        "INT8" => decode::<i64>(row, index)?.map(Wire::Int),
        "FLOAT4" => decode::<f32>(row, index)?.map(|v| Wire::Float(v.into())),
        "FLOAT8" => decode::<f64>(row, index)?.map(Wire::Float),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => decode::<String>(row, index)?.map(Wire::String),
        "TIMESTAMPTZ" => decode::<DateTime<Utc>>(row, index)?.map(Wire::Time),
        "TIMESTAMP" => decode::<NaiveDateTime>(row, index)?.map(|v| Wire::Time(v.and_utc())),
        "JSON" | "JSONB" => {
            decode::<serde_json::Value>(row, index)?.map(|v| Wire::from_json(&v))
        }
        "INT2[]" => decode::<Vec<i16>>(row, index)?
            .map(|v| Wire::List(v.into_iter().map(|i| Wire::Int(i.into())).collect())),
        "INT4[]" => decode::<Vec<i32>>(row, index)?
            .map(|v| Wire::List(v.into_iter().map(|i| Wire::Int(i.into())).collect())),
        "INT8[]" => decode::<Vec<i64>>(row, index)?
            .map(|v| Wire::List(v.into_iter().map(Wire::Int).collect())),
        "TEXT[]" | "VARCHAR[]" => decode::<Vec<String>>(row, index)?
            .map(|v| Wire::List(v.into_iter().map(Wire::String).collect())),
        other => {
            return Err(GraphError::TypeMismatch {
                observed: other.to_lowercase(),
                requested: "wire value",
            })
        }
    };

    Ok(wire.unwrap_or(Wire::Null))
}
