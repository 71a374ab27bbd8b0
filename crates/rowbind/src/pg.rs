//! PostgreSQL adapter backed by sqlx.
//!
//! Implements the balancer's [`Pool`] contract for [`sqlx::PgPool`] and
//! adapts buffered `PgRow` result sets to the engine's [`RowSource`].
//! Column values are decoded by Postgres type name into the crate's
//! driver-agnostic [`Value`] model.

use std::collections::VecDeque;

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Column, PgPool, Postgres, Row, TypeInfo};

use crate::balancer::{AccessMode, Pool, TxHandle, TxOptions};
use crate::error::{Error, Result};
use crate::source::{RowSource, SlotMap};
use crate::value::Value;

// =============================================================================
// Row decoding
// =============================================================================

/// A fully buffered Postgres result set.
pub struct PgRows {
    columns: Vec<String>,
    rows: VecDeque<PgRow>,
    current: Option<PgRow>,
}

impl PgRows {
    fn from_rows(rows: Vec<PgRow>) -> Self {
        let columns = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|col| col.name().to_owned())
                    .collect()
            })
            .unwrap_or_default();
        Self {
            columns,
            rows: rows.into(),
            current: None,
        }
    }
}

impl RowSource for PgRows {
    fn advance(&mut self) -> bool {
        self.current = self.rows.pop_front();
        self.current.is_some()
    }

    fn columns(&self) -> std::result::Result<Vec<String>, crate::error::SourceError> {
        Ok(self.columns.clone())
    }

    fn scan_into(&mut self, slots: &mut dyn SlotMap) -> Result<()> {
        let Some(row) = self.current.take() else {
            return Err(Error::driver("scan requested with no current row"));
        };
        for index in 0..slots.len() {
            let value = decode_column(&row, index)?;
            slots
                .slot_at(index)?
                .put(value)
                .map_err(|source| Error::Decode {
                    column: self.columns[index].clone(),
                    source,
                })?;
        }
        Ok(())
    }

    fn final_error(&mut self) -> Option<crate::error::SourceError> {
        // Buffered result sets surface iteration errors at query time.
        None
    }

    fn close(&mut self) -> std::result::Result<(), crate::error::SourceError> {
        self.rows.clear();
        self.current = None;
        Ok(())
    }
}

fn decode_column(row: &PgRow, index: usize) -> Result<Value> {
    let type_name = row.columns()[index].type_info().name().to_owned();
    let value = match type_name.as_str() {
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(Value::Bool),
        "INT2" => row.try_get::<Option<i16>, _>(index)?.map(Value::Int16),
        "INT4" => row.try_get::<Option<i32>, _>(index)?.map(Value::Int32),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.map(Value::Int64),
        "FLOAT4" => row.try_get::<Option<f32>, _>(index)?.map(Value::Float32),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(Value::Float64),
        "BYTEA" => row.try_get::<Option<Vec<u8>>, _>(index)?.map(Value::Bytes),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(index)?
            .map(Value::Uuid),
        "JSON" | "JSONB" => row
            .try_get::<Option<serde_json::Value>, _>(index)?
            .map(Value::Json),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)?
            .map(Value::Date),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)?
            .map(Value::Timestamp),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)?
            .map(Value::TimestampTz),
        // TEXT, VARCHAR, BPCHAR, NAME and anything else textual.
        _ => row.try_get::<Option<String>, _>(index)?.map(Value::Text),
    };
    Ok(value.unwrap_or(Value::Null))
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::driver(err)
    }
}

// =============================================================================
// Statement execution
// =============================================================================

fn bind_value<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    value: Value,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(v),
        Value::Int16(v) => query.bind(v),
        Value::Int32(v) => query.bind(v),
        Value::Int64(v) => query.bind(v),
        Value::Float32(v) => query.bind(v),
        Value::Float64(v) => query.bind(v),
        Value::Text(v) => query.bind(v),
        Value::Bytes(v) => query.bind(v),
        Value::Date(v) => query.bind(v),
        Value::Timestamp(v) => query.bind(v),
        Value::TimestampTz(v) => query.bind(v),
        Value::Uuid(v) => query.bind(v),
        Value::Json(v) => query.bind(sqlx::types::Json(v)),
    }
}

fn build_query(sql: &str, args: Vec<Value>) -> sqlx::query::Query<'_, Postgres, PgArguments> {
    let mut query = sqlx::query(sql);
    for value in args {
        query = bind_value(query, value);
    }
    query
}

/// One live Postgres transaction.
pub struct PgTx {
    inner: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl TxHandle for PgTx {
    type Rows = PgRows;

    async fn execute(&mut self, sql: &str, args: Vec<Value>) -> Result<u64> {
        let result = build_query(sql, args).execute(&mut *self.inner).await?;
        Ok(result.rows_affected())
    }

    async fn query(&mut self, sql: &str, args: Vec<Value>) -> Result<Self::Rows> {
        let rows = build_query(sql, args).fetch_all(&mut *self.inner).await?;
        Ok(PgRows::from_rows(rows))
    }

    async fn commit(self) -> Result<()> {
        self.inner.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.inner.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl Pool for PgPool {
    type Tx = PgTx;
    type Rows = PgRows;

    async fn begin(&self, options: TxOptions) -> Result<Self::Tx> {
        let mut tx = PgPool::begin(self).await?;
        if options.access_mode == AccessMode::ReadOnly {
            sqlx::query("SET TRANSACTION READ ONLY")
                .execute(&mut *tx)
                .await?;
        }
        Ok(PgTx { inner: tx })
    }

    async fn execute(&self, sql: &str, args: Vec<Value>) -> Result<u64> {
        let result = build_query(sql, args).execute(self).await?;
        Ok(result.rows_affected())
    }

    async fn query(&self, sql: &str, args: Vec<Value>) -> Result<Self::Rows> {
        let rows = build_query(sql, args).fetch_all(self).await?;
        Ok(PgRows::from_rows(rows))
    }
}
