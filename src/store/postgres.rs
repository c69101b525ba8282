//! PostgreSQL backend: pooled connections for single statements, one database transaction
//! per unit of work.

use super::{Executor, Store, UnitOfWork};
use crate::error::AppError;
use crate::query::SelectPlan;
use crate::record::Map;
use crate::schema::{ColumnKind, EntityDef};
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{ConnectOptions, PgConnection, PgPool, Postgres, Row, Transaction};
use std::ops::DerefMut;
use std::str::FromStr;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    schema: String,
}

impl PgStore {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        PgStore {
            pool,
            schema: schema.into(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn acquire(&self) -> Result<Box<dyn Executor>, AppError> {
        let conn = self.pool.acquire().await?;
        Ok(Box::new(PgSession {
            conn,
            schema: self.schema.clone(),
        }))
    }

    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgSession {
            conn: tx,
            schema: self.schema.clone(),
        }))
    }
}

/// A pooled connection or an open transaction, both deref to the raw connection.
struct PgSession<C> {
    conn: C,
    schema: String,
}

#[async_trait]
impl<C> Executor for PgSession<C>
where
    C: DerefMut<Target = PgConnection> + Send,
{
    async fn select(&mut self, plan: &SelectPlan) -> Result<Vec<Map>, AppError> {
        let q = sql::select(&self.schema, plan);
        let rows = fetch_all(&mut self.conn, &q).await?;
        rows.iter().map(|r| decode_row(plan.entity, r)).collect()
    }

    async fn insert(&mut self, entity: &'static EntityDef, values: &Map) -> Result<Map, AppError> {
        let q = sql::insert(&self.schema, entity, values);
        let rows = fetch_all(&mut self.conn, &q).await?;
        let row = rows.first().ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
        decode_row(entity, row)
    }

    async fn insert_if_absent(&mut self, entity: &'static EntityDef, values: &Map) -> Result<Option<Map>, AppError> {
        let q = sql::insert_if_absent(&self.schema, entity, values);
        let rows = fetch_all(&mut self.conn, &q).await?;
        rows.first().map(|r| decode_row(entity, r)).transpose()
    }

    async fn update(
        &mut self,
        entity: &'static EntityDef,
        id: i64,
        values: &Map,
    ) -> Result<Option<Map>, AppError> {
        let q = sql::update(&self.schema, entity, id, values);
        let rows = fetch_all(&mut self.conn, &q).await?;
        rows.first().map(|r| decode_row(entity, r)).transpose()
    }

    async fn delete(&mut self, entity: &'static EntityDef, id: i64) -> Result<Option<Map>, AppError> {
        let q = sql::delete(&self.schema, entity, id);
        let rows = fetch_all(&mut self.conn, &q).await?;
        rows.first().map(|r| decode_row(entity, r)).transpose()
    }

    async fn count(&mut self, entity: &'static EntityDef) -> Result<i64, AppError> {
        let q = sql::count(&self.schema, entity);
        tracing::debug!(sql = %q.sql, "query");
        let n: i64 = sqlx::query_scalar(&q.sql).fetch_one(&mut *self.conn).await?;
        Ok(n)
    }

    async fn ping(&mut self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&mut *self.conn).await?;
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for PgSession<Transaction<'static, Postgres>> {
    fn conn(&mut self) -> &mut dyn Executor {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let session = *self;
        session.conn.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        let session = *self;
        session.conn.rollback().await?;
        Ok(())
    }
}

async fn fetch_all<C>(conn: &mut C, q: &QueryBuf) -> Result<Vec<PgRow>, AppError>
where
    C: DerefMut<Target = PgConnection> + Send,
{
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(PgBindValue::from_json(p));
    }
    Ok(query.fetch_all(&mut **conn).await?)
}

/// Decode by declared column kind, keyed by column name.
fn decode_row(entity: &EntityDef, row: &PgRow) -> Result<Map, AppError> {
    let mut map = Map::new();
    for c in entity.columns {
        let name = c.column;
        let v = match c.kind {
            ColumnKind::Id | ColumnKind::BigInt => row.try_get::<Option<i64>, _>(name)?.map(Value::from),
            ColumnKind::Float => row
                .try_get::<Option<f64>, _>(name)?
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            ColumnKind::Bool => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
            ColumnKind::Text => row.try_get::<Option<String>, _>(name)?.map(Value::String),
            ColumnKind::Date => row
                .try_get::<Option<NaiveDate>, _>(name)?
                .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
            ColumnKind::Timestamp => row
                .try_get::<Option<DateTime<Utc>>, _>(name)?
                .map(|t| Value::String(t.to_rfc3339_opts(SecondsFormat::Micros, true))),
        };
        map.insert(name.to_string(), v.unwrap_or(Value::Null));
    }
    Ok(map)
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::Storage(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| AppError::Storage("DATABASE_URL: no path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_url_targets_postgres_database() {
        let (admin, name) = parse_db_name_from_url("postgres://u:p@localhost:5432/monarch?sslmode=disable").unwrap();
        assert_eq!(admin, "postgres://u:p@localhost:5432/postgres");
        assert_eq!(name, "monarch");
    }
}
