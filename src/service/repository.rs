//! Generic entity repository: descriptor-driven reads and field-mapped writes for one table.

use super::resolver;
use crate::error::AppError;
use crate::query::{Query, SelectPlan};
use crate::record::{Found, Map, Row};
use crate::schema::{EntityDef, SchemaModel};
use crate::store::Executor;
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Copy)]
pub struct Repository<'m> {
    model: &'m SchemaModel,
    entity: &'static EntityDef,
}

impl<'m> Repository<'m> {
    /// Repository for a table by name; unknown tables are a schema mismatch.
    pub fn new(model: &'m SchemaModel, table: &str) -> Result<Self, AppError> {
        Ok(Repository {
            model,
            entity: model.require(table)?,
        })
    }

    pub fn of(model: &'m SchemaModel, entity: &'static EntityDef) -> Self {
        Repository { model, entity }
    }

    pub fn entity(&self) -> &'static EntityDef {
        self.entity
    }

    /// Insert and return the new id.
    pub async fn insert<T: Serialize + Sync>(&self, conn: &mut dyn Executor, record: &T) -> Result<i64, AppError> {
        let row = self.create(conn, record).await?;
        row.id()
            .ok_or_else(|| AppError::Storage(format!("insert into {} returned no id", self.entity.table)))
    }

    /// Insert and return the stored row, defaults included.
    pub async fn create<T: Serialize + Sync>(&self, conn: &mut dyn Executor, record: &T) -> Result<Row, AppError> {
        let values = self.to_columns(record)?;
        let stored = conn
            .insert(self.entity, &values)
            .await
            .map_err(|e| self.fault("create", e))?;
        Ok(self.to_row(stored))
    }

    /// Insert unless a unique key already holds the values. `None` when nothing was inserted.
    pub async fn create_if_absent<T: Serialize + Sync>(
        &self,
        conn: &mut dyn Executor,
        record: &T,
    ) -> Result<Option<Row>, AppError> {
        let values = self.to_columns(record)?;
        let stored = conn
            .insert_if_absent(self.entity, &values)
            .await
            .map_err(|e| self.fault("create", e))?;
        Ok(stored.map(|r| self.to_row(r)))
    }

    /// Rows matching `query`, relations populated. `limit = 1` yields [`Found::One`].
    pub async fn find(&self, conn: &mut dyn Executor, query: &Query) -> Result<Found, AppError> {
        let rows = self.find_rows(conn, query).await?;
        Ok(if query.is_single() {
            Found::One(rows.into_iter().next())
        } else {
            Found::Many(rows)
        })
    }

    pub async fn find_one(&self, conn: &mut dyn Executor, query: &Query) -> Result<Option<Row>, AppError> {
        let mut query = query.clone();
        query.limit = Some(1);
        Ok(self.find_rows(conn, &query).await?.into_iter().next())
    }

    pub async fn find_many(&self, conn: &mut dyn Executor, query: &Query) -> Result<Vec<Row>, AppError> {
        self.find_rows(conn, query).await
    }

    pub async fn get(&self, conn: &mut dyn Executor, id: i64) -> Result<Option<Row>, AppError> {
        self.find_one(conn, &Query::by_id(id)).await
    }

    /// Read one row by id and hold a row lock on it for the rest of the unit of work.
    pub async fn lock(&self, conn: &mut dyn Executor, id: i64) -> Result<Option<Row>, AppError> {
        let plan = SelectPlan::from_query(self.entity, &Query::by_id(id))?.for_update();
        let rows = conn.select(&plan).await.map_err(|e| self.fault("lock", e))?;
        Ok(rows.into_iter().next().map(|r| self.to_row(r)))
    }

    /// Partial update by id. `None` when the row does not exist.
    pub async fn update<T: Serialize + Sync>(
        &self,
        conn: &mut dyn Executor,
        id: i64,
        record: &T,
    ) -> Result<Option<Row>, AppError> {
        let values = self.to_columns(record)?;
        let stored = conn
            .update(self.entity, id, &values)
            .await
            .map_err(|e| self.fault("update", e))?;
        Ok(stored.map(|r| self.to_row(r)))
    }

    pub async fn count(&self, conn: &mut dyn Executor) -> Result<i64, AppError> {
        conn.count(self.entity).await.map_err(|e| self.fault("count", e))
    }

    pub async fn delete_one(&self, conn: &mut dyn Executor, id: i64) -> Result<Option<Row>, AppError> {
        let gone = conn
            .delete(self.entity, id)
            .await
            .map_err(|e| self.fault("delete", e))?;
        Ok(gone.map(|r| self.to_row(r)))
    }

    /// Select without populating; used by the resolver for related rows.
    pub(crate) async fn select(&self, conn: &mut dyn Executor, query: &Query) -> Result<Vec<Row>, AppError> {
        let plan = SelectPlan::from_query(self.entity, query)?;
        let rows = conn.select(&plan).await.map_err(|e| self.fault("find", e))?;
        Ok(rows.into_iter().map(|r| self.to_row(r)).collect())
    }

    async fn find_rows(&self, conn: &mut dyn Executor, query: &Query) -> Result<Vec<Row>, AppError> {
        resolver::check(self.model, self.entity, &query.populate)?;
        let mut rows = self.select(conn, query).await?;
        resolver::populate(self.model, self.entity, conn, &mut rows, &query.populate).await?;
        Ok(rows)
    }

    /// API field names to storage columns. Unknown fields are rejected.
    fn to_columns<T: Serialize>(&self, record: &T) -> Result<Map, AppError> {
        let Value::Object(fields) = serde_json::to_value(record)? else {
            return Err(AppError::SchemaMismatch(format!(
                "record for '{}' must be an object",
                self.entity.table
            )));
        };
        let mut values = Map::new();
        for (field, v) in fields {
            let column = self.model.field(self.entity, &field)?;
            values.insert(column.column.to_string(), v);
        }
        Ok(values)
    }

    fn to_row(&self, stored: Map) -> Row {
        let mut fields = Map::new();
        for (column, v) in stored {
            let field = self
                .entity
                .column_by_name(&column)
                .map(|c| c.field.to_string())
                .unwrap_or(column);
            fields.insert(field, v);
        }
        Row::new(fields)
    }

    fn fault(&self, operation: &'static str, e: AppError) -> AppError {
        if e.is_storage_fault() {
            tracing::error!(operation, table = self.entity.table, error = %e, "storage fault");
        }
        e
    }
}
