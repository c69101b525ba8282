//! Storage boundary. Repositories and the ledger talk to an [`Executor`]; multi-statement
//! operations run inside a [`UnitOfWork`] obtained from a [`Store`]. Rows crossing this
//! boundary are keyed by storage column names.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{ensure_database_exists, PgStore};

use crate::error::AppError;
use crate::query::SelectPlan;
use crate::record::Map;
use crate::schema::EntityDef;
use async_trait::async_trait;

#[async_trait]
pub trait Executor: Send {
    async fn select(&mut self, plan: &SelectPlan) -> Result<Vec<Map>, AppError>;

    /// Insert one row; omitted columns take their declared default. Returns the stored row.
    async fn insert(&mut self, entity: &'static EntityDef, values: &Map) -> Result<Map, AppError>;

    /// Insert unless the row would violate a unique key; `None` when nothing was inserted.
    async fn insert_if_absent(&mut self, entity: &'static EntityDef, values: &Map) -> Result<Option<Map>, AppError>;

    /// Partial update by id. `None` when no row has that id.
    async fn update(
        &mut self,
        entity: &'static EntityDef,
        id: i64,
        values: &Map,
    ) -> Result<Option<Map>, AppError>;

    async fn delete(&mut self, entity: &'static EntityDef, id: i64) -> Result<Option<Map>, AppError>;

    async fn count(&mut self, entity: &'static EntityDef) -> Result<i64, AppError>;

    async fn ping(&mut self) -> Result<(), AppError>;
}

/// Atomic scope: all statements issued through [`UnitOfWork::conn`] commit together or
/// not at all. Dropping without `commit` rolls back.
#[async_trait]
pub trait UnitOfWork: Send {
    fn conn(&mut self) -> &mut dyn Executor;
    async fn commit(self: Box<Self>) -> Result<(), AppError>;
    async fn rollback(self: Box<Self>) -> Result<(), AppError>;
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Connection for single statements, each applied on its own.
    async fn acquire(&self) -> Result<Box<dyn Executor>, AppError>;
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, AppError>;
}
