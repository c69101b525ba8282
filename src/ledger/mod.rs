//! Ledger and snapshot protocol. Every multi-row operation runs in one unit of work: it
//! commits as a whole or is rolled back.

mod accounts;
mod budgets;
mod currencies;
mod snapshots;
mod transactions;
mod wallets;

pub mod period;

pub use snapshots::{BankStatement, StatementSource, StatementWallet};
pub use wallets::{StatementLine, WalletStatement};

use crate::error::AppError;
use crate::schema::{EntityDef, SchemaModel};
use crate::service::Repository;
use crate::store::{Store, UnitOfWork};
use std::sync::Arc;

#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn Store>,
    model: Arc<SchemaModel>,
}

impl Ledger {
    pub fn new(store: Arc<dyn Store>, model: Arc<SchemaModel>) -> Self {
        Ledger { store, model }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn model(&self) -> &SchemaModel {
        &self.model
    }

    fn repo(&self, entity: &'static EntityDef) -> Repository<'_> {
        Repository::of(&self.model, entity)
    }
}

/// Commit on success, roll back on error. The operation's error wins over a failed rollback.
pub(crate) async fn finish<T>(tx: Box<dyn UnitOfWork>, result: Result<T, AppError>) -> Result<T, AppError> {
    match result {
        Ok(v) => {
            tx.commit().await?;
            Ok(v)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                tracing::error!(error = %rb, "rollback failed");
            }
            Err(e)
        }
    }
}
