//! Currencies and the user's enabled currencies. At most one active user currency is main.

use super::{finish, Ledger};
use crate::error::{AppError, DomainError};
use crate::query::{Order, Query};
use crate::record::Row;
use crate::schema::entities::{CURRENCY, USER_CURRENCY};
use crate::store::Executor;
use serde_json::json;

impl Ledger {
    pub async fn list_currencies(&self) -> Result<Vec<Row>, AppError> {
        let mut conn = self.store.acquire().await?;
        self.repo(&CURRENCY)
            .find_many(conn.as_mut(), &Query::new().sort("iso", Order::Asc))
            .await
    }

    /// Active user currencies with their `currency` attached.
    pub async fn list_user_currencies(&self, user: i64) -> Result<Vec<Row>, AppError> {
        let mut conn = self.store.acquire().await?;
        let query = Query::new()
            .eq("user", user)
            .eq("active", true)
            .populate("currency", Query::new().limit(1));
        self.repo(&USER_CURRENCY).find_many(conn.as_mut(), &query).await
    }

    /// Enable `currency` for the user. The first one enabled becomes main; enabling a
    /// currency twice returns the existing row.
    pub async fn add_user_currency(&self, user: i64, currency: i64) -> Result<Row, AppError> {
        let mut tx = self.store.begin().await?;
        let result = self.add_user_currency_in(tx.conn(), user, currency).await;
        finish(tx, result).await
    }

    async fn add_user_currency_in(&self, conn: &mut dyn Executor, user: i64, currency: i64) -> Result<Row, AppError> {
        let repo = self.repo(&USER_CURRENCY);
        let existing = repo
            .find_one(conn, &Query::new().eq("user", user).eq("currency", currency))
            .await?;
        if let Some(row) = existing {
            if row.bool("active") == Some(true) {
                return Ok(row);
            }
            let id = row.id().unwrap_or_default();
            return repo
                .update(conn, id, &json!({ "active": true }))
                .await?
                .ok_or_else(|| AppError::NotFound(format!("user currency {}", id)));
        }
        let has_main = repo
            .find_one(conn, &Query::new().eq("user", user).eq("main", true).eq("active", true))
            .await?
            .is_some();
        let row = repo
            .create(conn, &json!({ "user": user, "currency": currency, "main": !has_main }))
            .await?;
        tracing::info!(user, currency, main = !has_main, "user currency added");
        Ok(row)
    }

    /// The user's main currency with `currency` attached.
    pub async fn main_currency(&self, user: i64) -> Result<Row, AppError> {
        let mut conn = self.store.acquire().await?;
        let query = Query::new()
            .eq("user", user)
            .eq("main", true)
            .eq("active", true)
            .populate("currency", Query::new().limit(1));
        self.repo(&USER_CURRENCY)
            .find_one(conn.as_mut(), &query)
            .await?
            .ok_or_else(|| DomainError::NoMainCurrency(user).into())
    }

    /// Make `user_currency` the user's only main currency.
    pub async fn set_main_currency(&self, user: i64, user_currency: i64) -> Result<Row, AppError> {
        let mut tx = self.store.begin().await?;
        let result = self.set_main_currency_in(tx.conn(), user, user_currency).await;
        finish(tx, result).await
    }

    async fn set_main_currency_in(&self, conn: &mut dyn Executor, user: i64, user_currency: i64) -> Result<Row, AppError> {
        let repo = self.repo(&USER_CURRENCY);
        let target = repo
            .get(conn, user_currency)
            .await?
            .filter(|r| r.i64("user") == Some(user) && r.bool("active") == Some(true))
            .ok_or_else(|| AppError::NotFound(format!("user currency {}", user_currency)))?;
        let mains = repo
            .find_many(conn, &Query::new().eq("user", user).eq("main", true))
            .await?;
        for other in mains.iter().filter_map(Row::id).filter(|id| *id != user_currency) {
            repo.update(conn, other, &json!({ "main": false })).await?;
        }
        if target.bool("main") == Some(true) {
            return Ok(target);
        }
        let row = repo
            .update(conn, user_currency, &json!({ "main": true }))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user currency {}", user_currency)))?;
        tracing::info!(user, user_currency, "main currency changed");
        Ok(row)
    }
}
