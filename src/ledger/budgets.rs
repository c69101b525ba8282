//! Categories and their versioned budgets. Budgets are append-only: the current one is the
//! most recently created.

use super::period::{backup_anchor, end_of_day};
use super::snapshots::find_or_create_backup;
use super::{finish, Ledger};
use crate::error::AppError;
use crate::models::{BudgetPlanItem, Category, CategoryEdit, NewCategory};
use crate::query::{Op, Order, Query};
use crate::record::{Map, Related, Row};
use crate::schema::entities::{BUDGET, CATEGORY, CATEGORY_BACKUP, GROUP};
use crate::store::Executor;
use chrono::NaiveDate;
use serde_json::{json, Value};

impl Ledger {
    /// Create a category with its first budget and an empty CategoryBackup in the backup
    /// anchoring `today`'s month. Returns the category with `budget` attached.
    pub async fn create_category(&self, input: &NewCategory, today: NaiveDate) -> Result<Row, AppError> {
        let mut tx = self.store.begin().await?;
        let result = self.create_category_in(tx.conn(), input, today).await;
        finish(tx, result).await
    }

    async fn create_category_in(
        &self,
        conn: &mut dyn Executor,
        input: &NewCategory,
        today: NaiveDate,
    ) -> Result<Row, AppError> {
        if input.budget < 0 {
            return Err(AppError::Validation("budget amount must not be negative".into()));
        }
        let group = self
            .repo(&GROUP)
            .get(conn, input.group)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("group {}", input.group)))?;
        let user = group
            .i64("user")
            .ok_or_else(|| AppError::NotFound(format!("owner of group {}", input.group)))?;

        let mut category = self
            .repo(&CATEGORY)
            .create(
                conn,
                &json!({
                    "name": input.name,
                    "accumulates": input.accumulates,
                    "type": input.kind.as_str(),
                    "group": input.group,
                }),
            )
            .await?;
        let id = category.id().unwrap_or_default();
        let budget = self
            .repo(&BUDGET)
            .create(conn, &json!({ "amount": input.budget, "category": id }))
            .await?;

        let backup = find_or_create_backup(self, conn, user, backup_anchor(today)).await?;
        let accumulated = if input.accumulates { Value::from(0) } else { Value::Null };
        self.repo(&CATEGORY_BACKUP)
            .create(
                conn,
                &json!({ "spent": 0, "accumulated": accumulated, "category": id, "backup": backup.id() }),
            )
            .await?;

        tracing::info!(category = id, budget = input.budget, "category created");
        category
            .relations
            .insert("budget".into(), Related::One(Some(Box::new(budget))));
        Ok(category)
    }

    /// Update the fields that differ from the stored category. A budget row is appended only
    /// when the requested amount differs from the current one.
    pub async fn edit_category(&self, id: i64, edit: &CategoryEdit) -> Result<Row, AppError> {
        let mut tx = self.store.begin().await?;
        let result = self.edit_category_in(tx.conn(), id, edit).await;
        finish(tx, result).await
    }

    async fn edit_category_in(&self, conn: &mut dyn Executor, id: i64, edit: &CategoryEdit) -> Result<Row, AppError> {
        let stored = self
            .repo(&CATEGORY)
            .get(conn, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("category {}", id)))?;
        let current: Category = stored.decode()?;

        let mut changes = Map::new();
        if let Some(name) = edit.name.as_ref().filter(|n| **n != current.name) {
            changes.insert("name".into(), Value::from(name.as_str()));
        }
        if let Some(accumulates) = edit.accumulates.filter(|a| *a != current.accumulates) {
            changes.insert("accumulates".into(), Value::from(accumulates));
        }
        if let Some(kind) = edit.kind.filter(|k| *k != current.kind) {
            changes.insert("type".into(), Value::from(kind.as_str()));
        }
        if let Some(group) = edit.group.filter(|g| *g != current.group) {
            changes.insert("group".into(), Value::from(group));
        }
        let mut row = if changes.is_empty() {
            stored
        } else {
            self.repo(&CATEGORY)
                .update(conn, id, &changes)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("category {}", id)))?
        };

        let mut budget = self.current_budget_in(conn, id).await?;
        if let Some(amount) = edit.budget {
            if amount < 0 {
                return Err(AppError::Validation("budget amount must not be negative".into()));
            }
            if budget.as_ref().and_then(|b| b.i64("amount")) != Some(amount) {
                budget = Some(
                    self.repo(&BUDGET)
                        .create(conn, &json!({ "amount": amount, "category": id }))
                        .await?,
                );
                tracing::info!(category = id, amount, "budget appended");
            }
        }
        tracing::debug!(category = id, changed = changes.len(), "category edited");
        row.relations
            .insert("budget".into(), Related::One(budget.map(Box::new)));
        Ok(row)
    }

    /// Apply a whole budget plan in one unit of work: items with an id edit that category,
    /// the others create one. Any failure leaves every category as it was.
    pub async fn apply_budget_plan(&self, items: &[BudgetPlanItem], today: NaiveDate) -> Result<Vec<Row>, AppError> {
        let mut tx = self.store.begin().await?;
        let result = self.apply_budget_plan_in(tx.conn(), items, today).await;
        finish(tx, result).await
    }

    async fn apply_budget_plan_in(
        &self,
        conn: &mut dyn Executor,
        items: &[BudgetPlanItem],
        today: NaiveDate,
    ) -> Result<Vec<Row>, AppError> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let row = match item.id {
                Some(id) => {
                    let edit = CategoryEdit {
                        name: Some(item.name.clone()),
                        accumulates: Some(item.accumulates),
                        kind: Some(item.kind),
                        group: Some(item.group),
                        budget: Some(item.budget),
                    };
                    self.edit_category_in(conn, id, &edit).await?
                }
                None => {
                    let input = NewCategory {
                        name: item.name.clone(),
                        accumulates: item.accumulates,
                        kind: item.kind,
                        group: item.group,
                        budget: item.budget,
                    };
                    self.create_category_in(conn, &input, today).await?
                }
            };
            out.push(row);
        }
        tracing::info!(items = out.len(), "budget plan applied");
        Ok(out)
    }

    /// The category's most recently created budget.
    pub async fn current_budget(&self, category: i64) -> Result<Option<Row>, AppError> {
        let mut conn = self.store.acquire().await?;
        self.current_budget_in(conn.as_mut(), category).await
    }

    pub(crate) async fn current_budget_in(&self, conn: &mut dyn Executor, category: i64) -> Result<Option<Row>, AppError> {
        let query = Query::new()
            .eq("category", category)
            .sort("createdAt", Order::Desc)
            .limit(1);
        self.repo(&BUDGET).find_one(conn, &query).await
    }

    /// Every budget of the category, oldest first.
    pub async fn budget_history(&self, category: i64) -> Result<Vec<Row>, AppError> {
        let mut conn = self.store.acquire().await?;
        let query = Query::new()
            .eq("category", category)
            .sort("createdAt", Order::Asc);
        self.repo(&BUDGET).find_many(conn.as_mut(), &query).await
    }

    /// The budget in force at the end of `day`.
    pub async fn budget_at(&self, category: i64, day: NaiveDate) -> Result<Option<Row>, AppError> {
        let mut conn = self.store.acquire().await?;
        self.budget_at_in(conn.as_mut(), category, day).await
    }

    pub(crate) async fn budget_at_in(
        &self,
        conn: &mut dyn Executor,
        category: i64,
        day: NaiveDate,
    ) -> Result<Option<Row>, AppError> {
        let query = Query::new()
            .eq("category", category)
            .filter("createdAt", Op::Le, end_of_day(day))
            .sort("createdAt", Order::Desc)
            .limit(1);
        self.repo(&BUDGET).find_one(conn, &query).await
    }
}
