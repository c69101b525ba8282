//! Dashboard aggregations over one user's month.

use crate::error::AppError;
use crate::ledger::period::{end_of_day, month_window};
use crate::ledger::Ledger;
use crate::models::{Category, CategoryType, TransactionType, Wallet, WalletType};
use crate::query::{Op, Order, Query};
use crate::record::Row;
use crate::schema::entities::GROUP;
use crate::service::Repository;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryExpense {
    pub group: String,
    pub category_id: i64,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: CategoryType,
    pub budget: i64,
    /// Only for accumulating categories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accumulated: Option<i64>,
    pub spent: i64,
}

/// Amounts per bucket; used for both planned budgets and realized totals.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Buckets {
    pub expense: i64,
    pub income: i64,
    pub saving: i64,
    pub reserve: i64,
}

impl Buckets {
    fn add_category(&mut self, kind: CategoryType, amount: i64) {
        match kind {
            CategoryType::Expense => self.expense += amount,
            CategoryType::Income => self.income += amount,
            CategoryType::Saving => self.saving += amount,
            CategoryType::Operation => {}
        }
    }

    fn add_wallet(&mut self, kind: WalletType, amount: i64) {
        match kind {
            WalletType::Saving => self.saving += amount,
            WalletType::Reserve => self.reserve += amount,
            WalletType::Balance | WalletType::Other => self.expense += amount,
        }
    }
}

#[derive(Clone)]
pub struct Reports {
    ledger: Ledger,
}

impl Reports {
    pub fn new(ledger: Ledger) -> Self {
        Reports { ledger }
    }

    fn groups(&self) -> Repository<'_> {
        Repository::of(self.ledger.model(), &GROUP)
    }

    /// One line per category of the user, ordered by group name then category name.
    pub async fn category_expenses(&self, user: i64, year: i32, month: u32) -> Result<Vec<CategoryExpense>, AppError> {
        let (since, until) = month_window(year, month)?;
        let query = Query::new()
            .eq("user", user)
            .sort("name", Order::Asc)
            .populate(
                "category",
                Query::new()
                    .sort("name", Order::Asc)
                    .populate("budget", in_force(until))
                    .populate(
                        "categoryBackup",
                        Query::new().sort("createdAt", Order::Desc).limit(1),
                    )
                    .populate("transaction", within(since, until)),
            );
        let mut conn = self.ledger.store().acquire().await?;
        let groups = self.groups().find_many(conn.as_mut(), &query).await?;

        let mut out = Vec::new();
        for group in &groups {
            let group_name = group.str("name").unwrap_or_default();
            for row in group.many("categoryList") {
                let category: Category = row.decode()?;
                let accumulated = if category.accumulates {
                    row.one("categoryBackup").and_then(|cb| cb.i64("accumulated"))
                } else {
                    None
                };
                out.push(CategoryExpense {
                    group: group_name.to_string(),
                    category_id: category.id,
                    category: category.name,
                    kind: category.kind,
                    budget: budget_amount(row),
                    accumulated,
                    spent: row
                        .many("transactionList")
                        .iter()
                        .filter_map(|t| t.i64("totalAmount"))
                        .sum(),
                });
            }
        }
        Ok(out)
    }

    /// Planned amounts: budgets in force at month end per category type. Accumulating
    /// categories also count towards `reserve`. Operation categories are left out.
    pub async fn budget_box(&self, user: i64, year: i32, month: u32) -> Result<Buckets, AppError> {
        let (_, until) = month_window(year, month)?;
        let query = Query::new().eq("user", user).populate(
            "category",
            Query::new()
                .filter("type", Op::Ne, CategoryType::Operation.as_str())
                .populate("budget", in_force(until)),
        );
        let mut conn = self.ledger.store().acquire().await?;
        let groups = self.groups().find_many(conn.as_mut(), &query).await?;

        let mut boxed = Buckets::default();
        for row in groups.iter().flat_map(|g| g.many("categoryList")) {
            let category: Category = row.decode()?;
            let amount = budget_amount(row);
            boxed.add_category(category.kind, amount);
            if category.accumulates {
                boxed.reserve += amount;
            }
        }
        Ok(boxed)
    }

    /// Realized amounts: saving and reserve wallet balances in the main currency from the
    /// bank statement, plus the month's payment totals per category type. Transfer legs
    /// count towards the bucket of their wallet's type.
    pub async fn total_box(&self, user: i64, year: i32, month: u32, today: NaiveDate) -> Result<Buckets, AppError> {
        let (since, until) = month_window(year, month)?;
        let main = self
            .ledger
            .main_currency(user)
            .await?
            .i64("currency")
            .unwrap_or_default();
        let statement = self.ledger.bank_statement(user, year, month, today).await?;

        let mut boxed = Buckets::default();
        for wallet in statement.wallets.iter().filter(|w| w.currency == main) {
            match wallet.kind {
                WalletType::Saving => boxed.saving += wallet.balance,
                WalletType::Reserve => boxed.reserve += wallet.balance,
                _ => {}
            }
        }

        let query = Query::new().eq("user", user).populate(
            "category",
            Query::new()
                .filter("type", Op::Ne, CategoryType::Operation.as_str())
                .populate(
                    "transaction",
                    within(since, until).populate(
                        "payment",
                        Query::new().populate("wallet", Query::new().limit(1)),
                    ),
                ),
        );
        let mut conn = self.ledger.store().acquire().await?;
        let groups = self.groups().find_many(conn.as_mut(), &query).await?;

        for row in groups.iter().flat_map(|g| g.many("categoryList")) {
            let category: Category = row.decode()?;
            for transaction in row.many("transactionList") {
                match transaction_kind(transaction)? {
                    TransactionType::Payment => {
                        boxed.add_category(category.kind, transaction.i64("totalAmount").unwrap_or_default())
                    }
                    TransactionType::Transfer => {
                        for payment in transaction.many("paymentList") {
                            let amount = payment.i64("amount").unwrap_or_default();
                            let signed = if payment.str("type") == Some("exit") { -amount } else { amount };
                            let kind = payment
                                .one("wallet")
                                .map(|w| w.decode::<Wallet>())
                                .transpose()?
                                .map(|w| w.kind)
                                .unwrap_or(WalletType::Other);
                            boxed.add_wallet(kind, signed);
                        }
                    }
                    TransactionType::Exchange => {}
                }
            }
        }
        Ok(boxed)
    }
}

/// Budget in force at the end of `until`.
fn in_force(until: NaiveDate) -> Query {
    Query::new()
        .filter("createdAt", Op::Le, end_of_day(until))
        .sort("createdAt", Order::Desc)
        .limit(1)
}

fn within(since: NaiveDate, until: NaiveDate) -> Query {
    Query::new()
        .filter("date", Op::Gt, since.to_string())
        .filter("date", Op::Le, until.to_string())
        .sort("date", Order::Asc)
}

fn budget_amount(category: &Row) -> i64 {
    category
        .one("budget")
        .and_then(|b| b.i64("amount"))
        .unwrap_or_default()
}

fn transaction_kind(transaction: &Row) -> Result<TransactionType, AppError> {
    Ok(serde_json::from_value(
        transaction.get("type").cloned().unwrap_or_default(),
    )?)
}
