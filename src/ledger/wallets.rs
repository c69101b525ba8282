//! Wallet creation with its backup baseline, balances at a date and monthly statements.

use super::period::{backup_anchor, month_window};
use super::snapshots::find_or_create_backup;
use super::{finish, Ledger};
use crate::error::AppError;
use crate::models::{Backup, NewWallet, PaymentType};
use crate::query::{Op, Order, Query};
use crate::record::Row;
use crate::schema::entities::{ACCOUNT, PAYMENT, WALLET, WALLET_BACKUP};
use crate::store::Executor;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementLine {
    pub transaction: i64,
    pub payment: i64,
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: PaymentType,
    /// Signed: entries positive, exits negative.
    pub amount: i64,
    pub category: Option<String>,
    pub group: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletStatement {
    pub wallet: i64,
    pub name: String,
    pub previous_balance: i64,
    pub closing_balance: i64,
    pub lines: Vec<StatementLine>,
}

impl Ledger {
    pub async fn create_wallet(&self, user: i64, input: &NewWallet) -> Result<Row, AppError> {
        self.create_wallet_on(user, input, Utc::now().date_naive()).await
    }

    /// Insert the wallet and record its starting balance in the backup anchoring `today`'s
    /// month, creating that backup when needed. Both rows commit together.
    pub async fn create_wallet_on(&self, user: i64, input: &NewWallet, today: NaiveDate) -> Result<Row, AppError> {
        if input.balance < 0 {
            return Err(AppError::Validation("wallet balance must not be negative".into()));
        }
        let mut tx = self.store.begin().await?;
        let result = self.create_wallet_in(tx.conn(), user, input, today).await;
        finish(tx, result).await
    }

    async fn create_wallet_in(
        &self,
        conn: &mut dyn Executor,
        user: i64,
        input: &NewWallet,
        today: NaiveDate,
    ) -> Result<Row, AppError> {
        self.ensure_account_owner(conn, input.account, user).await?;
        let wallet = self
            .repo(&WALLET)
            .create(
                conn,
                &json!({
                    "name": input.name,
                    "balance": input.balance,
                    "type": input.kind.as_str(),
                    "account": input.account,
                }),
            )
            .await?;
        let backup = find_or_create_backup(self, conn, user, backup_anchor(today)).await?;
        self.repo(&WALLET_BACKUP)
            .create(
                conn,
                &json!({ "balance": input.balance, "wallet": wallet.id(), "backup": backup.id() }),
            )
            .await?;
        tracing::info!(user, wallet = wallet.id(), backup = backup.id(), "wallet created");
        Ok(wallet)
    }

    async fn ensure_account_owner(&self, conn: &mut dyn Executor, account: i64, user: i64) -> Result<(), AppError> {
        let query = Query::by_id(account).populate("currency", Query::new().limit(1));
        let row = self
            .repo(&ACCOUNT)
            .find_one(conn, &query)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {}", account)))?;
        match row.one("currency").and_then(|uc| uc.i64("user")) {
            Some(owner) if owner == user => Ok(()),
            _ => Err(AppError::Validation(format!(
                "account {} does not belong to user {}",
                account, user
            ))),
        }
    }

    /// Balance of `wallet` at the end of `date`: the latest backup baseline on or before
    /// `date` plus the signed payments dated after it.
    pub async fn balance_at(&self, wallet: i64, date: NaiveDate) -> Result<i64, AppError> {
        let mut conn = self.store.acquire().await?;
        self.repo(&WALLET)
            .get(conn.as_mut(), wallet)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("wallet {}", wallet)))?;
        self.balance_at_in(conn.as_mut(), wallet, date).await
    }

    pub(crate) async fn balance_at_in(
        &self,
        conn: &mut dyn Executor,
        wallet: i64,
        date: NaiveDate,
    ) -> Result<i64, AppError> {
        let backups = self
            .repo(&WALLET_BACKUP)
            .find_many(
                conn,
                &Query::new()
                    .eq("wallet", wallet)
                    .populate("backup", Query::new().limit(1)),
            )
            .await?;
        let mut baseline: Option<(NaiveDate, i64, i64)> = None;
        for wb in &backups {
            let Some(backup) = wb.one("backup") else { continue };
            let backup: Backup = backup.decode()?;
            if backup.date > date {
                continue;
            }
            let candidate = (backup.date, wb.id().unwrap_or_default(), wb.i64("balance").unwrap_or_default());
            if baseline.map_or(true, |b| (candidate.0, candidate.1) > (b.0, b.1)) {
                baseline = Some(candidate);
            }
        }

        let mut window = Query::new().limit(1).filter("date", Op::Le, date.to_string());
        if let Some((since, _, _)) = baseline {
            window = window.filter("date", Op::Gt, since.to_string());
        }
        let payments = self
            .repo(&PAYMENT)
            .find_many(conn, &Query::new().eq("wallet", wallet).populate("transaction", window))
            .await?;
        let moved: i64 = payments
            .iter()
            .filter(|p| p.one("transaction").is_some())
            .map(|p| signed_amount(p))
            .sum();
        Ok(baseline.map(|b| b.2).unwrap_or_default() + moved)
    }

    /// The wallet's payments within the month, oldest first, opened by its balance at the
    /// end of the previous month.
    pub async fn wallet_statement(&self, wallet: i64, year: i32, month: u32) -> Result<WalletStatement, AppError> {
        let (since, until) = month_window(year, month)?;
        let mut conn = self.store.acquire().await?;
        let row = self
            .repo(&WALLET)
            .get(conn.as_mut(), wallet)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("wallet {}", wallet)))?;
        let previous_balance = self.balance_at_in(conn.as_mut(), wallet, since).await?;

        let transaction = Query::new()
            .limit(1)
            .filter("date", Op::Gt, since.to_string())
            .filter("date", Op::Le, until.to_string())
            .populate(
                "category",
                Query::new().limit(1).populate("group", Query::new().limit(1)),
            );
        let payments = self
            .repo(&PAYMENT)
            .find_many(
                conn.as_mut(),
                &Query::new()
                    .eq("wallet", wallet)
                    .sort("id", Order::Asc)
                    .populate("transaction", transaction),
            )
            .await?;

        let mut lines = Vec::new();
        for payment in &payments {
            let Some(t) = payment.one("transaction") else { continue };
            let date: NaiveDate = serde_json::from_value(t.get("date").cloned().unwrap_or_default())?;
            let kind: PaymentType =
                serde_json::from_value(payment.get("type").cloned().unwrap_or_default())?;
            let category = t.one("category");
            lines.push(StatementLine {
                transaction: t.id().unwrap_or_default(),
                payment: payment.id().unwrap_or_default(),
                date,
                kind,
                amount: signed_amount(payment),
                category: category.and_then(|c| c.str("name")).map(str::to_string),
                group: category
                    .and_then(|c| c.one("group"))
                    .and_then(|g| g.str("name"))
                    .map(str::to_string),
            });
        }
        lines.sort_by_key(|l| (l.date, l.transaction, l.payment));
        let closing_balance = previous_balance + lines.iter().map(|l| l.amount).sum::<i64>();

        Ok(WalletStatement {
            wallet,
            name: row.str("name").unwrap_or_default().to_string(),
            previous_balance,
            closing_balance,
            lines,
        })
    }
}

fn signed_amount(payment: &Row) -> i64 {
    let amount = payment.i64("amount").unwrap_or_default();
    match payment.str("type") {
        Some("exit") => -amount,
        _ => amount,
    }
}
