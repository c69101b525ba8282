//! Month-end backups: find-or-create, closing a month, and the bank statement baseline.

use super::accounts::{user_wallets, OwnedWallet};
use super::period::month_window;
use super::{finish, Ledger};
use crate::error::AppError;
use crate::models::{Backup, Category, Wallet, WalletType};
use crate::query::{Op, Order, Query};
use crate::record::{Related, Row};
use crate::schema::entities::{BACKUP, CATEGORY_BACKUP, GROUP, WALLET_BACKUP};
use crate::store::Executor;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StatementSource {
    /// The month has not ended: balances are the wallets' current balances.
    Live,
    /// Baseline balances of the latest backup at or before the month end.
    Backup { date: NaiveDate },
    /// No backup exists yet: zero baseline.
    Empty,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatementWallet {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: WalletType,
    pub account: i64,
    pub account_name: String,
    /// Currency id of the wallet's account.
    pub currency: i64,
    pub balance: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BankStatement {
    pub date: NaiveDate,
    pub source: StatementSource,
    pub wallets: Vec<StatementWallet>,
}

impl Ledger {
    /// Wallet balances for the end of `year`-`month`. Replaying payments after a backup
    /// baseline is left to [`Ledger::balance_at`].
    pub async fn bank_statement(
        &self,
        user: i64,
        year: i32,
        month: u32,
        today: NaiveDate,
    ) -> Result<BankStatement, AppError> {
        let (_, until) = month_window(year, month)?;
        let mut conn = self.store.acquire().await?;
        let owned = user_wallets(self, conn.as_mut(), user).await?;

        let statement_wallet = |w: &OwnedWallet, balance: i64| -> Result<StatementWallet, AppError> {
            let wallet: Wallet = w.wallet.decode()?;
            Ok(StatementWallet {
                id: wallet.id,
                name: wallet.name,
                kind: wallet.kind,
                account: wallet.account,
                account_name: w.account.str("name").unwrap_or_default().to_string(),
                currency: w.currency,
                balance,
            })
        };

        if today <= until {
            let wallets = owned
                .iter()
                .map(|w| statement_wallet(w, w.wallet.i64("balance").unwrap_or_default()))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(BankStatement {
                date: until,
                source: StatementSource::Live,
                wallets,
            });
        }

        let query = Query::new()
            .eq("user", user)
            .filter("date", Op::Le, until.to_string())
            .sort("date", Order::Desc)
            .limit(1)
            .populate("walletBackup", Query::new());
        let Some(backup) = self.repo(&BACKUP).find_one(conn.as_mut(), &query).await? else {
            let wallets = owned
                .iter()
                .map(|w| statement_wallet(w, 0))
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(BankStatement {
                date: until,
                source: StatementSource::Empty,
                wallets,
            });
        };

        let baseline: HashMap<i64, i64> = backup
            .many("walletBackupList")
            .iter()
            .filter_map(|wb| Some((wb.i64("wallet")?, wb.i64("balance")?)))
            .collect();
        let wallets = owned
            .iter()
            .filter_map(|w| {
                let id = w.wallet.id()?;
                baseline.get(&id).map(|b| statement_wallet(w, *b))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let date: Backup = backup.decode()?;
        Ok(BankStatement {
            date: until,
            source: StatementSource::Backup { date: date.date },
            wallets,
        })
    }

    /// Snapshot a finished month: one WalletBackup per wallet with its replayed balance at
    /// month end and one CategoryBackup per category. Rows already present are kept, so
    /// closing a month twice writes nothing new. Returns the backup with both lists.
    pub async fn close_month(&self, user: i64, year: i32, month: u32) -> Result<Row, AppError> {
        let (since, until) = month_window(year, month)?;
        let mut tx = self.store.begin().await?;
        let result = self.close_month_in(tx.conn(), user, since, until).await;
        finish(tx, result).await
    }

    async fn close_month_in(
        &self,
        conn: &mut dyn Executor,
        user: i64,
        since: NaiveDate,
        until: NaiveDate,
    ) -> Result<Row, AppError> {
        let backup = find_or_create_backup(self, conn, user, until).await?;
        let bid = backup.id().unwrap_or_default();

        let by_backup = Query::new().eq("backup", bid);
        let wallets_done: HashSet<i64> = self
            .repo(&WALLET_BACKUP)
            .find_many(conn, &by_backup)
            .await?
            .iter()
            .filter_map(|r| r.i64("wallet"))
            .collect();
        let mut wallet_rows = 0;
        for owned in user_wallets(self, conn, user).await? {
            let Some(wallet) = owned.wallet.id() else { continue };
            if wallets_done.contains(&wallet) {
                continue;
            }
            let balance = self.balance_at_in(conn, wallet, until).await?;
            self.repo(&WALLET_BACKUP)
                .create(conn, &json!({ "balance": balance, "wallet": wallet, "backup": bid }))
                .await?;
            wallet_rows += 1;
        }

        let categories_done: HashSet<i64> = self
            .repo(&CATEGORY_BACKUP)
            .find_many(conn, &by_backup)
            .await?
            .iter()
            .filter_map(|r| r.i64("category"))
            .collect();
        let previous = self
            .repo(&BACKUP)
            .find_one(
                conn,
                &Query::new()
                    .eq("user", user)
                    .eq("date", since.to_string())
                    .populate("categoryBackup", Query::new()),
            )
            .await?;
        let previous_accumulated: HashMap<i64, i64> = previous
            .as_ref()
            .map(|b| {
                b.many("categoryBackupList")
                    .iter()
                    .filter_map(|cb| Some((cb.i64("category")?, cb.i64("accumulated")?)))
                    .collect()
            })
            .unwrap_or_default();

        let groups = self
            .repo(&GROUP)
            .find_many(
                conn,
                &Query::new().eq("user", user).populate(
                    "category",
                    Query::new().populate(
                        "transaction",
                        Query::new()
                            .filter("date", Op::Gt, since.to_string())
                            .filter("date", Op::Le, until.to_string()),
                    ),
                ),
            )
            .await?;
        let mut category_rows = 0;
        for group in &groups {
            for category_row in group.many("categoryList") {
                let category: Category = category_row.decode()?;
                if categories_done.contains(&category.id) {
                    continue;
                }
                let spent: i64 = category_row
                    .many("transactionList")
                    .iter()
                    .filter_map(|t| t.i64("totalAmount"))
                    .sum();
                let accumulated = if category.accumulates {
                    let budget = self
                        .budget_at_in(conn, category.id, until)
                        .await?
                        .and_then(|b| b.i64("amount"))
                        .unwrap_or_default();
                    let carried = previous_accumulated.get(&category.id).copied().unwrap_or_default();
                    Value::from(carried + budget + spent)
                } else {
                    Value::Null
                };
                self.repo(&CATEGORY_BACKUP)
                    .create(
                        conn,
                        &json!({ "spent": spent, "accumulated": accumulated, "category": category.id, "backup": bid }),
                    )
                    .await?;
                category_rows += 1;
            }
        }

        tracing::info!(user, backup = bid, date = %until, wallet_rows, category_rows, "month closed");
        let mut backup = backup;
        let wallet_backups = self.repo(&WALLET_BACKUP).find_many(conn, &by_backup).await?;
        let category_backups = self.repo(&CATEGORY_BACKUP).find_many(conn, &by_backup).await?;
        backup
            .relations
            .insert("walletBackupList".into(), Related::Many(wallet_backups));
        backup
            .relations
            .insert("categoryBackupList".into(), Related::Many(category_backups));
        Ok(backup)
    }
}

/// The user's backup dated `date`, created when missing.
pub(crate) async fn find_or_create_backup(
    ledger: &Ledger,
    conn: &mut dyn Executor,
    user: i64,
    date: NaiveDate,
) -> Result<Row, AppError> {
    let repo = ledger.repo(&BACKUP);
    let query = Query::new().eq("user", user).eq("date", date.to_string());
    if let Some(found) = repo.find_one(conn, &query).await? {
        return Ok(found);
    }
    // A concurrent unit of work may insert the same (user, date) first; then read its row.
    if let Some(created) = repo.create_if_absent(conn, &json!({ "date": date, "user": user })).await? {
        tracing::info!(user, backup = created.id(), date = %date, "backup created");
        return Ok(created);
    }
    repo.find_one(conn, &query)
        .await?
        .ok_or_else(|| AppError::Storage(format!("backup of user {} at {} vanished after conflict", user, date)))
}
