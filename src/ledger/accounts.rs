//! Accounts, groups and wallets owned by a user.

use super::Ledger;
use crate::error::AppError;
use crate::models::{NewAccount, NewGroup, WalletEdit};
use crate::query::{Order, Query};
use crate::record::{Map, Related, Row};
use crate::schema::entities::{ACCOUNT, GROUP, USER_CURRENCY, WALLET};
use crate::store::Executor;
use serde_json::{json, Value};

/// A wallet together with its account and the currency id the account is denominated in.
#[derive(Clone, Debug)]
pub(crate) struct OwnedWallet {
    pub wallet: Row,
    pub account: Row,
    pub currency: i64,
}

impl Ledger {
    pub async fn create_account(&self, input: &NewAccount) -> Result<Row, AppError> {
        let mut conn = self.store.acquire().await?;
        let row = self
            .repo(&ACCOUNT)
            .create(conn.as_mut(), &json!({ "name": input.name, "currency": input.currency }))
            .await?;
        tracing::info!(account = row.id(), "account created");
        Ok(row)
    }

    pub async fn rename_account(&self, id: i64, name: &str) -> Result<Row, AppError> {
        let mut conn = self.store.acquire().await?;
        self.repo(&ACCOUNT)
            .update(conn.as_mut(), id, &json!({ "name": name }))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {}", id)))
    }

    pub async fn create_group(&self, input: &NewGroup) -> Result<Row, AppError> {
        let mut conn = self.store.acquire().await?;
        self.repo(&GROUP)
            .create(conn.as_mut(), &json!({ "name": input.name, "user": input.user }))
            .await
    }

    pub async fn rename_group(&self, id: i64, name: &str) -> Result<Row, AppError> {
        let mut conn = self.store.acquire().await?;
        self.repo(&GROUP)
            .update(conn.as_mut(), id, &json!({ "name": name }))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("group {}", id)))
    }

    /// Name and type only; the balance moves through transactions.
    pub async fn update_wallet(&self, id: i64, edit: &WalletEdit) -> Result<Row, AppError> {
        let mut changes = Map::new();
        if let Some(name) = &edit.name {
            changes.insert("name".into(), Value::from(name.as_str()));
        }
        if let Some(kind) = edit.kind {
            changes.insert("type".into(), Value::from(kind.as_str()));
        }
        let mut conn = self.store.acquire().await?;
        self.repo(&WALLET)
            .update(conn.as_mut(), id, &changes)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("wallet {}", id)))
    }

    /// The user's accounts sorted by name, each with its currency and `walletList`.
    pub async fn list_accounts(&self, user: i64) -> Result<Vec<Row>, AppError> {
        let mut conn = self.store.acquire().await?;
        let query = Query::new()
            .eq("user", user)
            .populate("currency", Query::new().limit(1))
            .populate(
                "account",
                Query::new().populate("wallet", Query::new().sort("name", Order::Asc)),
            );
        let currencies = self.repo(&USER_CURRENCY).find_many(conn.as_mut(), &query).await?;

        let mut accounts = Vec::new();
        for uc in currencies {
            let currency = uc.one("currency").cloned();
            for account in uc.many("accountList") {
                let mut account = account.clone();
                account
                    .relations
                    .insert("currency".into(), Related::One(currency.clone().map(Box::new)));
                accounts.push(account);
            }
        }
        accounts.sort_by(|a, b| a.str("name").cmp(&b.str("name")));
        Ok(accounts)
    }

    /// The user's groups sorted by name, each with its `categoryList` sorted by name.
    pub async fn list_groups(&self, user: i64) -> Result<Vec<Row>, AppError> {
        let mut conn = self.store.acquire().await?;
        let query = Query::new()
            .eq("user", user)
            .sort("name", Order::Asc)
            .populate("category", Query::new().sort("name", Order::Asc));
        self.repo(&GROUP).find_many(conn.as_mut(), &query).await
    }

    /// The user's wallets sorted by name.
    pub async fn list_wallets(&self, user: i64) -> Result<Vec<Row>, AppError> {
        let mut conn = self.store.acquire().await?;
        let mut wallets: Vec<Row> = user_wallets(self, conn.as_mut(), user)
            .await?
            .into_iter()
            .map(|w| w.wallet)
            .collect();
        wallets.sort_by(|a, b| a.str("name").cmp(&b.str("name")).then(a.id().cmp(&b.id())));
        Ok(wallets)
    }
}

/// Every wallet reachable from the user's currencies, ordered by account then wallet name.
pub(crate) async fn user_wallets(
    ledger: &Ledger,
    conn: &mut dyn Executor,
    user: i64,
) -> Result<Vec<OwnedWallet>, AppError> {
    let query = Query::new().eq("user", user).populate(
        "account",
        Query::new()
            .sort("name", Order::Asc)
            .populate("wallet", Query::new().sort("name", Order::Asc)),
    );
    let currencies = ledger.repo(&USER_CURRENCY).find_many(conn, &query).await?;
    let mut out = Vec::new();
    for uc in &currencies {
        let currency = uc.i64("currency").unwrap_or_default();
        for account in uc.many("accountList") {
            let mut bare = account.clone();
            bare.relations.clear();
            for wallet in account.many("walletList") {
                out.push(OwnedWallet {
                    wallet: wallet.clone(),
                    account: bare.clone(),
                    currency,
                });
            }
        }
    }
    out.sort_by(|a, b| {
        a.account
            .str("name")
            .cmp(&b.account.str("name"))
            .then(a.wallet.str("name").cmp(&b.wallet.str("name")))
    });
    Ok(out)
}
