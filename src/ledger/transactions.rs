//! Payment and transfer transactions with their wallet balance updates.

use super::{finish, Ledger};
use crate::error::{AppError, DomainError};
use crate::models::{NewPaymentTransaction, NewTransaction, NewTransfer, PaymentType, TransactionType, Wallet};
use crate::query::Query;
use crate::record::{Related, Row};
use crate::schema::entities::{PAYMENT, TRANSACTION, WALLET};
use crate::store::Executor;
use chrono::NaiveDate;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

impl Ledger {
    /// Record a transaction request according to its type.
    pub async fn record(&self, request: &NewTransaction) -> Result<Row, AppError> {
        match request {
            NewTransaction::Payment(p) => self.record_payment(p).await,
            NewTransaction::Transfer(t) => self.record_transfer(t).await,
            NewTransaction::Exchange => {
                tracing::warn!("exchange transaction rejected");
                Err(DomainError::ExchangeNotSupported.into())
            }
        }
    }

    /// Insert a payment transaction and its payments and move each wallet balance.
    /// `totalAmount` is the signed sum of the legs. Returns the transaction with `paymentList`.
    pub async fn record_payment(&self, input: &NewPaymentTransaction) -> Result<Row, AppError> {
        if input.legs.is_empty() {
            return Err(AppError::Validation("a payment transaction needs at least one payment".into()));
        }
        if let Some(leg) = input.legs.iter().find(|l| l.amount < 0) {
            return Err(AppError::Validation(format!(
                "payment amount must not be negative (wallet {})",
                leg.wallet
            )));
        }
        let mut tx = self.store.begin().await?;
        let result = self.record_payment_in(tx.conn(), input).await;
        finish(tx, result).await
    }

    async fn record_payment_in(&self, conn: &mut dyn Executor, input: &NewPaymentTransaction) -> Result<Row, AppError> {
        let total = input.legs.iter().try_fold(0i64, |acc, l| {
            l.amount
                .checked_mul(l.kind.sign())
                .and_then(|signed| acc.checked_add(signed))
                .ok_or_else(|| overflow("transaction total"))
        })?;
        let ids: Vec<i64> = input.legs.iter().map(|l| l.wallet).collect();
        let mut balances = self.lock_balances(conn, &ids).await?;

        let mut transaction =
            insert_transaction(self, conn, input.date, total, TransactionType::Payment, input.category).await?;
        let tid = transaction.id().unwrap_or_default();
        let mut payments = Vec::with_capacity(input.legs.len());
        for leg in &input.legs {
            payments.push(insert_payment(self, conn, leg.kind, leg.amount, leg.wallet, tid).await?);
            if let Some(b) = balances.get_mut(&leg.wallet) {
                let current = *b;
                *b = leg
                    .amount
                    .checked_mul(leg.kind.sign())
                    .and_then(|signed| current.checked_add(signed))
                    .ok_or_else(|| overflow(&format!("balance of wallet {}", leg.wallet)))?;
            }
        }
        self.write_balances(conn, &balances).await?;

        tracing::info!(transaction = tid, total, payments = payments.len(), "payment transaction recorded");
        transaction.relations.insert("paymentList".into(), Related::Many(payments));
        Ok(transaction)
    }

    /// Move `amount` between two wallets of the same currency. The transaction nets to zero.
    /// Differing currencies fail before anything is written.
    pub async fn record_transfer(&self, input: &NewTransfer) -> Result<Row, AppError> {
        if input.exit_wallet == input.entry_wallet {
            tracing::warn!(wallet = input.exit_wallet, "transfer to the same wallet rejected");
            return Err(DomainError::SameWallet(input.exit_wallet).into());
        }
        if input.amount < 0 {
            return Err(AppError::Validation("transfer amount must not be negative".into()));
        }
        let mut tx = self.store.begin().await?;
        let result = self.record_transfer_in(tx.conn(), input).await;
        finish(tx, result).await
    }

    async fn record_transfer_in(&self, conn: &mut dyn Executor, input: &NewTransfer) -> Result<Row, AppError> {
        let mut balances = self
            .lock_balances(conn, &[input.exit_wallet, input.entry_wallet])
            .await?;
        let exit_currency = self.wallet_currency(conn, input.exit_wallet).await?;
        let entry_currency = self.wallet_currency(conn, input.entry_wallet).await?;
        if exit_currency != entry_currency {
            tracing::warn!(
                exit_wallet = input.exit_wallet,
                entry_wallet = input.entry_wallet,
                exit_currency,
                entry_currency,
                "transfer across currencies rejected"
            );
            return Err(DomainError::CurrencyMismatch {
                exit_wallet: input.exit_wallet,
                entry_wallet: input.entry_wallet,
            }
            .into());
        }

        let mut transaction =
            insert_transaction(self, conn, input.date, 0, TransactionType::Transfer, input.category).await?;
        let tid = transaction.id().unwrap_or_default();
        let exit = insert_payment(self, conn, PaymentType::Exit, input.amount, input.exit_wallet, tid).await?;
        let entry = insert_payment(self, conn, PaymentType::Entry, input.amount, input.entry_wallet, tid).await?;
        if let Some(b) = balances.get_mut(&input.exit_wallet) {
            *b = b
                .checked_sub(input.amount)
                .ok_or_else(|| overflow(&format!("balance of wallet {}", input.exit_wallet)))?;
        }
        if let Some(b) = balances.get_mut(&input.entry_wallet) {
            *b = b
                .checked_add(input.amount)
                .ok_or_else(|| overflow(&format!("balance of wallet {}", input.entry_wallet)))?;
        }
        self.write_balances(conn, &balances).await?;

        tracing::info!(
            transaction = tid,
            amount = input.amount,
            exit_wallet = input.exit_wallet,
            entry_wallet = input.entry_wallet,
            "transfer recorded"
        );
        transaction
            .relations
            .insert("paymentList".into(), Related::Many(vec![exit, entry]));
        Ok(transaction)
    }

    /// Lock the wallets in ascending id order and read their balances.
    async fn lock_balances(&self, conn: &mut dyn Executor, ids: &[i64]) -> Result<BTreeMap<i64, i64>, AppError> {
        let ids: BTreeSet<i64> = ids.iter().copied().collect();
        let mut out = BTreeMap::new();
        for id in ids {
            let row = self
                .repo(&WALLET)
                .lock(conn, id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("wallet {}", id)))?;
            let wallet: Wallet = row.decode()?;
            out.insert(id, wallet.balance);
        }
        Ok(out)
    }

    async fn write_balances(&self, conn: &mut dyn Executor, balances: &BTreeMap<i64, i64>) -> Result<(), AppError> {
        for (id, balance) in balances {
            self.repo(&WALLET)
                .update(conn, *id, &json!({ "balance": balance }))
                .await?
                .ok_or_else(|| AppError::NotFound(format!("wallet {}", id)))?;
        }
        Ok(())
    }

    /// Currency id behind a wallet: wallet → account → user currency → currency.
    async fn wallet_currency(&self, conn: &mut dyn Executor, wallet: i64) -> Result<i64, AppError> {
        let query = Query::by_id(wallet).populate(
            "account",
            Query::new().limit(1).populate("currency", Query::new().limit(1)),
        );
        let row = self
            .repo(&WALLET)
            .find_one(conn, &query)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("wallet {}", wallet)))?;
        row.one("account")
            .and_then(|account| account.one("currency"))
            .and_then(|uc| uc.i64("currency"))
            .ok_or_else(|| AppError::NotFound(format!("currency of wallet {}", wallet)))
    }
}

fn overflow(what: &str) -> AppError {
    tracing::warn!(what, "amount out of range rejected");
    AppError::Validation(format!("{} is out of range", what))
}

async fn insert_transaction(
    ledger: &Ledger,
    conn: &mut dyn Executor,
    date: NaiveDate,
    total: i64,
    kind: TransactionType,
    category: i64,
) -> Result<Row, AppError> {
    ledger
        .repo(&TRANSACTION)
        .create(
            conn,
            &json!({ "date": date, "totalAmount": total, "type": kind.as_str(), "category": category }),
        )
        .await
}

async fn insert_payment(
    ledger: &Ledger,
    conn: &mut dyn Executor,
    kind: PaymentType,
    amount: i64,
    wallet: i64,
    transaction: i64,
) -> Result<Row, AppError> {
    ledger
        .repo(&PAYMENT)
        .create(
            conn,
            &json!({ "amount": amount, "type": kind.as_str(), "wallet": wallet, "transaction": transaction }),
        )
        .await
}
