//! Typed views of stored rows and operation inputs.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletType {
    Balance,
    Saving,
    Reserve,
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryType {
    Expense,
    Income,
    Operation,
    Saving,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Payment,
    Transfer,
    Exchange,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Entry,
    Exit,
}

impl WalletType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletType::Balance => "balance",
            WalletType::Saving => "saving",
            WalletType::Reserve => "reserve",
            WalletType::Other => "other",
        }
    }
}

impl CategoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryType::Expense => "expense",
            CategoryType::Income => "income",
            CategoryType::Operation => "operation",
            CategoryType::Saving => "saving",
        }
    }
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Payment => "payment",
            TransactionType::Transfer => "transfer",
            TransactionType::Exchange => "exchange",
        }
    }
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Entry => "entry",
            PaymentType::Exit => "exit",
        }
    }

    /// Entry credits the wallet, exit debits it.
    pub fn sign(&self) -> i64 {
        match self {
            PaymentType::Entry => 1,
            PaymentType::Exit => -1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    pub id: i64,
    pub iso: String,
    pub country_iso: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCurrency {
    pub id: i64,
    pub active: bool,
    pub main: bool,
    pub user: i64,
    pub currency: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    pub name: String,
    /// UserCurrency id.
    pub currency: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: i64,
    pub name: String,
    pub balance: i64,
    #[serde(rename = "type")]
    pub kind: WalletType,
    pub account: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub user: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub accumulates: bool,
    #[serde(rename = "type")]
    pub kind: CategoryType,
    pub group: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub id: i64,
    pub amount: i64,
    pub category: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: i64,
    pub date: NaiveDate,
    pub total_amount: i64,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub category: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: i64,
    pub amount: i64,
    #[serde(rename = "type")]
    pub kind: PaymentType,
    pub wallet: i64,
    pub transaction: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Backup {
    pub id: i64,
    pub date: NaiveDate,
    pub user: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBackup {
    pub id: i64,
    pub balance: i64,
    pub wallet: i64,
    pub backup: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBackup {
    pub id: i64,
    pub spent: i64,
    pub accumulated: Option<i64>,
    pub category: i64,
    pub backup: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub surname: String,
    pub birthday: NaiveDate,
    pub active: bool,
    pub google_id: Option<String>,
    pub role: i64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: i64,
    pub token: String,
    pub user: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: i64,
    pub sequence: i64,
    pub tag: String,
    pub icon: String,
    pub route: String,
    pub active: bool,
}

// Operation inputs.

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWallet {
    pub name: String,
    #[serde(default)]
    pub balance: i64,
    #[serde(rename = "type")]
    pub kind: WalletType,
    pub account: i64,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletEdit {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<WalletType>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLeg {
    #[serde(rename = "type")]
    pub kind: PaymentType,
    pub amount: i64,
    pub wallet: i64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPaymentTransaction {
    pub date: NaiveDate,
    pub category: i64,
    #[serde(rename = "payments", alias = "paymentList")]
    pub legs: Vec<PaymentLeg>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransfer {
    pub date: NaiveDate,
    pub category: i64,
    pub amount: i64,
    pub exit_wallet: i64,
    pub entry_wallet: i64,
}

/// Transaction request dispatched on its `type`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NewTransaction {
    Payment(NewPaymentTransaction),
    Transfer(NewTransfer),
    Exchange,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCategory {
    pub name: String,
    pub accumulates: bool,
    #[serde(rename = "type")]
    pub kind: CategoryType,
    pub group: i64,
    pub budget: i64,
}

/// Partial category edit; `None` leaves the field as stored.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryEdit {
    pub name: Option<String>,
    pub accumulates: Option<bool>,
    #[serde(rename = "type")]
    pub kind: Option<CategoryType>,
    pub group: Option<i64>,
    pub budget: Option<i64>,
}

/// One line of a bulk budget plan: `id` edits an existing category, no `id` creates one.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetPlanItem {
    pub id: Option<i64>,
    pub name: String,
    pub accumulates: bool,
    #[serde(rename = "type")]
    pub kind: CategoryType,
    pub group: i64,
    pub budget: i64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub name: String,
    /// UserCurrency id.
    pub currency: i64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGroup {
    pub name: String,
    pub user: i64,
}
