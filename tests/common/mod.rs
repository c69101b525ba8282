#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, Utc};
use monarch_core::models::{CategoryType, NewAccount, NewCategory, NewGroup, NewWallet, WalletType};
use monarch_core::schema::entities::{CURRENCY, ROLE, USER};
use monarch_core::schema::EntityDef;
use monarch_core::{Ledger, MemoryStore, Repository, Row, SchemaModel, Store};
use serde_json::{json, Value};
use std::sync::Arc;

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub model: Arc<SchemaModel>,
    pub ledger: Ledger,
    pub today: NaiveDate,
    pub role: i64,
    pub user: i64,
    /// Currency id (COP) and the user's enabled row for it.
    pub currency: i64,
    pub user_currency: i64,
    pub account: i64,
    pub group: i64,
    /// Expense category "Groceries" with a budget of 400.
    pub groceries: i64,
}

impl Fixture {
    pub fn year(&self) -> i32 {
        self.today.year()
    }

    pub fn month(&self) -> u32 {
        self.today.month()
    }

    pub async fn seed(&self, entity: &'static EntityDef, record: Value) -> Row {
        let mut conn = self.store.acquire().await.unwrap();
        Repository::of(&self.model, entity)
            .create(conn.as_mut(), &record)
            .await
            .unwrap()
    }

    pub async fn count(&self, entity: &'static EntityDef) -> i64 {
        let mut conn = self.store.acquire().await.unwrap();
        Repository::of(&self.model, entity).count(conn.as_mut()).await.unwrap()
    }

    pub async fn get(&self, entity: &'static EntityDef, id: i64) -> Option<Row> {
        let mut conn = self.store.acquire().await.unwrap();
        Repository::of(&self.model, entity).get(conn.as_mut(), id).await.unwrap()
    }

    pub async fn wallet(&self, name: &str, kind: WalletType, balance: i64) -> i64 {
        self.wallet_in(self.account, name, kind, balance).await
    }

    pub async fn wallet_in(&self, account: i64, name: &str, kind: WalletType, balance: i64) -> i64 {
        let input = NewWallet {
            name: name.into(),
            balance,
            kind,
            account,
        };
        self.ledger
            .create_wallet_on(self.user, &input, self.today)
            .await
            .unwrap()
            .id()
            .unwrap()
    }

    pub async fn category(&self, name: &str, kind: CategoryType, accumulates: bool, budget: i64) -> i64 {
        let input = NewCategory {
            name: name.into(),
            accumulates,
            kind,
            group: self.group,
            budget,
        };
        self.ledger
            .create_category(&input, self.today)
            .await
            .unwrap()
            .id()
            .unwrap()
    }

    pub async fn balance(&self, wallet: i64) -> i64 {
        self.get(&monarch_core::schema::entities::WALLET, wallet)
            .await
            .and_then(|w| w.i64("balance"))
            .unwrap()
    }
}

/// A user with one currency, one account, one group and one expense category. Dates are
/// relative to the current day so budgets created now are in force for the month.
pub async fn fixture() -> Fixture {
    let model = Arc::new(SchemaModel::build("public").unwrap());
    let store = Arc::new(MemoryStore::new());
    let ledger = Ledger::new(store.clone(), model.clone());
    let mut fx = Fixture {
        store,
        model,
        ledger,
        today: Utc::now().date_naive(),
        role: 0,
        user: 0,
        currency: 0,
        user_currency: 0,
        account: 0,
        group: 0,
        groceries: 0,
    };

    fx.role = fx.seed(&ROLE, json!({ "tag": "user" })).await.id().unwrap();
    fx.user = fx
        .seed(
            &USER,
            json!({
                "email": "ana@example.com",
                "name": "Ana",
                "surname": "Diaz",
                "birthday": "1990-04-02",
                "googleId": "g-ana",
                "role": fx.role,
            }),
        )
        .await
        .id()
        .unwrap();
    fx.currency = fx
        .seed(&CURRENCY, json!({ "iso": "COP", "countryIso": "CO" }))
        .await
        .id()
        .unwrap();
    fx.user_currency = fx
        .ledger
        .add_user_currency(fx.user, fx.currency)
        .await
        .unwrap()
        .id()
        .unwrap();
    fx.account = fx
        .ledger
        .create_account(&NewAccount {
            name: "Bank".into(),
            currency: fx.user_currency,
        })
        .await
        .unwrap()
        .id()
        .unwrap();
    fx.group = fx
        .ledger
        .create_group(&NewGroup {
            name: "Home".into(),
            user: fx.user,
        })
        .await
        .unwrap()
        .id()
        .unwrap();
    fx.groceries = fx.category("Groceries", CategoryType::Expense, false, 400).await;
    fx
}
