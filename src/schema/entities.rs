//! Declared tables of the finance store, in dependency order (referenced tables first).

use super::types::{ColumnDef as C, ColumnDefault, ColumnKind as K, EntityDef, CREATED_AT, ID, UPDATED_AT};

pub const MODULE: EntityDef = EntityDef {
    table: "module",
    key: "module",
    columns: &[
        ID,
        C::new("sequence", "sequence", K::BigInt),
        C::new("tag", "tag", K::Text),
        C::new("icon", "icon", K::Text),
        C::new("route", "route", K::Text),
        C::new("active", "active", K::Bool).default(ColumnDefault::Bool(true)),
        CREATED_AT,
        UPDATED_AT,
    ],
    unique_keys: &[],
};

pub const ROLE: EntityDef = EntityDef {
    table: "role",
    key: "role",
    columns: &[ID, C::new("tag", "tag", K::Text), CREATED_AT, UPDATED_AT],
    unique_keys: &[],
};

pub const ROLE_MODULE: EntityDef = EntityDef {
    table: "role_module",
    key: "roleModule",
    columns: &[
        ID,
        C::foreign("role", "role"),
        C::foreign("module", "module"),
        CREATED_AT,
        UPDATED_AT,
    ],
    unique_keys: &[],
};

pub const CURRENCY: EntityDef = EntityDef {
    table: "currency",
    key: "currency",
    columns: &[
        ID,
        C::new("iso", "iso", K::Text).unique(),
        C::new("countryIso", "country_iso", K::Text).unique(),
        CREATED_AT,
        UPDATED_AT,
    ],
    unique_keys: &[],
};

pub const USER: EntityDef = EntityDef {
    table: "user",
    key: "user",
    columns: &[
        ID,
        C::new("email", "email", K::Text),
        C::new("name", "name", K::Text),
        C::new("surname", "surname", K::Text),
        C::new("birthday", "birthday", K::Date),
        C::new("active", "active", K::Bool).default(ColumnDefault::Bool(true)),
        C::new("googleId", "google_id", K::Text).nullable(),
        C::foreign("role", "role"),
        CREATED_AT,
        UPDATED_AT,
    ],
    unique_keys: &[],
};

pub const SESSION: EntityDef = EntityDef {
    table: "session",
    key: "session",
    columns: &[
        ID,
        C::new("token", "token", K::Text).unique(),
        C::foreign("user", "user"),
        CREATED_AT,
        UPDATED_AT,
    ],
    unique_keys: &[],
};

pub const USER_CURRENCY: EntityDef = EntityDef {
    table: "user_currency",
    key: "userCurrency",
    columns: &[
        ID,
        C::new("active", "active", K::Bool).default(ColumnDefault::Bool(true)),
        C::new("main", "main", K::Bool).default(ColumnDefault::Bool(false)),
        C::foreign("user", "user"),
        C::foreign("currency", "currency"),
        CREATED_AT,
        UPDATED_AT,
    ],
    unique_keys: &[],
};

pub const ACCOUNT: EntityDef = EntityDef {
    table: "account",
    key: "account",
    columns: &[
        ID,
        C::new("name", "name", K::Text),
        C::foreign("currency", "user_currency"),
        CREATED_AT,
        UPDATED_AT,
    ],
    unique_keys: &[],
};

pub const WALLET: EntityDef = EntityDef {
    table: "wallet",
    key: "wallet",
    columns: &[
        ID,
        C::new("name", "name", K::Text),
        C::new("balance", "balance", K::BigInt).default(ColumnDefault::Int(0)),
        C::new("type", "type", K::Text),
        C::foreign("account", "account"),
        CREATED_AT,
        UPDATED_AT,
    ],
    unique_keys: &[],
};

pub const BACKUP: EntityDef = EntityDef {
    table: "backup",
    key: "backup",
    columns: &[
        ID,
        C::new("date", "date", K::Date),
        C::foreign("user", "user"),
        CREATED_AT,
        UPDATED_AT,
    ],
    unique_keys: &[&["user", "date"]],
};

pub const WALLET_BACKUP: EntityDef = EntityDef {
    table: "wallet_backup",
    key: "walletBackup",
    columns: &[
        ID,
        C::new("balance", "balance", K::BigInt),
        C::foreign("wallet", "wallet"),
        C::foreign("backup", "backup"),
        CREATED_AT,
        UPDATED_AT,
    ],
    unique_keys: &[],
};

pub const GROUP: EntityDef = EntityDef {
    table: "group",
    key: "group",
    columns: &[
        ID,
        C::new("name", "name", K::Text),
        C::foreign("user", "user"),
        CREATED_AT,
        UPDATED_AT,
    ],
    unique_keys: &[],
};

pub const CATEGORY: EntityDef = EntityDef {
    table: "category",
    key: "category",
    columns: &[
        ID,
        C::new("name", "name", K::Text),
        C::new("accumulates", "accumulates", K::Bool),
        C::new("type", "type", K::Text),
        C::foreign("group", "group"),
        CREATED_AT,
        UPDATED_AT,
    ],
    unique_keys: &[],
};

pub const BUDGET: EntityDef = EntityDef {
    table: "budget",
    key: "budget",
    columns: &[
        ID,
        C::new("amount", "amount", K::BigInt),
        C::foreign("category", "category"),
        CREATED_AT,
        UPDATED_AT,
    ],
    unique_keys: &[],
};

pub const CATEGORY_BACKUP: EntityDef = EntityDef {
    table: "category_backup",
    key: "categoryBackup",
    columns: &[
        ID,
        C::new("spent", "spent", K::BigInt),
        C::new("accumulated", "accumulated", K::BigInt).nullable(),
        C::foreign("category", "category"),
        C::foreign("backup", "backup"),
        CREATED_AT,
        UPDATED_AT,
    ],
    unique_keys: &[],
};

pub const TRANSACTION: EntityDef = EntityDef {
    table: "transaction",
    key: "transaction",
    columns: &[
        ID,
        C::new("date", "date", K::Date),
        C::new("totalAmount", "total_amount", K::BigInt),
        C::new("type", "type", K::Text),
        C::foreign("category", "category"),
        CREATED_AT,
        UPDATED_AT,
    ],
    unique_keys: &[],
};

pub const PAYMENT: EntityDef = EntityDef {
    table: "payment",
    key: "payment",
    columns: &[
        ID,
        C::new("amount", "amount", K::BigInt),
        C::new("type", "type", K::Text),
        C::foreign("wallet", "wallet"),
        C::foreign("transaction", "transaction"),
        CREATED_AT,
        UPDATED_AT,
    ],
    unique_keys: &[],
};

/// All entities, referenced tables before referencing ones.
pub const ENTITIES: &[&EntityDef] = &[
    &MODULE,
    &ROLE,
    &ROLE_MODULE,
    &CURRENCY,
    &USER,
    &SESSION,
    &USER_CURRENCY,
    &ACCOUNT,
    &WALLET,
    &BACKUP,
    &WALLET_BACKUP,
    &GROUP,
    &CATEGORY,
    &BUDGET,
    &CATEGORY_BACKUP,
    &TRANSACTION,
    &PAYMENT,
];
