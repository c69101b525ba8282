//! Monarch core: personal-finance ledger on a generic relational repository with
//! relation populate, backed by PostgreSQL or an in-process store.

pub mod error;
pub mod ledger;
pub mod migration;
pub mod models;
pub mod query;
pub mod record;
pub mod reports;
pub mod routes;
pub mod schema;
pub mod service;
pub mod sessions;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use error::{AppError, DomainError, SchemaError};
pub use ledger::Ledger;
pub use migration::apply_migrations;
pub use query::{Op, Order, Query};
pub use record::{Found, Related, Row};
pub use reports::Reports;
pub use routes::{common_routes, common_routes_with_ready};
pub use schema::SchemaModel;
pub use service::Repository;
pub use sessions::Sessions;
pub use settings::Settings;
pub use state::AppState;
pub use store::{ensure_database_exists, MemoryStore, PgStore, Store};
