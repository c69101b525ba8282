//! Process settings read from the environment (`.env` is loaded by the binary).

use crate::error::AppError;
use crate::schema::validator::identifier_pattern;
use std::net::SocketAddr;

pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/monarch";

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub database_url: String,
    /// PostgreSQL schema holding every table.
    pub schema: String,
    pub bind: SocketAddr,
    pub max_connections: u32,
    pub session_ttl: chrono::Duration,
}

impl Settings {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let schema = get("MONARCH_SCHEMA").unwrap_or_else(|| "public".into());
        if !identifier_pattern().is_match(&schema) {
            return Err(AppError::Validation(format!("MONARCH_SCHEMA is not a valid identifier: {}", schema)));
        }
        let bind = get("MONARCH_BIND")
            .unwrap_or_else(|| "0.0.0.0:7994".into())
            .parse::<SocketAddr>()
            .map_err(|e| AppError::Validation(format!("MONARCH_BIND: {}", e)))?;
        let max_connections = parse_number(&get, "DB_MAX_CONNECTIONS", 5)?;
        let ttl_minutes = parse_number(&get, "SESSION_TTL_MINUTES", 15)?;
        Ok(Settings {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            schema,
            bind,
            max_connections,
            session_ttl: chrono::Duration::minutes(i64::from(ttl_minutes)),
        })
    }
}

fn parse_number(get: &impl Fn(&str) -> Option<String>, key: &str, default: u32) -> Result<u32, AppError> {
    match get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| AppError::Validation(format!("{} must be a positive integer, got {:?}", key, raw))),
    }
}
