//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Problems in the static entity declarations, detected once at startup.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("duplicate {kind}: {name}")]
    Duplicate { kind: &'static str, name: String },
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}

/// Business-rule violations. Each carries a user-facing message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("transfers must use the same currency on both wallets (exit wallet {exit_wallet}, entry wallet {entry_wallet})")]
    CurrencyMismatch { exit_wallet: i64, entry_wallet: i64 },
    #[error("transfer requires two different wallets (wallet {0})")]
    SameWallet(i64),
    #[error("exchange transactions are not implemented")]
    ExchangeNotSupported,
    #[error("user is not registered")]
    UnknownUser,
    #[error("user is inactive")]
    InactiveUser,
    #[error("session not found")]
    SessionNotFound,
    #[error("session has expired")]
    SessionExpired,
    #[error("user {0} has no main currency")]
    NoMainCurrency(i64),
}

impl DomainError {
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::CurrencyMismatch { .. } => "currency_mismatch",
            DomainError::SameWallet(_) => "same_wallet",
            DomainError::ExchangeNotSupported => "exchange_not_supported",
            DomainError::UnknownUser => "unknown_user",
            DomainError::InactiveUser => "inactive_user",
            DomainError::SessionNotFound => "session_not_found",
            DomainError::SessionExpired => "session_expired",
            DomainError::NoMainCurrency(_) => "no_main_currency",
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A descriptor or record named a table, field or relation the model does not have.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("storage: {0}")]
    Storage(String),
}

impl AppError {
    /// True for faults of the storage layer (as opposed to caller or rule errors).
    pub fn is_storage_fault(&self) -> bool {
        matches!(self, AppError::Db(_) | AppError::Storage(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::SchemaMismatch(format!("record shape: {}", e))
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Schema(_) => (StatusCode::INTERNAL_SERVER_ERROR, "schema_error"),
            AppError::SchemaMismatch(_) => (StatusCode::BAD_REQUEST, "schema_mismatch"),
            AppError::Domain(d) => match d {
                DomainError::SessionNotFound | DomainError::SessionExpired => {
                    (StatusCode::UNAUTHORIZED, d.code())
                }
                DomainError::UnknownUser | DomainError::InactiveUser => (StatusCode::FORBIDDEN, d.code()),
                _ => (StatusCode::UNPROCESSABLE_ENTITY, d.code()),
            },
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::Db(sqlx::Error::RowNotFound) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Db(_) | AppError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error"),
        };
        let message = if self.is_storage_fault() && status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "storage fault");
            "server error".to_string()
        } else {
            self.to_string()
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
