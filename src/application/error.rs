use thiserror::Error;

use crate::domain::{AccountId, Cents};
use crate::storage::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Account {account_id} currency mismatch: {actual} vs {expected}")]
    CurrencyMismatch {
        account_id: AccountId,
        expected: String,
        actual: String,
    },

    #[error("Insufficient funds in account {account_id}: balance {balance}, required {required}")]
    InsufficientFunds {
        account_id: AccountId,
        balance: Cents,
        required: Cents,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Storage error: {0}")]
    Storage(#[source] StoreError),

    #[error("Storage left in unknown state: {0}")]
    Inconsistent(#[source] StoreError),
}

impl AppError {
    /// HTTP-equivalent status class for transport layers.
    pub fn status(&self) -> u16 {
        match self {
            AppError::InvalidRequest(_)
            | AppError::CurrencyMismatch { .. }
            | AppError::InsufficientFunds { .. } => 400,
            AppError::Unauthorized(_) => 401,
            AppError::NotFound(_) => 404,
            AppError::AlreadyExists(_) => 409,
            AppError::Storage(_) | AppError::Inconsistent(_) => 500,
        }
    }

    /// True when repeating the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Storage(err) if err.is_retryable())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => AppError::NotFound(err.to_string()),
            StoreError::AlreadyExists { .. } => AppError::AlreadyExists(err.to_string()),
            StoreError::RollbackFailed { .. } => AppError::Inconsistent(err),
            other => AppError::Storage(other),
        }
    }
}
