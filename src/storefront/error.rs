use thiserror::Error;

use crate::account::{AuthError, PasswordError};
use crate::catalog::Gate;
use crate::payment::PaymentError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum StorefrontError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Unauthorized(#[from] AuthError),
    #[error("{0}")]
    Password(#[from] PasswordError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("gate {required} is locked (highest unlocked: {highest})")]
    Locked { required: Gate, highest: Gate },
    #[error("{0}")]
    Forbidden(String),
    #[error("Payment not completed")]
    PaymentNotCompleted,
    #[error("{0}")]
    Payment(#[from] PaymentError),
    #[error("{0}")]
    Store(StoreError),
}

impl From<StoreError> for StorefrontError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => StorefrontError::Conflict(message),
            StoreError::NotFound(what) => StorefrontError::NotFound(what),
            other => StorefrontError::Store(other),
        }
    }
}
