//! Parse and validation errors for the fundamental types.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypesError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("amount has more than {max} decimal places: {value}")]
    TooManyDecimals { value: String, max: u32 },

    #[error("amount overflows u128: {0}")]
    AmountOverflow(String),

    #[error("invalid account id: {0:?}")]
    InvalidAccount(String),

    #[error("invalid commitment id: {0:?}")]
    InvalidCommitId(String),

    #[error("invalid code hash (expected 64 hex characters): {0:?}")]
    InvalidCodeHash(String),
}
