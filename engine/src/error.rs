//! Engine errors.
//!
//! Every variant except `Storage` is a rejected precondition: the operation changed
//! nothing. Undeliverable settlement transfers are not errors; they are reported in the
//! [`SettlementReport`](crate::SettlementReport) and kept as liabilities.

use commitclub_ledger::LedgerError;
use commitclub_types::{AccountId, Amount, CommitId, Timestamp};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClubError {
    #[error("invalid commitment parameters: {reason}")]
    InvalidParameters { reason: String },

    #[error("commitment {0} not found")]
    NotFound(CommitId),

    #[error("commitment {0} is already settled")]
    AlreadySettled(CommitId),

    #[error("{account} already joined commitment {id}")]
    AlreadyJoined { id: CommitId, account: AccountId },

    #[error("wrong stake amount: commitment requires exactly {expected}, got {got}")]
    WrongStakeAmount { expected: Amount, got: Amount },

    #[error("commitment {id} stopped accepting joins at {deadline}")]
    JoinClosed { id: CommitId, deadline: Timestamp },

    #[error("{account} has not joined commitment {id}")]
    NotAJoiner { id: CommitId, account: AccountId },

    #[error("{account} already checked in to commitment {id}")]
    AlreadyCheckedIn { id: CommitId, account: AccountId },

    #[error("wrong check-in code for commitment {0}")]
    WrongCode(CommitId),

    #[error("commitment {id} cannot settle before {deadline} (now {now})")]
    TooEarly {
        id: CommitId,
        deadline: Timestamp,
        now: Timestamp,
    },

    #[error("no outstanding liability of commitment {id} to {account}")]
    LiabilityNotFound { id: CommitId, account: AccountId },

    #[error("arithmetic overflow: {0}")]
    Overflow(String),

    #[error("commitment {id} is inconsistent: {reason}")]
    Corrupted { id: CommitId, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] commitclub_store::StoreError),
}

impl From<LedgerError> for ClubError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InvalidParameters { reason } => ClubError::InvalidParameters { reason },
            LedgerError::NotFound(id) => ClubError::NotFound(id),
            LedgerError::Storage(inner) => ClubError::Storage(inner),
        }
    }
}
