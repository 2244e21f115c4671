//! Outbound fund transfers.
//!
//! Settlement hands every payout to a [`Payout`] sink. A sink may refuse an individual
//! transfer; the caller decides what to do with the undelivered amount.

use thiserror::Error;

use crate::{BalanceStore, StoreError};
use commitclub_types::{AccountId, Amount};

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("recipient {account} rejected the transfer: {reason}")]
    Rejected { account: AccountId, reason: String },

    #[error("transfer backend unavailable: {0}")]
    Unavailable(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// A destination for settled funds.
pub trait Payout {
    /// Deliver `amount` to `to`. Either the whole amount arrives or none of it does.
    fn transfer(&mut self, to: &AccountId, amount: Amount) -> Result<(), TransferError>;
}

/// Payout sink that credits a durable [`BalanceStore`].
pub struct BalanceBook<B> {
    balances: B,
}

impl<B: BalanceStore> BalanceBook<B> {
    pub fn new(balances: B) -> Self {
        Self { balances }
    }

    pub fn balances(&self) -> &B {
        &self.balances
    }
}

impl<B: BalanceStore> Payout for BalanceBook<B> {
    fn transfer(&mut self, to: &AccountId, amount: Amount) -> Result<(), TransferError> {
        self.balances.credit(to, amount)?;
        Ok(())
    }
}
