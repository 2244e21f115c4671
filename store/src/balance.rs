//! Payout balance storage trait.

use crate::StoreError;
use commitclub_types::{AccountId, Amount};

/// Durable per-account balances credited by settlement payouts.
pub trait BalanceStore {
    /// Add `amount` to the account's balance and return the new balance.
    fn credit(&self, account: &AccountId, amount: Amount) -> Result<Amount, StoreError>;

    /// Current balance, zero for an account never credited.
    fn balance(&self, account: &AccountId) -> Result<Amount, StoreError>;

    /// All non-zero balances.
    fn iter_balances(&self) -> Result<Vec<(AccountId, Amount)>, StoreError>;
}
