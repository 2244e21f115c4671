//! Nullable payout sink. Records transfers and rejects the recipients you choose.

use std::collections::{BTreeMap, HashSet};

use commitclub_store::{Payout, TransferError};
use commitclub_types::{AccountId, Amount};

/// An in-memory payout destination for testing.
///
/// Every delivered transfer is recorded in order. Recipients marked with
/// [`NullPayout::reject`] fail with [`TransferError::Rejected`] until
/// [`NullPayout::accept`] is called for them.
#[derive(Default)]
pub struct NullPayout {
    delivered: Vec<(AccountId, Amount)>,
    rejecting: HashSet<AccountId>,
    attempts: u32,
}

impl NullPayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make transfers to `account` fail.
    pub fn reject(&mut self, account: &AccountId) {
        self.rejecting.insert(account.clone());
    }

    /// Let transfers to `account` succeed again.
    pub fn accept(&mut self, account: &AccountId) {
        self.rejecting.remove(account);
    }

    /// Every successful transfer, in delivery order.
    pub fn delivered(&self) -> &[(AccountId, Amount)] {
        &self.delivered
    }

    /// Total delivered to one account, or `None` if the sum overflows.
    pub fn received_by(&self, account: &AccountId) -> Option<Amount> {
        Amount::checked_sum(
            self.delivered
                .iter()
                .filter(|(to, _)| to == account)
                .map(|(_, amount)| *amount),
        )
    }

    /// Total delivered to each account, or `None` if any sum overflows.
    pub fn totals(&self) -> Option<BTreeMap<AccountId, Amount>> {
        let mut totals = BTreeMap::new();
        for (to, amount) in &self.delivered {
            let entry = totals.entry(to.clone()).or_insert(Amount::ZERO);
            *entry = entry.checked_add(*amount)?;
        }
        Some(totals)
    }

    /// Sum of every delivered transfer, or `None` if it overflows.
    pub fn total_delivered(&self) -> Option<Amount> {
        Amount::checked_sum(self.delivered.iter().map(|(_, amount)| *amount))
    }

    /// Number of transfer calls, successful or not.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl Payout for NullPayout {
    fn transfer(&mut self, to: &AccountId, amount: Amount) -> Result<(), TransferError> {
        self.attempts += 1;
        if self.rejecting.contains(to) {
            return Err(TransferError::Rejected {
                account: to.clone(),
                reason: "recipient configured to reject".into(),
            });
        }
        self.delivered.push((to.clone(), amount));
        Ok(())
    }
}
