//! Residual liabilities: settlement payouts that could not be delivered.

use crate::StoreError;
use commitclub_types::{AccountId, Amount, CommitId, Timestamp};
use serde::{Deserialize, Serialize};

/// An amount a settled commitment still owes one recipient.
///
/// Created when a settlement transfer fails. The commitment itself stays settled; the
/// liability is retried independently until delivery succeeds and the record is removed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Liability {
    pub commit_id: CommitId,
    pub account: AccountId,
    pub amount: Amount,
    /// Reason reported by the failed transfer.
    pub reason: String,
    pub recorded_at: Timestamp,
    /// Delivery attempts so far, including the original settlement transfer.
    pub attempts: u32,
    pub last_attempt_at: Timestamp,
}

/// Trait for liability storage. Keyed by `(commit_id, account)`.
pub trait LiabilityStore {
    fn put_liability(&self, liability: &Liability) -> Result<(), StoreError>;

    fn get_liability(
        &self,
        commit_id: CommitId,
        account: &AccountId,
    ) -> Result<Option<Liability>, StoreError>;

    fn delete_liability(&self, commit_id: CommitId, account: &AccountId)
        -> Result<(), StoreError>;

    /// All outstanding liabilities ordered by commitment id.
    fn iter_liabilities(&self) -> Result<Vec<Liability>, StoreError>;

    /// Outstanding liabilities of one commitment.
    fn liabilities_for_commit(&self, commit_id: CommitId) -> Result<Vec<Liability>, StoreError> {
        Ok(self
            .iter_liabilities()?
            .into_iter()
            .filter(|l| l.commit_id == commit_id)
            .collect())
    }
}
