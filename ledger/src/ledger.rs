//! The commitment ledger.

use serde::{Deserialize, Serialize};

use commitclub_store::{Commitment, CommitmentStore, StoreError};
use commitclub_types::{AccountId, Amount, CodeHash, CommitId, Timestamp};

use crate::LedgerError;

/// Creation parameters for a commitment. All of them are immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentParams {
    pub name: String,
    pub stake_amount: Amount,
    pub min_check_ins: u32,
    pub deadline: Timestamp,
    /// Hash of the check-in passphrase; the plaintext never reaches the ledger.
    pub code_hash: CodeHash,
}

impl CommitmentParams {
    fn validate(&self, now: Timestamp) -> Result<(), LedgerError> {
        let reason = if self.stake_amount.is_zero() {
            "stake amount must be greater than zero"
        } else if self.min_check_ins == 0 {
            "minimum check-ins must be at least one"
        } else if self.deadline <= now {
            "deadline must be in the future"
        } else {
            return Ok(());
        };
        Err(LedgerError::InvalidParameters {
            reason: reason.to_string(),
        })
    }
}

/// Owns the commitment store and mediates every read and write of commitment state.
pub struct CommitmentLedger<S> {
    store: S,
}

impl<S: CommitmentStore> CommitmentLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create a commitment and return its id.
    ///
    /// Fails with [`LedgerError::InvalidParameters`] when the stake is zero, the threshold
    /// is zero, or the deadline is not strictly after `now`. Nothing is stored on failure.
    pub fn create(
        &mut self,
        organizer: &AccountId,
        params: CommitmentParams,
        now: Timestamp,
    ) -> Result<CommitId, LedgerError> {
        params.validate(now)?;

        let id = self.store.next_commit_id()?;
        let commitment = Commitment {
            id,
            organizer: organizer.clone(),
            name: params.name,
            stake_amount: params.stake_amount,
            min_check_ins: params.min_check_ins,
            deadline: params.deadline,
            code_hash: params.code_hash,
            joiners: Vec::new(),
            attendees: Vec::new(),
            total_staked: Amount::ZERO,
            settled: false,
            created_at: now,
            settlement: None,
        };
        self.store.insert_commitment(&commitment)?;
        Ok(id)
    }

    /// Snapshot of a commitment.
    pub fn get(&self, id: CommitId) -> Result<Commitment, LedgerError> {
        self.store
            .get_commitment(id)?
            .ok_or(LedgerError::NotFound(id))
    }

    /// Apply `mutate` to a commitment as one indivisible step.
    ///
    /// `mutate` sees the current record inside the store's exclusive write, so its checks
    /// run against the state it will overwrite, even with other processes on the same
    /// store. If it returns `Ok`, the whole record is written back; if it returns `Err`,
    /// or the write fails, the stored record is untouched.
    pub fn update<T, E>(
        &mut self,
        id: CommitId,
        mutate: impl FnOnce(&mut Commitment) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<LedgerError>,
    {
        match self.store.update_commitment(id, mutate) {
            Ok(result) => result,
            Err(StoreError::NotFound(_)) => Err(LedgerError::NotFound(id).into()),
            Err(e) => Err(LedgerError::from(e).into()),
        }
    }

    pub fn count(&self) -> Result<u64, LedgerError> {
        Ok(self.store.commitment_count()?)
    }

    /// Up to `limit` commitments in id order, skipping the first `offset`.
    pub fn list(&self, offset: u64, limit: usize) -> Result<Vec<Commitment>, LedgerError> {
        Ok(self.store.iter_commitments(offset, limit)?)
    }
}
