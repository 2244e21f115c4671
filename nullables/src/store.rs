//! Nullable stores: thread-safe in-memory storage for testing.
//!
//! Each store can be told to fail its writes, to exercise the engine's behaviour when
//! the backend goes away mid-operation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use commitclub_store::{
    BalanceStore, Commitment, CommitmentStore, Liability, LiabilityStore, StoreError,
};
use commitclub_types::{AccountId, Amount, CommitId};

fn injected_failure() -> StoreError {
    StoreError::Backend("injected write failure".into())
}

/// An in-memory commitment store for testing.
pub struct NullCommitmentStore {
    commitments: Mutex<BTreeMap<CommitId, Commitment>>,
    next_id: Mutex<CommitId>,
    fail_writes: AtomicBool,
}

impl NullCommitmentStore {
    pub fn new() -> Self {
        Self {
            commitments: Mutex::new(BTreeMap::new()),
            next_id: Mutex::new(CommitId::FIRST),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected_failure());
        }
        Ok(())
    }
}

impl Default for NullCommitmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitmentStore for NullCommitmentStore {
    fn next_commit_id(&self) -> Result<CommitId, StoreError> {
        Ok(*self.next_id.lock().unwrap())
    }

    fn insert_commitment(&self, commitment: &Commitment) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut commitments = self.commitments.lock().unwrap();
        if commitments.contains_key(&commitment.id) {
            return Err(StoreError::Duplicate(format!("commitment {}", commitment.id)));
        }
        let following = commitment
            .id
            .next()
            .ok_or_else(|| StoreError::Overflow("commitment id space exhausted".into()))?;
        commitments.insert(commitment.id, commitment.clone());
        let mut next_id = self.next_id.lock().unwrap();
        if following > *next_id {
            *next_id = following;
        }
        Ok(())
    }

    fn update_commitment<T, E>(
        &self,
        id: CommitId,
        mutate: impl FnOnce(&mut Commitment) -> Result<T, E>,
    ) -> Result<Result<T, E>, StoreError> {
        let mut commitments = self.commitments.lock().unwrap();
        let Some(existing) = commitments.get_mut(&id) else {
            return Err(StoreError::NotFound(format!("commitment {id}")));
        };
        let mut updated = existing.clone();
        let value = match mutate(&mut updated) {
            Ok(value) => value,
            Err(e) => return Ok(Err(e)),
        };
        if updated.id != id {
            return Err(StoreError::Corruption(format!(
                "update of commitment {id} changed its id to {}",
                updated.id
            )));
        }
        self.check_writable()?;
        *existing = updated;
        Ok(Ok(value))
    }

    fn get_commitment(&self, id: CommitId) -> Result<Option<Commitment>, StoreError> {
        Ok(self.commitments.lock().unwrap().get(&id).cloned())
    }

    fn commitment_count(&self) -> Result<u64, StoreError> {
        Ok(self.commitments.lock().unwrap().len() as u64)
    }

    fn iter_commitments(&self, offset: u64, limit: usize) -> Result<Vec<Commitment>, StoreError> {
        Ok(self
            .commitments
            .lock()
            .unwrap()
            .values()
            .skip(offset as usize)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// An in-memory liability store for testing.
pub struct NullLiabilityStore {
    liabilities: Mutex<BTreeMap<(CommitId, AccountId), Liability>>,
    fail_writes: AtomicBool,
}

impl NullLiabilityStore {
    pub fn new() -> Self {
        Self {
            liabilities: Mutex::new(BTreeMap::new()),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent write fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl Default for NullLiabilityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LiabilityStore for NullLiabilityStore {
    fn put_liability(&self, liability: &Liability) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected_failure());
        }
        self.liabilities.lock().unwrap().insert(
            (liability.commit_id, liability.account.clone()),
            liability.clone(),
        );
        Ok(())
    }

    fn get_liability(
        &self,
        commit_id: CommitId,
        account: &AccountId,
    ) -> Result<Option<Liability>, StoreError> {
        Ok(self
            .liabilities
            .lock()
            .unwrap()
            .get(&(commit_id, account.clone()))
            .cloned())
    }

    fn delete_liability(
        &self,
        commit_id: CommitId,
        account: &AccountId,
    ) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected_failure());
        }
        self.liabilities
            .lock()
            .unwrap()
            .remove(&(commit_id, account.clone()))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("liability {commit_id}/{account}")))
    }

    fn iter_liabilities(&self) -> Result<Vec<Liability>, StoreError> {
        Ok(self.liabilities.lock().unwrap().values().cloned().collect())
    }
}

/// An in-memory balance store for testing.
#[derive(Default)]
pub struct NullBalanceStore {
    balances: Mutex<BTreeMap<AccountId, Amount>>,
}

impl NullBalanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BalanceStore for NullBalanceStore {
    fn credit(&self, account: &AccountId, amount: Amount) -> Result<Amount, StoreError> {
        let mut balances = self.balances.lock().unwrap();
        let entry = balances.entry(account.clone()).or_insert(Amount::ZERO);
        *entry = entry
            .checked_add(amount)
            .ok_or_else(|| StoreError::Overflow(format!("balance of {account}")))?;
        Ok(*entry)
    }

    fn balance(&self, account: &AccountId) -> Result<Amount, StoreError> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(account)
            .copied()
            .unwrap_or(Amount::ZERO))
    }

    fn iter_balances(&self) -> Result<Vec<(AccountId, Amount)>, StoreError> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(account, amount)| (account.clone(), *amount))
            .collect())
    }
}
