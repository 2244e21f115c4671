//! LMDB implementation of BalanceStore.
//!
//! Key: account bytes. Value: balance as 16 little-endian bytes.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use commitclub_store::balance::BalanceStore;
use commitclub_store::StoreError;
use commitclub_types::{AccountId, Amount};

use crate::LmdbError;

pub struct LmdbBalanceStore {
    pub(crate) env: Arc<Env>,
    pub(crate) balances_db: Database<Bytes, Bytes>,
}

fn decode_balance(bytes: &[u8]) -> Result<Amount, LmdbError> {
    let arr: [u8; 16] = bytes
        .try_into()
        .map_err(|_| LmdbError::Serialization("invalid balance length".into()))?;
    Ok(Amount::new(u128::from_le_bytes(arr)))
}

impl BalanceStore for LmdbBalanceStore {
    fn credit(&self, account: &AccountId, amount: Amount) -> Result<Amount, StoreError> {
        let key = account.as_str().as_bytes();
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let current = match self.balances_db.get(&wtxn, key).map_err(LmdbError::from)? {
            Some(bytes) => decode_balance(bytes)?,
            None => Amount::ZERO,
        };
        let updated = current
            .checked_add(amount)
            .ok_or_else(|| StoreError::Overflow(format!("balance of {account}")))?;
        self.balances_db
            .put(&mut wtxn, key, &updated.raw().to_le_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(updated)
    }

    fn balance(&self, account: &AccountId) -> Result<Amount, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .balances_db
            .get(&rtxn, account.as_str().as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(decode_balance(bytes)?),
            None => Ok(Amount::ZERO),
        }
    }

    fn iter_balances(&self) -> Result<Vec<(AccountId, Amount)>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for item in self.balances_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (key, bytes) = item.map_err(LmdbError::from)?;
            let account = std::str::from_utf8(key)
                .map_err(|e| LmdbError::Serialization(e.to_string()))?;
            let amount = decode_balance(bytes)?;
            if !amount.is_zero() {
                results.push((AccountId::new(account), amount));
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;

    #[test]
    fn credits_accumulate() {
        let dir = tempfile::tempdir().expect("temp dir");
        let env = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).unwrap();
        let store = env.balance_store();
        let alice = AccountId::new("alice");

        assert_eq!(store.balance(&alice).unwrap(), Amount::ZERO);
        store.credit(&alice, Amount::new(7)).unwrap();
        let total = store.credit(&alice, Amount::new(5)).unwrap();
        assert_eq!(total, Amount::new(12));
        assert_eq!(store.iter_balances().unwrap(), vec![(alice, Amount::new(12))]);
    }

    #[test]
    fn overflowing_credit_leaves_balance_unchanged() {
        let dir = tempfile::tempdir().expect("temp dir");
        let env = LmdbEnvironment::open(dir.path(), 16 * 1024 * 1024).unwrap();
        let store = env.balance_store();
        let bob = AccountId::new("bob");
        store.credit(&bob, Amount::new(u128::MAX)).unwrap();
        assert!(matches!(
            store.credit(&bob, Amount::new(1)).unwrap_err(),
            StoreError::Overflow(_)
        ));
        assert_eq!(store.balance(&bob).unwrap(), Amount::new(u128::MAX));
    }
}
