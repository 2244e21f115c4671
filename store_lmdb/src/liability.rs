//! LMDB implementation of LiabilityStore.
//!
//! Key format: `commit_id (8 bytes BE) ++ account.as_str().as_bytes()`, so all liabilities
//! of one commitment share a prefix and iterate together.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use commitclub_store::liability::{Liability, LiabilityStore};
use commitclub_store::StoreError;
use commitclub_types::{AccountId, CommitId};

use crate::LmdbError;

pub struct LmdbLiabilityStore {
    pub(crate) env: Arc<Env>,
    pub(crate) liabilities_db: Database<Bytes, Bytes>,
}

fn liability_key(commit_id: CommitId, account: &AccountId) -> Vec<u8> {
    let account = account.as_str().as_bytes();
    let mut key = Vec::with_capacity(8 + account.len());
    key.extend_from_slice(&commit_id.to_key());
    key.extend_from_slice(account);
    key
}

impl LiabilityStore for LmdbLiabilityStore {
    fn put_liability(&self, liability: &Liability) -> Result<(), StoreError> {
        let key = liability_key(liability.commit_id, &liability.account);
        let bytes = bincode::serialize(liability).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.liabilities_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_liability(
        &self,
        commit_id: CommitId,
        account: &AccountId,
    ) -> Result<Option<Liability>, StoreError> {
        let key = liability_key(commit_id, account);
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .liabilities_db
            .get(&rtxn, &key)
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    fn delete_liability(
        &self,
        commit_id: CommitId,
        account: &AccountId,
    ) -> Result<(), StoreError> {
        let key = liability_key(commit_id, account);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let existed = self
            .liabilities_db
            .delete(&mut wtxn, &key)
            .map_err(LmdbError::from)?;
        if !existed {
            return Err(StoreError::NotFound(format!(
                "liability {commit_id}/{account}"
            )));
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn iter_liabilities(&self) -> Result<Vec<Liability>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for item in self.liabilities_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_key, bytes) = item.map_err(LmdbError::from)?;
            results.push(bincode::deserialize(bytes).map_err(LmdbError::from)?);
        }
        Ok(results)
    }

    fn liabilities_for_commit(&self, commit_id: CommitId) -> Result<Vec<Liability>, StoreError> {
        let prefix = commit_id.to_key();
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for item in self
            .liabilities_db
            .prefix_iter(&rtxn, &prefix)
            .map_err(LmdbError::from)?
        {
            let (_key, bytes) = item.map_err(LmdbError::from)?;
            results.push(bincode::deserialize(bytes).map_err(LmdbError::from)?);
        }
        Ok(results)
    }
}
