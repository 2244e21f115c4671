//! LMDB implementation of CommitmentStore.
//!
//! Key format: the commitment id as 8 big-endian bytes, so cursor order is id order.
//! The id counter lives in the meta database under [`NEXT_COMMIT_ID_KEY`] and is advanced
//! in the same write transaction that inserts the record.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RoTxn};

use commitclub_store::commitment::{Commitment, CommitmentStore};
use commitclub_store::StoreError;
use commitclub_types::CommitId;

use crate::LmdbError;

/// Meta key holding the next id to allocate (8 big-endian bytes).
pub const NEXT_COMMIT_ID_KEY: &[u8] = b"next_commit_id";

pub struct LmdbCommitmentStore {
    pub(crate) env: Arc<Env>,
    pub(crate) commitments_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbCommitmentStore {
    fn read_next_id(&self, rtxn: &RoTxn) -> Result<CommitId, LmdbError> {
        match self.meta_db.get(rtxn, NEXT_COMMIT_ID_KEY)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.try_into().map_err(|_| {
                    LmdbError::Serialization("next_commit_id has unexpected byte length".into())
                })?;
                Ok(CommitId::from_key(arr))
            }
            None => Ok(CommitId::FIRST),
        }
    }
}

impl CommitmentStore for LmdbCommitmentStore {
    fn next_commit_id(&self) -> Result<CommitId, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.read_next_id(&rtxn)?)
    }

    fn insert_commitment(&self, commitment: &Commitment) -> Result<(), StoreError> {
        let key = commitment.id.to_key();
        let bytes = bincode::serialize(commitment).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;

        if self
            .commitments_db
            .get(&wtxn, &key)
            .map_err(LmdbError::from)?
            .is_some()
        {
            return Err(StoreError::Duplicate(format!("commitment {}", commitment.id)));
        }
        let current_next = self.read_next_id(&wtxn)?;
        let following = commitment
            .id
            .next()
            .ok_or_else(|| StoreError::Overflow("commitment id space exhausted".into()))?;

        self.commitments_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        if following > current_next {
            self.meta_db
                .put(&mut wtxn, NEXT_COMMIT_ID_KEY, &following.to_key())
                .map_err(LmdbError::from)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn update_commitment<T, E>(
        &self,
        id: CommitId,
        mutate: impl FnOnce(&mut Commitment) -> Result<T, E>,
    ) -> Result<Result<T, E>, StoreError> {
        let key = id.to_key();
        // The write transaction holds LMDB's writer lock from the read to the commit.
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut commitment: Commitment = match self
            .commitments_db
            .get(&wtxn, &key)
            .map_err(LmdbError::from)?
        {
            Some(bytes) => bincode::deserialize(bytes).map_err(LmdbError::from)?,
            None => return Err(StoreError::NotFound(format!("commitment {id}"))),
        };

        let value = match mutate(&mut commitment) {
            Ok(value) => value,
            Err(e) => return Ok(Err(e)),
        };
        if commitment.id != id {
            return Err(StoreError::Corruption(format!(
                "update of commitment {id} changed its id to {}",
                commitment.id
            )));
        }

        let bytes = bincode::serialize(&commitment).map_err(LmdbError::from)?;
        self.commitments_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(Ok(value))
    }

    fn get_commitment(&self, id: CommitId) -> Result<Option<Commitment>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .commitments_db
            .get(&rtxn, &id.to_key())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => {
                let commitment: Commitment =
                    bincode::deserialize(bytes).map_err(LmdbError::from)?;
                Ok(Some(commitment))
            }
            None => Ok(None),
        }
    }

    fn commitment_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.commitments_db.len(&rtxn).map_err(LmdbError::from)?)
    }

    fn iter_commitments(&self, offset: u64, limit: usize) -> Result<Vec<Commitment>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let iter = self.commitments_db.iter(&rtxn).map_err(LmdbError::from)?;
        let mut results = Vec::new();
        for item in iter.skip(offset as usize).take(limit) {
            let (_key, bytes) = item.map_err(LmdbError::from)?;
            let commitment: Commitment = bincode::deserialize(bytes).map_err(LmdbError::from)?;
            results.push(commitment);
        }
        Ok(results)
    }
}
