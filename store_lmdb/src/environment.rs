//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use commitclub_store::MetaStore;

use crate::{
    LmdbBalanceStore, LmdbCommitmentStore, LmdbError, LmdbLiabilityStore, LmdbMetaStore,
};

/// Schema version written to fresh databases.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Named databases inside the environment.
pub(crate) const DATABASES: &[&str] = &["commitments", "liabilities", "balances", "meta"];

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    pub(crate) commitments_db: Database<Bytes, Bytes>,
    pub(crate) liabilities_db: Database<Bytes, Bytes>,
    pub(crate) balances_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    ///
    /// Creates the directory and every named database if missing, stamps a fresh
    /// database with [`CURRENT_SCHEMA_VERSION`] and refuses to open a newer schema.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process for this path and never
        // through another handle while it is alive.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(DATABASES.len() as u32)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let commitments_db = env.create_database(&mut wtxn, Some("commitments"))?;
        let liabilities_db = env.create_database(&mut wtxn, Some("liabilities"))?;
        let balances_db = env.create_database(&mut wtxn, Some("balances"))?;
        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        wtxn.commit()?;

        let environment = Self {
            env: Arc::new(env),
            commitments_db,
            liabilities_db,
            balances_db,
            meta_db,
        };
        environment.ensure_schema()?;

        tracing::debug!(path = %path.display(), map_size, "opened LMDB environment");
        Ok(environment)
    }

    fn ensure_schema(&self) -> Result<(), LmdbError> {
        let meta = self.meta_store();
        let found = meta.get_schema_version()?;
        if found == 0 {
            meta.set_schema_version(CURRENT_SCHEMA_VERSION)?;
        } else if found > CURRENT_SCHEMA_VERSION {
            return Err(LmdbError::SchemaMismatch {
                found,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }
        Ok(())
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    pub fn commitment_store(&self) -> LmdbCommitmentStore {
        LmdbCommitmentStore {
            env: Arc::clone(&self.env),
            commitments_db: self.commitments_db,
            meta_db: self.meta_db,
        }
    }

    pub fn liability_store(&self) -> LmdbLiabilityStore {
        LmdbLiabilityStore {
            env: Arc::clone(&self.env),
            liabilities_db: self.liabilities_db,
        }
    }

    pub fn balance_store(&self) -> LmdbBalanceStore {
        LmdbBalanceStore {
            env: Arc::clone(&self.env),
            balances_db: self.balances_db,
        }
    }

    pub fn meta_store(&self) -> LmdbMetaStore {
        LmdbMetaStore {
            env: Arc::clone(&self.env),
            meta_db: self.meta_db,
        }
    }
}
