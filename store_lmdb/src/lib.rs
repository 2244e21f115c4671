//! LMDB storage backend for CommitClub.
//!
//! Implements all storage traits from `commitclub-store` using the `heed` LMDB bindings.
//! Each logical store maps to one named database within a single environment, and every
//! trait write runs in exactly one committed write transaction.

pub mod balance;
pub mod commitment;
pub mod environment;
pub mod error;
pub mod integrity;
pub mod liability;
pub mod meta;

pub use balance::LmdbBalanceStore;
pub use commitment::LmdbCommitmentStore;
pub use environment::{LmdbEnvironment, CURRENT_SCHEMA_VERSION};
pub use error::LmdbError;
pub use integrity::{check_integrity, IntegrityReport};
pub use liability::LmdbLiabilityStore;
pub use meta::LmdbMetaStore;
