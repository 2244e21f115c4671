//! Abstract storage and payout traits for CommitClub.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these traits, and every
//! destination for settled funds implements [`Payout`].
//! The rest of the codebase depends only on the traits and the record types defined here.

pub mod balance;
pub mod commitment;
pub mod error;
pub mod liability;
pub mod meta;
pub mod payout;

pub use balance::BalanceStore;
pub use commitment::{
    Commitment, CommitmentStatus, CommitmentStore, DeliveryStatus, Outcome, Payment,
    SettlementRecord,
};
pub use error::StoreError;
pub use liability::{Liability, LiabilityStore};
pub use meta::MetaStore;
pub use payout::{BalanceBook, Payout, TransferError};
