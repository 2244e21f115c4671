//! Fundamental types for CommitClub.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! commitment ids, participant accounts, stake amounts, timestamps and code hashes.

pub mod account;
pub mod amount;
pub mod error;
pub mod hash;
pub mod id;
pub mod time;

pub use account::AccountId;
pub use amount::Amount;
pub use error::TypesError;
pub use hash::CodeHash;
pub use id::CommitId;
pub use time::Timestamp;
