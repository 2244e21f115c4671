//! Cryptographic primitives for CommitClub.
//!
//! - **Blake2b-256** for hashing check-in passphrases
//!
//! The same function hashes the passphrase when a commitment is created and when a
//! participant presents it at check-in; the digests are compared byte-for-byte.

pub mod hash;

pub use hash::{blake2b_256, hash_code, verify_code};
