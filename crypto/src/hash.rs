//! Blake2b hashing for check-in codes.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use commitclub_types::CodeHash;

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Hash a check-in passphrase over its exact UTF-8 bytes.
///
/// No normalization is applied: codes are case- and whitespace-sensitive.
pub fn hash_code(passphrase: &str) -> CodeHash {
    CodeHash::new(blake2b_256(passphrase.as_bytes()))
}

/// Whether `presented` hashes to `expected`.
pub fn verify_code(presented: &str, expected: &CodeHash) -> bool {
    hash_code(presented).as_bytes() == expected.as_bytes()
}
