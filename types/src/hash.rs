//! Check-in code hash.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// A 32-byte one-way hash of a commitment's check-in passphrase.
///
/// Only this digest is ever stored or emitted; the plaintext passphrase never leaves the
/// caller that hashed it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeHash([u8; 32]);

impl CodeHash {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for CodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CodeHash({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for CodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Parses the 64-character lowercase or uppercase hex form printed by `Display`.
impl FromStr for CodeHash {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s.trim(), &mut bytes)
            .map_err(|_| TypesError::InvalidCodeHash(s.to_string()))?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_parse_roundtrip() {
        let hash = CodeHash::new([0xab; 32]);
        let text = hash.to_string();
        assert_eq!(text.len(), 64);
        assert_eq!(text.parse::<CodeHash>().unwrap(), hash);
        assert_eq!(text.to_uppercase().parse::<CodeHash>().unwrap(), hash);
    }

    #[test]
    fn rejects_bad_hex() {
        assert!("abcd".parse::<CodeHash>().is_err());
        assert!("zz".repeat(32).parse::<CodeHash>().is_err());
    }

    #[test]
    fn debug_is_abbreviated() {
        assert_eq!(format!("{:?}", CodeHash::new([1; 32])), "CodeHash(01010101)");
    }
}
