//! The 32-byte digest type used throughout the engine, and the two digest
//! functions the wire formats rely on.
//!
//! Internal digests (block hashes, transaction IDs, witness IDs, sighashes,
//! signed-blocks keys) use Blake2b-256, matching the rest of the engine's
//! hashing. The Patricia trie's leaf keys are SHA-3 of the output
//! commitment instead, via [`sha3_256`].

use blake2::{Blake2b512, Digest as _};
use serde::{Deserialize, Serialize};
use sha3::{Digest as _, Sha3_256};
use std::fmt;

/// A fixed 32-byte identifier: block hashes, transaction hashes, asset IDs,
/// output IDs, and trie node digests all share this type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out)?;
        Ok(Hash(out))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; 32]> for Hash {
    fn from(b: [u8; 32]) -> Self {
        Hash(b)
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Blake2b-256 over the concatenation of `parts`. Used for all internal
/// digests other than trie leaf keys.
pub fn blake2b256(parts: &[&[u8]]) -> Hash {
    let mut hasher = Blake2b512::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..32]);
    Hash(out)
}

/// SHA3-256 over the concatenation of `parts`. Used for trie leaf keys.
pub fn sha3_256(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha3_256::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..32]);
    Hash(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let h = blake2b256(&[b"hello"]);
        let s = h.to_hex();
        assert_eq!(Hash::from_hex(&s).unwrap(), h);
    }

    #[test]
    fn distinct_functions_disagree() {
        let a = blake2b256(&[b"x"]);
        let b = sha3_256(&[b"x"]);
        assert_ne!(a, b);
    }
}
