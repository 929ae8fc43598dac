// * Alias Hashing
// * Turns human-readable alert aliases into fixed-length Keccak-256 tokens used as
// * the de-duplication key and the wire-level alias

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;

// * "0x" plus 64 hex characters
pub const HASHED_ALIAS_LEN: usize = 66;

/// An alias that has already been hashed. Only [`hash_alias`] produces new
/// values; deserialization accepts aliases echoed back by the service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HashedAlias(String);

impl HashedAlias {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HashedAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for HashedAlias {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Hashes an alias. No salt, so the token is stable across restarts.
pub fn hash_alias(alias: &str) -> HashedAlias {
    let digest = Keccak256::digest(alias.as_bytes());
    HashedAlias(format!("0x{}", hex::encode(digest)))
}
