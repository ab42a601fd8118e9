//! SHA-512 digest utilities for the ledger.
//!
//! Every identity in the system (transaction ids, output ids, Merkle nodes,
//! block digests) is the lowercase hex rendering of a SHA-512 hash over a
//! string built by plain concatenation.

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha512};
use std::fmt;

/// Length in hex characters of a digest produced by [`hash`].
pub const DIGEST_HEX_LEN: usize = 128;

/// Previous-digest sentinel carried by the genesis block.
pub const GENESIS_SENTINEL: &str = "0";

/// A hex-encoded digest.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// The previous digest used by the genesis block.
    pub fn genesis_sentinel() -> Self {
        Self(GENESIS_SENTINEL.to_string())
    }

    /// Wrap an already-rendered digest string.
    pub fn from_hex(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the placeholder digest of an unmined block.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Count the leading `'0'` characters.
    pub fn leading_zeros(&self) -> usize {
        self.0.chars().take_while(|c| *c == '0').count()
    }

    /// Check the proof-of-work rule: the first `difficulty` characters are all `'0'`.
    ///
    /// An empty digest never qualifies, not even at difficulty 0.
    pub fn meets_difficulty(&self, difficulty: usize) -> bool {
        !self.is_empty() && self.0.len() >= difficulty && self.leading_zeros() >= difficulty
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.0.get(..12).unwrap_or(&self.0);
        write!(f, "Digest({})", short)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Hash a string with SHA-512 and hex-encode the result.
pub fn hash(data: &str) -> Digest {
    hash_bytes(data.as_bytes())
}

/// Hash raw bytes with SHA-512 and hex-encode the result.
pub fn hash_bytes(data: &[u8]) -> Digest {
    Digest(hex::encode(Sha512::digest(data)))
}

/// Hash several string parts as if they were concatenated with no delimiter.
pub fn hash_concat(parts: &[&str]) -> Digest {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    Digest(hex::encode(hasher.finalize()))
}
