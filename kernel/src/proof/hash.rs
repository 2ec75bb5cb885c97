//! Content hashes: domain-separated SHA-256 rendered as `sha256:<hex>`.
//!
//! **Exactly one place defines canonical hashing.** Every digest in a trial
//! tape or session bundle is produced by [`canonical_hash`] or
//! [`chained_hash`].

use sha2::{Digest, Sha256};

pub use crate::proof::hash_domain::HashDomain;

/// Algorithm label written before the colon.
pub const HASH_ALGORITHM: &str = "sha256";

/// A content-addressed hash with algorithm identifier.
///
/// Format: `"algorithm:hex_digest"` (e.g., `"sha256:abcdef..."`).
///
/// Invariant: exactly one `:` separator with non-empty substrings on both
/// sides (enforced by [`ContentHash::parse`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash {
    full: String,
    colon: usize,
}

impl ContentHash {
    /// Parse from `"algorithm:hex"` format.
    ///
    /// Returns `None` if the colon is missing or either side is empty.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let colon = s.find(':')?;
        if colon == 0 || colon == s.len() - 1 || s[colon + 1..].contains(':') {
            return None;
        }
        Some(Self {
            full: s.to_string(),
            colon,
        })
    }

    /// The algorithm portion (e.g., `"sha256"`).
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.full[..self.colon]
    }

    /// The hex digest portion.
    #[must_use]
    pub fn hex_digest(&self) -> &str {
        &self.full[self.colon + 1..]
    }

    /// Raw digest bytes, or `None` if the digest portion is not valid hex.
    #[must_use]
    pub fn digest_bytes(&self) -> Option<Vec<u8>> {
        hex::decode(self.hex_digest()).ok()
    }

    /// The full string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.full
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full)
    }
}

fn finish(hasher: Sha256) -> ContentHash {
    let full = format!("{HASH_ALGORITHM}:{}", hex::encode(hasher.finalize()));
    ContentHash {
        colon: HASH_ALGORITHM.len(),
        full,
    }
}

/// `sha256(domain || data)`.
#[must_use]
pub fn canonical_hash(domain: HashDomain, data: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    hasher.update(data);
    finish(hasher)
}

/// `sha256(domain || prev_digest_bytes || data)`: one step of a hash chain.
///
/// `prev` must be a hash produced by this module; a non-hex digest is
/// chained over its UTF-8 text instead so the function stays total.
#[must_use]
pub fn chained_hash(domain: HashDomain, prev: &ContentHash, data: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    match prev.digest_bytes() {
        Some(raw) => hasher.update(&raw),
        None => hasher.update(prev.hex_digest().as_bytes()),
    }
    hasher.update(data);
    finish(hasher)
}
