// Content fingerprinting: fixed-length digests and digest similarity
//
// The digest is a strong general-purpose hash (blake3) truncated to 16 hex
// characters, compared by character-wise Hamming distance. This is NOT a
// locality-preserving fuzzy hash: a one-byte input change randomizes the
// whole digest. The behavior is kept as-is because substituting a true
// locality-sensitive hash would change clustering outcomes.

use crate::error::{MsmdError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of hex characters kept from the full hash
pub const DIGEST_LEN: usize = 16;

/// Fixed-length content digest
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Computes content digests and compares them for similarity
pub struct Fingerprinter;

impl Fingerprinter {
    /// Compute the fixed-length digest of raw bytes
    ///
    /// Deterministic; empty input is valid and yields a defined digest.
    pub fn fingerprint(data: &[u8]) -> Digest {
        let hex = blake3::hash(data).to_hex();
        Digest(hex[..DIGEST_LEN].to_string())
    }

    /// Similarity score between two digests, in [0, 100]
    ///
    /// Equal digests score 100; otherwise the score is derived from the
    /// character-wise Hamming distance over the fixed-length digests.
    ///
    /// # Errors
    /// Returns a configuration error when the digests have different lengths
    /// (they were not both produced by `fingerprint`).
    pub fn similarity(d1: &Digest, d2: &Digest) -> Result<f64> {
        if d1.len() != d2.len() {
            return Err(MsmdError::DigestLengthMismatch {
                left: d1.len(),
                right: d2.len(),
            });
        }

        if d1 == d2 {
            return Ok(100.0);
        }

        let mismatches = d1
            .as_str()
            .chars()
            .zip(d2.as_str().chars())
            .filter(|(c1, c2)| c1 != c2)
            .count();
        let len = d1.len();

        Ok(((len - mismatches) as f64 / len as f64) * 100.0)
    }
}
