//! SHA-256 hashing over raw bytes and canonical-JSON pre-images.
//!
//! No salt, no domain prefix at this layer: `sha256(bytes)` is plain SHA-256.
//! Hashing a JSON object is defined as SHA-256 over the exact bytes emitted
//! by [`crate::canonical`], so two semantically equal objects always hash
//! identically.

use sha2::{Digest as _, Sha256};

use crate::canonical::{self, CanonicalJsonError};
use crate::codec::Digest;

/// Hashes arbitrary bytes.
#[must_use]
pub fn sha256(bytes: &[u8]) -> Digest {
    Digest::from_bytes(Sha256::digest(bytes).into())
}

/// Canonicalizes a JSON text and hashes the canonical bytes.
///
/// # Errors
///
/// Returns [`CanonicalJsonError`] when the input cannot be canonicalized.
pub fn sha256_canonical_json(input: &str) -> Result<Digest, CanonicalJsonError> {
    let canonical = canonical::canonicalize_str(input)?;
    Ok(sha256(canonical.as_bytes()))
}
