//! Deterministic Ed25519 signing over 32-byte digests.
//!
//! Keypairs derive from a caller-supplied 32-byte seed via standard Ed25519
//! seed expansion; nothing here consumes randomness, so the same seed yields
//! the same keys on every platform. Seeds live only for the duration of the
//! call and are never retained.
//!
//! The signed message is always the **raw 32 bytes** of the digest, never the
//! ASCII of its hex form. This is a canon invariant: a signer that hashed the
//! hex text would produce signatures no conforming verifier accepts.
//!
//! Hex-string entry points ([`sign_digest`], [`verify_digest`],
//! [`derive_keypair_hex`]) validate and decode at the boundary, then defer to
//! the typed operations.

use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::codec::{CodecError, Digest, PublicKey, Seed, Signature};
use crate::error::AuditKind;

/// Byte length of the expanded private key (seed || public key).
pub const EXPANDED_PRIVATE_KEY_LEN: usize = 64;

/// Errors produced by the signing layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SignError {
    /// A hex input failed structural validation.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Inputs were well-formed but the cryptography rejected them: the
    /// signature does not match, or the public key is not a valid curve
    /// point.
    #[error("signature verification failed")]
    VerificationFailed,
}

impl AuditKind for SignError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Codec(err) => err.kind(),
            Self::VerificationFailed => "VerificationFailed",
        }
    }
}

/// Derives the keypair for a seed.
///
/// Returns the 32-byte public key and the 64-byte expanded private key
/// (seed || public key) in a zeroizing buffer.
#[must_use]
pub fn derive_keypair(seed: &Seed) -> (PublicKey, Zeroizing<[u8; EXPANDED_PRIVATE_KEY_LEN]>) {
    let signing_key = SigningKey::from_bytes(seed.as_bytes());
    let public_key = PublicKey::from_bytes(signing_key.verifying_key().to_bytes());
    (public_key, Zeroizing::new(signing_key.to_keypair_bytes()))
}

/// Derives a keypair from a hex seed, returning hex forms.
///
/// The public key is 64 hex chars; the expanded private key is 128 hex chars
/// in a zeroizing string.
///
/// # Errors
///
/// Returns a codec error when the seed is not 64 lowercase hex chars.
pub fn derive_keypair_hex(seed_hex: &str) -> Result<(String, Zeroizing<String>), SignError> {
    let seed = Seed::from_hex(seed_hex)?;
    let (public_key, expanded) = derive_keypair(&seed);
    Ok((public_key.to_hex(), Zeroizing::new(hex::encode(*expanded))))
}

/// Signs the raw 32 bytes of a digest with the keypair derived from `seed`.
///
/// Ed25519 signing is deterministic, so the same `(digest, seed)` pair always
/// produces the same signature.
#[must_use]
pub fn sign(digest: &Digest, seed: &Seed) -> (Signature, PublicKey) {
    let signing_key = SigningKey::from_bytes(seed.as_bytes());
    let signature = signing_key.sign(digest.as_bytes());
    (
        Signature::from_bytes(signature.to_bytes()),
        PublicKey::from_bytes(signing_key.verifying_key().to_bytes()),
    )
}

/// Hex-boundary form of [`sign`]: `(digest_hex, seed_hex)` to
/// `(signature_hex, public_key_hex)`.
///
/// # Errors
///
/// Returns a codec error when either input fails hex validation.
pub fn sign_digest(digest_hex: &str, seed_hex: &str) -> Result<(String, String), SignError> {
    let digest = Digest::from_hex(digest_hex)?;
    let seed = Seed::from_hex(seed_hex)?;
    let (signature, public_key) = sign(&digest, &seed);
    Ok((signature.to_hex(), public_key.to_hex()))
}

/// Verifies a signature over the raw 32 bytes of a digest.
///
/// # Errors
///
/// Returns [`SignError::VerificationFailed`] when the public key is not a
/// valid curve point or the signature does not match; this is distinct from
/// the structural codec errors of the hex entry points.
pub fn verify(
    digest: &Digest,
    signature: &Signature,
    public_key: &PublicKey,
) -> Result<(), SignError> {
    let verifying_key = VerifyingKey::from_bytes(public_key.as_bytes())
        .map_err(|_| SignError::VerificationFailed)?;
    let signature = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
    verifying_key
        .verify(digest.as_bytes(), &signature)
        .map_err(|_| SignError::VerificationFailed)
}

/// Hex-boundary form of [`verify`].
///
/// # Errors
///
/// Returns a codec error for malformed hex and
/// [`SignError::VerificationFailed`] for a cryptographic mismatch.
pub fn verify_digest(
    digest_hex: &str,
    signature_hex: &str,
    public_key_hex: &str,
) -> Result<(), SignError> {
    let digest = Digest::from_hex(digest_hex)?;
    let signature = Signature::from_hex(signature_hex)?;
    let public_key = PublicKey::from_hex(public_key_hex)?;
    verify(&digest, &signature, &public_key)
}
