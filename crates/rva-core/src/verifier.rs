//! Offline certificate verification.
//!
//! A certificate claims that `payload_hash` is a leaf of the Merkle tree
//! whose root was sealed and signed by the registry. Verification is fully
//! offline: recompute the root by walking the proof, require byte equality
//! with the certificate's root, then verify the Ed25519 signature over the
//! root's **raw 32 bytes** under the registry public key. No step touches
//! the network or a clock.
//!
//! # Pairing variants
//!
//! Two parent rules exist in the ecosystem and are **not** interchangeable:
//!
//! - [`PairingMode::ByteConcat`]: `sha256(L || R)` — the rule the ledger and
//!   seal path is fixed to (see [`crate::merkle`])
//! - [`PairingMode::DomainSeparated`]:
//!   `sha256("RVA_NODE:v1:" || hex(L) || ":" || hex(R))` — the hardened rule
//!   a policy with the v1 domain separator binds its deployment to
//!
//! The caller always names the mode explicitly; [`PairingMode::for_policy`]
//! derives it from a validated rotation policy so the choice is a recorded
//! governance decision, never an inference from proof shape. A proof built
//! under one mode fails under the other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::canon;
use crate::codec::{Digest, PublicKey, Signature};
use crate::error::AuditKind;
use crate::hasher;
use crate::merkle::{hash_pair, Position, ProofStep};
use crate::policy::RotationPolicy;
use crate::sign::{self, SignError};
use crate::timestamp::serde_rfc3339_nanos;

/// Which parent rule a deployment pairs nodes with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairingMode {
    /// `sha256(L || R)` over raw bytes; the ledger/seal rule.
    #[default]
    ByteConcat,

    /// `sha256("RVA_NODE:v1:" || hex(L) || ":" || hex(R))`.
    DomainSeparated,
}

impl PairingMode {
    /// Derives the pairing mode a validated policy binds its deployment to.
    ///
    /// A policy carrying the v1 domain separator selects the
    /// domain-separated rule; anything else (only possible pre-validation)
    /// falls back to byte concatenation.
    #[must_use]
    pub fn for_policy(policy: &RotationPolicy) -> Self {
        if policy.constraints.domain_separator == canon::DOMAIN_SEPARATOR {
            Self::DomainSeparated
        } else {
            Self::ByteConcat
        }
    }

    /// Combines two nodes under this mode's parent rule.
    #[must_use]
    pub fn pair(self, left: &Digest, right: &Digest) -> Digest {
        match self {
            Self::ByteConcat => hash_pair(left, right),
            Self::DomainSeparated => {
                let preimage = format!(
                    "{}:{}:{}",
                    canon::DOMAIN_SEPARATOR,
                    left.to_hex(),
                    right.to_hex()
                );
                hasher::sha256(preimage.as_bytes())
            },
        }
    }
}

/// Errors produced by the offline verifier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum VerifierError {
    /// The recomputed root does not match the certificate's root.
    #[error("recomputed merkle root does not match the certificate root")]
    RootMismatch,

    /// The signature over the root failed, or inputs were cryptographically
    /// unusable.
    #[error(transparent)]
    Signature(#[from] SignError),
}

impl AuditKind for VerifierError {
    fn kind(&self) -> &'static str {
        match self {
            Self::RootMismatch => "VerificationFailed",
            Self::Signature(err) => err.kind(),
        }
    }
}

/// An offline-verifiable certificate issued for one registered payload.
///
/// All hex fields are strict lowercase; `merkle_proof` uses the
/// `{"hash", "position"}` step format of [`crate::merkle::ProofStep`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// SHA-256 digest of the registered payload's canonical bytes.
    pub payload_hash: Digest,

    /// Who submitted the payload.
    pub submitter_id: String,

    /// When the payload was registered.
    #[serde(with = "serde_rfc3339_nanos")]
    pub registration_timestamp: DateTime<Utc>,

    /// Line number of the register record in the ledger.
    pub ledger_entry_id: u64,

    /// Epoch the payload was sealed in (numeric, ascending).
    pub epoch_id: u64,

    /// Sibling path from the payload hash to the epoch root.
    pub merkle_proof: Vec<ProofStep>,

    /// The sealed epoch root.
    pub merkle_root: Digest,

    /// Registry signature over the raw 32 bytes of `merkle_root`.
    pub rva_signature: Signature,
}

/// Recomputes a root by walking a proof from `leaf` under `mode`.
///
/// An empty proof leaves the leaf as the root (single-leaf epoch).
#[must_use]
pub fn recompute_root(leaf: &Digest, proof: &[ProofStep], mode: PairingMode) -> Digest {
    let mut current = *leaf;
    for step in proof {
        current = match step.position {
            Position::Right => mode.pair(&current, &step.hash),
            Position::Left => mode.pair(&step.hash, &current),
        };
    }
    current
}

/// Verifies a certificate against the registry public key.
///
/// Recomputes the root from `payload_hash` and `merkle_proof` under `mode`,
/// requires constant-time equality with `merkle_root`, then verifies
/// `rva_signature` over the root's raw bytes.
///
/// # Errors
///
/// Returns [`VerifierError::RootMismatch`] when the proof does not commit
/// the payload to the certificate's root, and
/// [`VerifierError::Signature`] when the signature check fails.
pub fn verify_certificate(
    certificate: &Certificate,
    public_key: &PublicKey,
    mode: PairingMode,
) -> Result<(), VerifierError> {
    let recomputed = recompute_root(&certificate.payload_hash, &certificate.merkle_proof, mode);
    let matches = bool::from(
        recomputed
            .as_bytes()
            .ct_eq(certificate.merkle_root.as_bytes()),
    );
    if !matches {
        return Err(VerifierError::RootMismatch);
    }

    sign::verify(
        &certificate.merkle_root,
        &certificate.rva_signature,
        public_key,
    )?;
    Ok(())
}
