//! Frozen-invariant validation and loading of rotation policies.
//!
//! The validator enforces the technical and governance boundaries of the
//! canon. Production values are not weakened for development convenience:
//! overrides belong in the environment of the host process, never in the
//! policy file.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::schema::RotationPolicy;
use crate::canon;
use crate::canonical::CanonicalJsonError;
use crate::error::AuditKind;

/// Environment variable selecting the policy file.
pub const POLICY_PATH_ENV: &str = "RVA_POLICY_PATH";

/// Default policy file location.
pub const DEFAULT_POLICY_PATH: &str = "config/rotation_policy.json";

/// The only hash algorithm the canon permits.
pub const REQUIRED_HASH_ALG: &str = "sha256";

/// The only epoch identifier scheme the canon permits.
pub const REQUIRED_EPOCH_ID_FORMAT: &str = "numeric_ascending";

/// Production safety floor for the rotation interval: 24 hours.
pub const MIN_ROTATION_INTERVAL_SECONDS: u64 = 86_400;

/// Upper bound on Merkle tree depth.
pub const MAX_MERKLE_DEPTH: u32 = 64;

/// Errors produced by the governance engine. Every variant is an
/// `AuditFail` for reporting purposes: a policy that fails here must not
/// gate any seal or rotation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PolicyError {
    /// The policy file could not be read.
    #[error("could not read policy file at {path}: {source}")]
    Io {
        /// The path that failed.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },

    /// The policy file is not valid JSON for the descriptor schema.
    #[error("policy file has malformed structure: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The policy is missing its mandatory version field.
    #[error("policy is empty or missing mandatory policy_version field")]
    MissingVersion,

    /// `constraints.hash_alg` is not the canon algorithm.
    #[error("hash_alg {got:?} is not supported (required: {REQUIRED_HASH_ALG})")]
    UnsupportedHashAlg {
        /// The declared algorithm.
        got: String,
    },

    /// `sha256` is absent from `constraints.allowed_hash_algs`.
    #[error("{REQUIRED_HASH_ALG} must be present in allowed_hash_algs")]
    AllowedHashAlgsMissingSha256,

    /// `constraints.domain_separator` does not match the protocol version.
    #[error("domain_separator {got:?} violates protocol version (required: {})", canon::DOMAIN_SEPARATOR)]
    DomainSeparatorMismatch {
        /// The declared separator.
        got: String,
    },

    /// Merkle depth bounds are outside `[1, 64]` or inverted.
    #[error("invalid merkle depth boundaries min:{min} max:{max} (allowed: 1..={MAX_MERKLE_DEPTH})")]
    InvalidDepthBounds {
        /// Declared minimum depth.
        min: u32,
        /// Declared maximum depth.
        max: u32,
    },

    /// The rotation interval is below the production floor.
    #[error(
        "rotation interval {got}s is below production safety limit ({MIN_ROTATION_INTERVAL_SECONDS}s)"
    )]
    IntervalBelowFloor {
        /// Declared interval in seconds.
        got: u64,
    },

    /// The epoch identifier scheme is not recognized.
    #[error("epoch id_format {got:?} is not recognized (required: {REQUIRED_EPOCH_ID_FORMAT})")]
    UnknownEpochIdFormat {
        /// The declared scheme.
        got: String,
    },

    /// Cutover rules do not enforce anchoring and monotonicity.
    #[error("cutover rules must enforce require_prev_anchor and strict_monotonic_epoch")]
    CutoverNotEnforced,

    /// The descriptor could not be encoded for canonicalization.
    #[error("policy could not be encoded: {0}")]
    Encode(#[source] serde_json::Error),

    /// The descriptor could not be canonicalized.
    #[error(transparent)]
    Canonical(#[from] CanonicalJsonError),
}

impl AuditKind for PolicyError {
    fn kind(&self) -> &'static str {
        "AuditFail"
    }
}

/// Resolves the policy file path from `RVA_POLICY_PATH`, defaulting to
/// [`DEFAULT_POLICY_PATH`].
#[must_use]
pub fn policy_path_from_env() -> PathBuf {
    std::env::var_os(POLICY_PATH_ENV)
        .filter(|value| !value.is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_POLICY_PATH), PathBuf::from)
}

/// Loads a rotation policy from a file and checks it structurally.
///
/// Invariant validation is a separate step: call [`validate_invariants`] on
/// the result before permitting any rotation.
///
/// # Errors
///
/// Returns [`PolicyError::Io`] when the file cannot be read,
/// [`PolicyError::Malformed`] for schema violations, and
/// [`PolicyError::MissingVersion`] for a descriptor with an empty version.
pub fn load_policy(path: impl AsRef<Path>) -> Result<RotationPolicy, PolicyError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| PolicyError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let policy: RotationPolicy = serde_json::from_slice(&data).map_err(PolicyError::Malformed)?;
    if policy.policy_version.trim().is_empty() {
        return Err(PolicyError::MissingVersion);
    }
    Ok(policy)
}

/// Validates a policy against the frozen canon invariants.
///
/// All rules are AND'd; the first violation is returned and the verdict is
/// logged either way.
///
/// # Errors
///
/// Returns the most specific [`PolicyError`] for the first violated
/// invariant.
pub fn validate_invariants(policy: &RotationPolicy) -> Result<(), PolicyError> {
    let verdict = check_invariants(policy);
    match &verdict {
        Ok(()) => {
            tracing::info!(
                issuer = %policy.issuer.id,
                interval_seconds = policy.epochs.interval_seconds,
                id_format = %policy.epochs.id_format,
                domain_separator = %policy.constraints.domain_separator,
                "rotation policy accepted"
            );
        },
        Err(err) => {
            tracing::warn!(issuer = %policy.issuer.id, error = %err, "rotation policy rejected");
        },
    }
    verdict
}

fn check_invariants(policy: &RotationPolicy) -> Result<(), PolicyError> {
    // Cryptographic invariants.
    if policy.constraints.hash_alg != REQUIRED_HASH_ALG {
        return Err(PolicyError::UnsupportedHashAlg {
            got: policy.constraints.hash_alg.clone(),
        });
    }
    if !policy
        .constraints
        .allowed_hash_algs
        .iter()
        .any(|alg| alg == REQUIRED_HASH_ALG)
    {
        return Err(PolicyError::AllowedHashAlgsMissingSha256);
    }
    if policy.constraints.domain_separator != canon::DOMAIN_SEPARATOR {
        return Err(PolicyError::DomainSeparatorMismatch {
            got: policy.constraints.domain_separator.clone(),
        });
    }

    // Merkle tree boundaries.
    if policy.constraints.min_depth < 1
        || policy.constraints.max_depth > MAX_MERKLE_DEPTH
        || policy.constraints.min_depth > policy.constraints.max_depth
    {
        return Err(PolicyError::InvalidDepthBounds {
            min: policy.constraints.min_depth,
            max: policy.constraints.max_depth,
        });
    }

    // Epoch and timing discipline.
    if policy.epochs.interval_seconds < MIN_ROTATION_INTERVAL_SECONDS {
        return Err(PolicyError::IntervalBelowFloor {
            got: policy.epochs.interval_seconds,
        });
    }
    if policy.epochs.id_format != REQUIRED_EPOCH_ID_FORMAT {
        return Err(PolicyError::UnknownEpochIdFormat {
            got: policy.epochs.id_format.clone(),
        });
    }

    // Cutover governance.
    if !policy.cutover.require_prev_anchor || !policy.cutover.strict_monotonic_epoch {
        return Err(PolicyError::CutoverNotEnforced);
    }

    Ok(())
}
