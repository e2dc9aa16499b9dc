//! Rotation-policy governance engine.
//!
//! A [`RotationPolicy`] descriptor declares who may rotate, under which
//! cryptographic constraints, and on what cadence. Before any seal or
//! rotation is permitted the descriptor must pass
//! [`validate_invariants`], which checks it against the frozen canon rules
//! (SHA-256 only, the v1 domain separator, depth bounds, the 24-hour
//! production interval floor, strict cutover discipline). Any violation is an
//! `AuditFail`-kind error.
//!
//! Policies canonicalize deterministically ([`canonical_policy_bytes`]) so
//! two semantically equal descriptors are byte-identical, with no trailing
//! newline.

mod schema;
mod validator;

pub use schema::{
    canonical_policy_bytes, Constraints, Cutover, Epochs, Issuer, RotationPolicy,
};
#[cfg(test)]
pub(crate) use schema::conforming_policy;
pub use validator::{
    load_policy, policy_path_from_env, validate_invariants, PolicyError, DEFAULT_POLICY_PATH,
    MAX_MERKLE_DEPTH, MIN_ROTATION_INTERVAL_SECONDS, POLICY_PATH_ENV, REQUIRED_EPOCH_ID_FORMAT,
    REQUIRED_HASH_ALG,
};
