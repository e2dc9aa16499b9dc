//! Rotation-policy descriptor types and canonicalization.

use serde::{Deserialize, Serialize};

use super::validator::PolicyError;
use crate::canonical;

/// Declarative rotation-policy descriptor consumed by the governance engine.
///
/// Unknown fields are rejected: a policy is a constitution, and a field the
/// engine does not understand must not pass silently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RotationPolicy {
    /// Descriptor schema version.
    pub policy_version: String,

    /// Who issues rotations under this policy.
    pub issuer: Issuer,

    /// Cryptographic constraints the deployment is bound to.
    pub constraints: Constraints,

    /// Epoch cadence configuration.
    pub epochs: Epochs,

    /// Cutover governance rules.
    pub cutover: Cutover,
}

/// Issuing entity identification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Issuer {
    /// Human-readable issuer name.
    pub name: String,

    /// Stable issuer identifier (e.g. `rva://…`).
    pub id: String,
}

/// Cryptographic constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Constraints {
    /// Hash algorithm the deployment runs on.
    pub hash_alg: String,

    /// Algorithms acceptable to verifiers.
    pub allowed_hash_algs: Vec<String>,

    /// Domain separator bound to the protocol version.
    pub domain_separator: String,

    /// Minimum Merkle tree depth.
    pub min_depth: u32,

    /// Maximum Merkle tree depth.
    pub max_depth: u32,
}

/// Epoch cadence configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Epochs {
    /// Seconds between rotations.
    pub interval_seconds: u64,

    /// Epoch identifier scheme.
    pub id_format: String,
}

/// Cutover governance rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cutover {
    /// A rotation must anchor to its predecessor.
    pub require_prev_anchor: bool,

    /// Epoch identifiers must strictly increase across cutover.
    pub strict_monotonic_epoch: bool,
}

/// Canonicalizes a policy to deterministic bytes.
///
/// Key-sorted, minified, UTF-8, no trailing newline: two semantically equal
/// policies produce identical bytes, so a policy digest is well-defined.
///
/// # Errors
///
/// Returns [`PolicyError`] when the descriptor cannot be canonicalized
/// (cannot happen for a well-typed policy; guarded for completeness).
pub fn canonical_policy_bytes(policy: &RotationPolicy) -> Result<Vec<u8>, PolicyError> {
    let value = serde_json::to_value(policy).map_err(PolicyError::Encode)?;
    let canonical = canonical::canonicalize_value(&value)?;
    Ok(canonical.into_bytes())
}

/// Builds a descriptor that satisfies every frozen invariant.
///
/// Shared fixture for this module's tests and the validator's.
#[cfg(test)]
pub(crate) fn conforming_policy() -> RotationPolicy {
    RotationPolicy {
        policy_version: "1.0".to_string(),
        issuer: Issuer {
            name: "Alpha".to_string(),
            id: "rva://1".to_string(),
        },
        constraints: Constraints {
            hash_alg: "sha256".to_string(),
            allowed_hash_algs: vec!["sha256".to_string()],
            domain_separator: "RVA_NODE:v1".to_string(),
            min_depth: 1,
            max_depth: 32,
        },
        epochs: Epochs {
            interval_seconds: 86_400,
            id_format: "numeric_ascending".to_string(),
        },
        cutover: Cutover {
            require_prev_anchor: true,
            strict_monotonic_epoch: true,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalization_is_deterministic() {
        let p1 = conforming_policy();
        let mut p2 = conforming_policy();
        // Re-assign fields in a different order; the struct is the same.
        p2.issuer = Issuer {
            id: "rva://1".to_string(),
            name: "Alpha".to_string(),
        };

        let b1 = canonical_policy_bytes(&p1).unwrap();
        let b2 = canonical_policy_bytes(&p2).unwrap();
        assert_eq!(b1, b2);
        assert!(!b1.ends_with(b"\n"));
    }

    #[test]
    fn canonical_bytes_are_key_sorted() {
        let bytes = canonical_policy_bytes(&conforming_policy()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with(r#"{"constraints":"#));
        assert!(crate::canonical::is_canonical(&text));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let mut value = serde_json::to_value(conforming_policy()).unwrap();
        value["surprise"] = serde_json::json!(true);
        assert!(serde_json::from_value::<RotationPolicy>(value).is_err());
    }

    #[test]
    fn descriptor_round_trips_through_json() {
        let policy = conforming_policy();
        let text = serde_json::to_string(&policy).unwrap();
        let back: RotationPolicy = serde_json::from_str(&text).unwrap();
        assert_eq!(back, policy);
    }
}
