//! Frozen canon constants for protocol version v1.0.
//!
//! These values are the non-negotiable invariants of the registry protocol.
//! Changing any of them requires a new canon version, not an in-place edit;
//! guardrail tests pin every value.

/// Canon version identifier.
pub const CANON_VERSION: &str = "v1.0";

/// Canon lifecycle status.
pub const CANON_STATUS: &str = "FROZEN";

/// Number of ledger registrations per epoch.
pub const EPOCH_SIZE: u64 = 1000;

/// Hash algorithm over all registry pre-images.
pub const HASH_ALGORITHM: &str = "SHA-256";

/// Signature algorithm over sealed Merkle roots.
pub const SIGNATURE_ALGORITHM: &str = "Ed25519";

/// Time standard for every timestamp the registry emits.
pub const TIME_STANDARD: &str = "UTC";

/// Tolerance for caller-supplied submission timestamps, in seconds.
pub const SUBMISSION_TIMESTAMP_TOLERANCE_SECONDS: u64 = 300;

/// Domain separator bound to protocol v1 deployments.
///
/// Mixed into the domain-separated Merkle pairing variant (see
/// [`crate::verifier::PairingMode`]) and required verbatim by the rotation
/// policy's `constraints.domain_separator` field.
pub const DOMAIN_SEPARATOR: &str = "RVA_NODE:v1";

#[cfg(test)]
mod tests {
    use super::*;

    // Guardrails: a change to any frozen constant must fail loudly here.

    #[test]
    fn canon_version_is_frozen() {
        assert_eq!(CANON_VERSION, "v1.0");
        assert_eq!(CANON_STATUS, "FROZEN");
    }

    #[test]
    fn epoch_size_invariant() {
        assert_eq!(EPOCH_SIZE, 1000);
    }

    #[test]
    fn crypto_primitives_invariant() {
        assert_eq!(HASH_ALGORITHM, "SHA-256");
        assert_eq!(SIGNATURE_ALGORITHM, "Ed25519");
        assert_eq!(TIME_STANDARD, "UTC");
    }

    #[test]
    fn submission_tolerance_invariant() {
        assert_eq!(SUBMISSION_TIMESTAMP_TOLERANCE_SECONDS, 300);
    }

    #[test]
    fn domain_separator_invariant() {
        assert_eq!(DOMAIN_SEPARATOR, "RVA_NODE:v1");
    }
}
