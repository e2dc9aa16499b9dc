//! # rva-core
//!
//! Cryptographic core of the RVA append-only evidence registry. The registry
//! issues offline-verifiable certificates of the form "data `D` with hash `H`
//! was registered by entity `E` at time `T`", and this crate holds every part
//! of that claim where bytes are load-bearing:
//!
//! - **Canonical JSON**: the minified, key-sorted UTF-8 encoding used as the
//!   pre-image for all digests
//! - **Merkle engine**: deterministic binary tree over SHA-256 digests with
//!   odd-duplication, proof generation, and strict proof verification
//! - **Signer**: deterministic Ed25519 over the raw 32 bytes of a digest
//! - **Ledger**: append-only line-delimited log of register and seal records
//! - **Governance**: rotation-policy validation against frozen invariants
//! - **Offline verifier**: proof + signature verification with no network
//!
//! Determinism dominates the design: a Merkle root computed for a given
//! ordered leaf sequence is byte-identical across platforms, canonicalization
//! is idempotent, and signing a digest with a seed always yields the same
//! signature. Nothing in this crate reads a clock except the ledger appender,
//! and nothing ever consumes randomness.
//!
//! # Example
//!
//! ```
//! use rva_core::codec::Seed;
//! use rva_core::{hasher, merkle, sign};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Hash two canonical objects and seal them under a Merkle root.
//! let a = hasher::sha256_canonical_json(r#"{"doc":"a"}"#)?;
//! let b = hasher::sha256_canonical_json(r#"{"doc":"b"}"#)?;
//! let root = merkle::build_root(&[a, b])?;
//!
//! // Sign the raw 32 root bytes with a deterministic keypair.
//! let seed: Seed = "000102030405060708090a0b0c0d0e0f\
//!                   101112131415161718191a1b1c1d1e1f".parse()?;
//! let (signature, public_key) = sign::sign(&root, &seed);
//! sign::verify(&root, &signature, &public_key)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod canon;
pub mod canonical;
pub mod codec;
pub mod error;
pub mod hasher;
pub mod ledger;
pub mod merkle;
pub mod policy;
pub mod sign;
pub mod timestamp;
pub mod verifier;

pub use codec::{Digest, PublicKey, Seed, Signature};
pub use error::AuditKind;
pub use ledger::{Ledger, Manifest, RegisterRecord, SealRecord};
pub use merkle::{Position, ProofStep};
pub use policy::RotationPolicy;
pub use verifier::{Certificate, PairingMode};
