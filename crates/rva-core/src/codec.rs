//! Strict lowercase-hex codec and the typed forms it guards.
//!
//! All internal computation in the core runs on fixed-size byte arrays;
//! textual hex exists only at boundaries. The canonical textual forms are:
//!
//! - [`Digest`], [`PublicKey`], [`Seed`]: 32 bytes, `^[a-f0-9]{64}$`
//! - [`Signature`]: 64 bytes, `^[a-f0-9]{128}$`
//!
//! Uppercase input is rejected everywhere. There is no lenient mode.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::error::AuditKind;

/// Byte length of a SHA-256 digest.
pub const DIGEST_LEN: usize = 32;

/// Byte length of an Ed25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Byte length of an Ed25519 seed.
pub const SEED_LEN: usize = 32;

/// Byte length of an Ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// Errors produced by the hex codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    /// Input contains characters outside `[a-f0-9]` (uppercase included).
    #[error("{what} must be lowercase hex ([a-f0-9])")]
    InvalidHex {
        /// Which field was being decoded.
        what: &'static str,
    },

    /// Input has the wrong number of hex characters.
    #[error("{what} must be {expected} hex chars, got {actual}")]
    InvalidLength {
        /// Which field was being decoded.
        what: &'static str,
        /// Required character count.
        expected: usize,
        /// Observed character count.
        actual: usize,
    },
}

impl AuditKind for CodecError {
    fn kind(&self) -> &'static str {
        match self {
            Self::InvalidHex { .. } => "InvalidHex",
            Self::InvalidLength { .. } => "InvalidLength",
        }
    }
}

/// Decodes exactly `N` bytes of strict lowercase hex.
fn decode_exact<const N: usize>(input: &str, what: &'static str) -> Result<[u8; N], CodecError> {
    if !input.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
        return Err(CodecError::InvalidHex { what });
    }
    if input.len() != N * 2 {
        return Err(CodecError::InvalidLength {
            what,
            expected: N * 2,
            actual: input.len(),
        });
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(input, &mut out).map_err(|_| CodecError::InvalidHex { what })?;
    Ok(out)
}

macro_rules! hex_newtype {
    ($(#[$doc:meta])* $name:ident, $len:expr, $what:literal) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Wraps raw bytes already known to be the right length.
            #[must_use]
            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Parses the strict lowercase-hex textual form.
            ///
            /// # Errors
            ///
            /// Returns [`CodecError::InvalidHex`] on any non-lowercase-hex
            /// character and [`CodecError::InvalidLength`] on a wrong count.
            pub fn from_hex(input: &str) -> Result<Self, CodecError> {
                decode_exact::<{ $len }>(input, $what).map(Self)
            }

            /// Returns the raw bytes.
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Returns the canonical lowercase-hex textual form.
            #[must_use]
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl FromStr for $name {
            type Err = CodecError;

            fn from_str(input: &str) -> Result<Self, Self::Err> {
                Self::from_hex(input)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                Self::from_hex(&text).map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_newtype! {
    /// A SHA-256 digest: exactly 32 bytes, 64 lowercase hex chars on the wire.
    Digest, DIGEST_LEN, "digest"
}

hex_newtype! {
    /// An Ed25519 public key: 32 bytes, 64 lowercase hex chars on the wire.
    PublicKey, PUBLIC_KEY_LEN, "public key"
}

hex_newtype! {
    /// An Ed25519 signature: 64 bytes, 128 lowercase hex chars on the wire.
    Signature, SIGNATURE_LEN, "signature"
}

/// An Ed25519 seed: 32 secret bytes.
///
/// Seeds live only in the caller's memory for the duration of a signer call.
/// The buffer is zeroized on drop, `Debug` never prints the contents, and the
/// type deliberately has no `Display` or serde support.
#[derive(Clone)]
pub struct Seed(Zeroizing<[u8; SEED_LEN]>);

impl Seed {
    /// Wraps raw seed bytes; the input array is moved into a zeroizing buffer.
    #[must_use]
    pub fn from_bytes(bytes: [u8; SEED_LEN]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    /// Parses the strict lowercase-hex textual form.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidHex`] or [`CodecError::InvalidLength`].
    pub fn from_hex(input: &str) -> Result<Self, CodecError> {
        decode_exact::<SEED_LEN>(input, "seed").map(Self::from_bytes)
    }

    /// Returns the raw seed bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; SEED_LEN] {
        &self.0
    }
}

impl FromStr for Seed {
    type Err = CodecError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        Self::from_hex(input)
    }
}

impl fmt::Debug for Seed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Seed(..)")
    }
}
