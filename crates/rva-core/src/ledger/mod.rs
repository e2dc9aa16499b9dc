//! Append-only JSONL ledger of register and seal records.
//!
//! The ledger is one UTF-8 file, one JSON object per line, LF-terminated.
//! Records are appended, never updated, deleted, or reordered. Two kinds
//! exist:
//!
//! - **register**: data with a given SHA-256 digest existed at a time
//! - **seal**: a signed manifest over the Merkle root of every register
//!   since the previous seal
//!
//! # Append discipline
//!
//! A [`Ledger`] handle owns its path and a process-wide-equivalent mutex; all
//! mutations serialize through it. Timestamps are stamped under that mutex
//! and clamped to `max(now, last_stamp + 1ns)`, so records written through
//! one handle are strictly monotonic even when the wall clock steps
//! backwards. Each record is written as line + LF in a single `write_all`
//! followed by `sync_data`.
//!
//! Sharing one ledger file between multiple OS processes requires an
//! external file lock; single-writer-multi-reader within a process is safe.
//!
//! # Corruption
//!
//! Readers halt on the first structural problem: a line that is not valid
//! JSON, a record of unknown kind, an unparseable timestamp, or a final line
//! missing its LF (a truncated write). These surface as
//! [`LedgerError::Corrupt`] with the 1-based line number; the core never
//! repairs a ledger.
//!
//! Mutex poisoning indicates a panic in another thread, which is
//! unrecoverable.

#![allow(clippy::missing_panics_doc)]

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::canon;
use crate::codec::{CodecError, Digest, PublicKey, Signature};
use crate::error::AuditKind;
use crate::timestamp::serde_rfc3339_nanos;


/// Default ledger location relative to the working directory.
pub const DEFAULT_LEDGER_PATH: &str = "data/ledger.jsonl";

/// Errors produced by ledger operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LedgerError {
    /// File I/O failed. Not retried by the core.
    #[error("ledger I/O error: {0}")]
    Io(#[from] io::Error),

    /// The ledger file is structurally damaged; reads halt here.
    #[error("ledger corrupt at line {line}: {reason}")]
    Corrupt {
        /// 1-based line number of the first bad line.
        line: u64,
        /// What was wrong with it.
        reason: String,
    },

    /// A seal was requested with no registers since the last seal (or ever).
    #[error("no registrations to seal")]
    NoRegistrations,

    /// A hex input failed structural validation.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A record could not be encoded for writing.
    #[error("failed to encode ledger record: {0}")]
    Encode(#[from] serde_json::Error),
}

impl AuditKind for LedgerError {
    fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) | Self::Encode(_) => "LedgerIO",
            Self::Corrupt { .. } => "LedgerCorrupt",
            Self::NoRegistrations => "NoRegistrations",
            Self::Codec(err) => err.kind(),
        }
    }
}

/// A registration: data with `object_hash` existed at `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterRecord {
    /// Canon version the record was written under.
    #[serde(rename = "canon")]
    pub canon_version: String,

    /// Stamp assigned by the appender, UTC with nanosecond precision.
    #[serde(with = "serde_rfc3339_nanos")]
    pub timestamp: DateTime<Utc>,

    /// SHA-256 digest of the registered object's canonical bytes.
    #[serde(rename = "object_hash_hex")]
    pub object_hash: Digest,

    /// Original canonical-JSON bytes, base64-encoded, for audit replay only.
    /// Not part of the hash chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_json_b64: Option<String>,
}

/// The signed tuple a seal carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Merkle root over the epoch's register digests.
    pub merkle_root: Digest,

    /// Ed25519 signature over the raw 32 bytes of `merkle_root`.
    pub signature: Signature,

    /// Public key the signature verifies under.
    pub public_key: PublicKey,

    /// When the seal was produced.
    #[serde(with = "serde_rfc3339_nanos")]
    pub timestamp: DateTime<Utc>,
}

impl Manifest {
    /// Builds a manifest from hex fields, validating each at the boundary.
    ///
    /// # Errors
    ///
    /// Returns a codec error when any field fails strict lowercase-hex
    /// validation.
    pub fn from_hex_parts(
        merkle_root_hex: &str,
        signature_hex: &str,
        public_key_hex: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, CodecError> {
        Ok(Self {
            merkle_root: Digest::from_hex(merkle_root_hex)?,
            signature: Signature::from_hex(signature_hex)?,
            public_key: PublicKey::from_hex(public_key_hex)?,
            timestamp,
        })
    }
}

/// A seal record wrapping its manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealRecord {
    /// The signed manifest.
    pub manifest: Manifest,
}

/// A ledger line, discriminated by its `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LedgerRecord {
    /// A registration line.
    Register(RegisterRecord),
    /// A seal line.
    Seal(SealRecord),
}

/// State guarded by the append mutex: the last stamp handed out.
#[derive(Debug, Default)]
struct AppendState {
    last_stamp: Option<DateTime<Utc>>,
}

/// Handle to one append-only ledger file.
///
/// The handle owns the path and the serialization primitive; there is no
/// ambient global state. Clone-free by design: share it behind an `Arc` when
/// multiple threads append.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    append: Mutex<AppendState>,
}

impl Ledger {
    /// Opens a ledger at `path`.
    ///
    /// The file and its parent directory are created lazily on first append;
    /// a missing file reads as empty.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append: Mutex::new(AppendState::default()),
        }
    }

    /// Opens the ledger at [`DEFAULT_LEDGER_PATH`].
    #[must_use]
    pub fn open_default() -> Self {
        Self::open(DEFAULT_LEDGER_PATH)
    }

    /// Returns the ledger file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a registration for `object_hash_hex`, stamping it with a
    /// monotonic UTC timestamp.
    ///
    /// `canonical_json`, when given, is stored base64-encoded for audit
    /// replay; it does not participate in any digest.
    ///
    /// # Errors
    ///
    /// Returns a codec error for malformed hex and [`LedgerError::Io`] when
    /// the write fails.
    pub fn append_register(
        &self,
        object_hash_hex: &str,
        canonical_json: Option<&[u8]>,
    ) -> Result<RegisterRecord, LedgerError> {
        let object_hash = Digest::from_hex(object_hash_hex)?;

        let mut state = self.append.lock().unwrap();
        let record = RegisterRecord {
            canon_version: canon::CANON_VERSION.to_string(),
            timestamp: Self::monotonic_stamp(&mut state),
            object_hash,
            canonical_json_b64: canonical_json.map(|bytes| BASE64.encode(bytes)),
        };
        self.write_line(&LedgerRecord::Register(record.clone()))?;
        drop(state);

        tracing::debug!(object_hash = %record.object_hash, "register appended");
        Ok(record)
    }

    /// Appends a seal carrying `manifest`.
    ///
    /// The precondition scan and the append happen under the same lock
    /// acquisition, so the "at least one register since the last seal" rule
    /// holds even under racing sealers.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NoRegistrations`] when nothing registers since
    /// the previous seal (the file is left untouched), and propagates read
    /// and write failures.
    pub fn append_seal(&self, manifest: &Manifest) -> Result<SealRecord, LedgerError> {
        let state = self.append.lock().unwrap();

        let last_seal = self.last_seal_timestamp()?;
        let pending = self.list_registers_since(last_seal)?;
        if pending.is_empty() {
            return Err(LedgerError::NoRegistrations);
        }

        let record = SealRecord {
            manifest: manifest.clone(),
        };
        self.write_line(&LedgerRecord::Seal(record.clone()))?;
        drop(state);

        tracing::debug!(
            merkle_root = %record.manifest.merkle_root,
            sealed = pending.len(),
            "seal appended"
        );
        Ok(record)
    }

    /// Lists register records with `timestamp > since`, in file order.
    ///
    /// `None` means "since the beginning". A missing file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Corrupt`] on the first structurally bad line
    /// and [`LedgerError::Io`] for read failures.
    pub fn list_registers_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RegisterRecord>, LedgerError> {
        let mut registers = Vec::new();
        self.scan(|_, record| {
            if let LedgerRecord::Register(register) = record {
                if since.map_or(true, |cutoff| register.timestamp > cutoff) {
                    registers.push(register);
                }
            }
        })?;
        Ok(registers)
    }

    /// Returns the timestamp of the most recent seal, or `None` when the
    /// ledger has never been sealed.
    ///
    /// # Errors
    ///
    /// As [`Self::list_registers_since`].
    pub fn last_seal_timestamp(&self) -> Result<Option<DateTime<Utc>>, LedgerError> {
        let mut last = None;
        self.scan(|_, record| {
            if let LedgerRecord::Seal(seal) = record {
                last = Some(seal.manifest.timestamp);
            }
        })?;
        Ok(last)
    }

    /// Streams every record to `visit`, halting on the first corrupt line.
    fn scan(&self, mut visit: impl FnMut(u64, LedgerRecord)) -> Result<(), LedgerError> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(LedgerError::Io(err)),
        };

        let mut reader = BufReader::new(file);
        let mut line = String::new();
        let mut line_no = 0u64;
        loop {
            line.clear();
            let read = reader.read_line(&mut line).map_err(|err| {
                if err.kind() == io::ErrorKind::InvalidData {
                    LedgerError::Corrupt {
                        line: line_no + 1,
                        reason: "line is not valid UTF-8".to_string(),
                    }
                } else {
                    LedgerError::Io(err)
                }
            })?;
            if read == 0 {
                return Ok(());
            }
            line_no += 1;

            let Some(text) = line.strip_suffix('\n') else {
                return Err(LedgerError::Corrupt {
                    line: line_no,
                    reason: "truncated line (missing newline terminator)".to_string(),
                });
            };
            if text.is_empty() {
                continue;
            }

            let record: LedgerRecord =
                serde_json::from_str(text).map_err(|err| LedgerError::Corrupt {
                    line: line_no,
                    reason: err.to_string(),
                })?;
            visit(line_no, record);
        }
    }

    /// Serializes one record and appends it as a single LF-terminated line,
    /// creating the parent directory on first use and syncing the file data
    /// before returning.
    fn write_line(&self, record: &LedgerRecord) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    /// Next stamp: wall clock clamped to strictly after the previous stamp.
    fn monotonic_stamp(state: &mut AppendState) -> DateTime<Utc> {
        let now = Utc::now();
        let stamp = match state.last_stamp {
            Some(last) if now <= last => last + Duration::nanoseconds(1),
            _ => now,
        };
        state.last_stamp = Some(stamp);
        stamp
    }
}
