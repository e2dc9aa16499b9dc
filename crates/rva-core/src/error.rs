//! Audit reporting contract shared by every error type in the core.
//!
//! CLI hosts built on this crate surface rejections as a single stderr line
//! `AUDIT_FAIL: <kind>: <detail>` and a non-zero exit. Library consumers get
//! the typed error; [`AuditKind`] is the seam that lets both views exist
//! without the core losing error specificity.
//!
//! The `kind` strings are stable identifiers from the core error taxonomy
//! (`InvalidHex`, `InvalidProof`, `LedgerCorrupt`, `AuditFail`, ...). They
//! are part of the external interface and must not be renamed casually.

/// Stable error-kind classification plus audit-line formatting.
///
/// Every boundary error enum in this crate implements this trait. Wrapper
/// variants delegate `kind()` to their cause so the most specific taxonomy
/// entry always wins.
pub trait AuditKind: std::error::Error {
    /// Returns the stable taxonomy kind for this error value.
    fn kind(&self) -> &'static str;

    /// Formats the single-line audit record for CLI consumers.
    fn audit_line(&self) -> String {
        format!("AUDIT_FAIL: {}: {self}", self.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CodecError;

    #[test]
    fn audit_line_carries_kind_and_detail() {
        let err = CodecError::InvalidHex { what: "digest" };
        let line = err.audit_line();
        assert!(line.starts_with("AUDIT_FAIL: InvalidHex: "));
        assert!(line.contains("digest"));
    }
}
