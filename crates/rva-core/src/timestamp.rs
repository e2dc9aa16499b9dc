//! RFC 3339 timestamps with fixed nanosecond precision.
//!
//! Every timestamp the registry emits is a UTC instant formatted with exactly
//! nine fractional digits and a `Z` suffix, e.g.
//! `2026-01-10T12:34:56.000000001Z`. The fixed width makes serialization a
//! pure function of the instant, so records round-trip bit-exactly.

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::error::AuditKind;

/// Error for unparseable timestamp text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid timestamp {value:?}: {message}")]
pub struct TimestampError {
    /// The rejected input.
    pub value: String,
    /// Parser diagnostic.
    pub message: String,
}

impl AuditKind for TimestampError {
    fn kind(&self) -> &'static str {
        "InvalidTimestamp"
    }
}

/// Formats an instant in the canonical registry form.
#[must_use]
pub fn format(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Parses an RFC 3339 timestamp into a UTC instant.
///
/// Offset forms other than `Z` are accepted on input and normalized to UTC;
/// output is always `Z`.
///
/// # Errors
///
/// Returns [`TimestampError`] when the text is not valid RFC 3339.
pub fn parse(input: &str) -> Result<DateTime<Utc>, TimestampError> {
    DateTime::parse_from_rfc3339(input)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| TimestampError {
            value: input.to_string(),
            message: err.to_string(),
        })
}

/// Serde helper for the canonical timestamp form.
///
/// Usage: `#[serde(with = "crate::timestamp::serde_rfc3339_nanos")]`.
pub mod serde_rfc3339_nanos {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes an instant as fixed-nanosecond RFC 3339.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(
        ts: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format(*ts))
    }

    /// Deserializes an RFC 3339 instant.
    ///
    /// # Errors
    ///
    /// Fails the deserializer on unparseable text.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn format_has_fixed_nanosecond_width() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 10, 12, 34, 56).unwrap();
        assert_eq!(format(ts), "2026-01-10T12:34:56.000000000Z");
    }

    #[test]
    fn parse_round_trips() {
        let text = "2026-01-10T12:34:56.000000001Z";
        let ts = parse(text).unwrap();
        assert_eq!(format(ts), text);
    }

    #[test]
    fn offset_input_normalizes_to_utc() {
        let ts = parse("2026-01-10T13:34:56.5+01:00").unwrap();
        assert_eq!(format(ts), "2026-01-10T12:34:56.500000000Z");
    }

    #[test]
    fn garbage_is_rejected() {
        let err = parse("not-a-timestamp").unwrap_err();
        assert_eq!(err.value, "not-a-timestamp");
        assert_eq!(crate::error::AuditKind::kind(&err), "InvalidTimestamp");
    }
}
