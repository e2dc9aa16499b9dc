//! Deterministic canonical JSON, the pre-image format for all digests.
//!
//! The encoding is a strict subset of RFC 8785 (JCS): object keys sorted by
//! byte-wise lexicographic order at every nesting level, arrays in input
//! order, no insignificant whitespace, minimal string escaping, UTF-8, and no
//! trailing newline. Canonicalization is idempotent:
//! `canonicalize(canonicalize(x)) == canonicalize(x)` byte-for-byte.
//!
//! # Numeric policy
//!
//! Numbers are integers within the signed 64-bit range. Floats and integers
//! above `i64::MAX` are rejected rather than reformatted, which keeps the
//! digest pre-image free of any platform float-formatting variance. `-0`
//! parses as integer zero, so the emitter can never produce `-0`.
//!
//! # Structural limits
//!
//! Duplicate object keys (compared after escape decoding, so `"a"` and
//! `"\u0061"` collide) and nesting beyond [`MAX_DEPTH`] levels are rejected.
//! Non-UTF-8 input is rejected with its own error kind before parsing.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::error::AuditKind;

/// Maximum nesting depth accepted by the canonicalizer.
pub const MAX_DEPTH: usize = 128;

/// Errors produced while canonicalizing JSON.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CanonicalJsonError {
    /// Input bytes are not valid UTF-8.
    #[error("input is not valid UTF-8")]
    NotUtf8,

    /// Input is not structurally valid JSON.
    #[error("invalid JSON: {message}")]
    Parse {
        /// Parser diagnostic.
        message: String,
    },

    /// A floating-point number was encountered; the canon is integer-only.
    #[error("non-integer number not allowed in canonical JSON")]
    FloatNotAllowed,

    /// An integer falls outside the signed 64-bit range.
    #[error("integer {value} outside signed 64-bit range")]
    IntegerOutOfRange {
        /// Textual form of the offending number.
        value: String,
    },

    /// An object carries the same key twice.
    #[error("duplicate object key {key:?}")]
    DuplicateKey {
        /// The duplicated key, after escape decoding.
        key: String,
    },

    /// Nesting exceeds [`MAX_DEPTH`] levels.
    #[error("nesting deeper than {MAX_DEPTH} levels")]
    DepthExceeded,
}

impl AuditKind for CanonicalJsonError {
    fn kind(&self) -> &'static str {
        "CanonicalJson"
    }
}

/// Canonicalizes a JSON text.
///
/// # Errors
///
/// Returns [`CanonicalJsonError`] when the input is not valid JSON or
/// violates the canon's numeric, duplicate-key, or depth rules.
pub fn canonicalize_str(input: &str) -> Result<String, CanonicalJsonError> {
    let value = parse_checked(input)?;
    canonicalize_value(&value)
}

/// Canonicalizes raw bytes, rejecting non-UTF-8 input first.
///
/// # Errors
///
/// Returns [`CanonicalJsonError::NotUtf8`] for invalid UTF-8, otherwise as
/// [`canonicalize_str`].
pub fn canonicalize_bytes(input: &[u8]) -> Result<String, CanonicalJsonError> {
    let text = std::str::from_utf8(input).map_err(|_| CanonicalJsonError::NotUtf8)?;
    canonicalize_str(text)
}

/// Canonicalizes an in-memory [`Value`].
///
/// The value is validated against the canon rules (integer-only numbers,
/// depth bound) before emission. Duplicate keys cannot occur in a `Value`;
/// they are caught at parse time by [`canonicalize_str`].
///
/// # Errors
///
/// Returns [`CanonicalJsonError`] when the value violates the numeric or
/// depth rules.
pub fn canonicalize_value(value: &Value) -> Result<String, CanonicalJsonError> {
    check_value(value, 0)?;
    let mut out = String::new();
    emit(value, &mut out);
    Ok(out)
}

/// Returns `true` when `input` is already in canonical form.
#[must_use]
pub fn is_canonical(input: &str) -> bool {
    canonicalize_str(input).is_ok_and(|canonical| canonical == input)
}

/// Parses JSON while rejecting duplicate object keys.
///
/// `serde_json` silently applies last-key-wins; the canon treats a duplicate
/// as structural corruption of the pre-image, so parsing goes through a
/// visitor that compares keys after escape decoding.
fn parse_checked(input: &str) -> Result<Value, CanonicalJsonError> {
    let mut deserializer = serde_json::Deserializer::from_str(input);
    let checked = CheckedValue::deserialize(&mut deserializer).map_err(|err| {
        let message = err.to_string();
        if let Some(rest) = message.strip_prefix("duplicate object key ") {
            // Serde appends " at line X column Y"; keep only the key.
            let key = rest.split(" at line ").next().unwrap_or(rest);
            CanonicalJsonError::DuplicateKey {
                key: key.trim_matches('"').to_string(),
            }
        } else {
            CanonicalJsonError::Parse { message }
        }
    })?;
    deserializer
        .end()
        .map_err(|err| CanonicalJsonError::Parse {
            message: err.to_string(),
        })?;
    Ok(checked.0)
}

struct CheckedValue(Value);

impl<'de> Deserialize<'de> for CheckedValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CheckedVisitor;

        impl<'de> Visitor<'de> for CheckedVisitor {
            type Value = Value;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a JSON value")
            }

            fn visit_bool<E>(self, v: bool) -> Result<Value, E> {
                Ok(Value::Bool(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Value, E> {
                Ok(Value::Number(v.into()))
            }

            fn visit_u64<E>(self, v: u64) -> Result<Value, E> {
                Ok(Value::Number(v.into()))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
                Number::from_f64(v)
                    .map(Value::Number)
                    .ok_or_else(|| de::Error::custom("non-finite number"))
            }

            fn visit_str<E>(self, v: &str) -> Result<Value, E> {
                Ok(Value::String(v.to_owned()))
            }

            fn visit_string<E>(self, v: String) -> Result<Value, E> {
                Ok(Value::String(v))
            }

            fn visit_unit<E>(self) -> Result<Value, E> {
                Ok(Value::Null)
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
                let mut items = Vec::new();
                while let Some(CheckedValue(item)) = seq.next_element()? {
                    items.push(item);
                }
                Ok(Value::Array(items))
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
                let mut seen = BTreeSet::new();
                let mut object = Map::new();
                while let Some(key) = map.next_key::<String>()? {
                    if !seen.insert(key.clone()) {
                        return Err(de::Error::custom(format!(
                            "duplicate object key {key:?}"
                        )));
                    }
                    let CheckedValue(value) = map.next_value()?;
                    object.insert(key, value);
                }
                Ok(Value::Object(object))
            }
        }

        deserializer.deserialize_any(CheckedVisitor).map(CheckedValue)
    }
}

/// Recursively enforces the numeric and depth rules.
fn check_value(value: &Value, depth: usize) -> Result<(), CanonicalJsonError> {
    if depth > MAX_DEPTH {
        return Err(CanonicalJsonError::DepthExceeded);
    }
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(number) => check_number(number),
        Value::Array(items) => items.iter().try_for_each(|item| check_value(item, depth + 1)),
        Value::Object(object) => object
            .values()
            .try_for_each(|item| check_value(item, depth + 1)),
    }
}

fn check_number(number: &Number) -> Result<(), CanonicalJsonError> {
    if number.is_i64() {
        return Ok(());
    }
    if let Some(big) = number.as_u64() {
        return Err(CanonicalJsonError::IntegerOutOfRange {
            value: big.to_string(),
        });
    }
    Err(CanonicalJsonError::FloatNotAllowed)
}

/// Emits a validated value in canonical form.
fn emit(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(flag) => out.push_str(if *flag { "true" } else { "false" }),
        Value::Number(number) => {
            // Validation guarantees an in-range integer; -0 was already
            // folded to 0 by the integer parse.
            let _ = write!(out, "{number}");
        },
        Value::String(text) => emit_string(text, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                emit(item, out);
            }
            out.push(']');
        },
        Value::Object(object) => {
            let mut keys: Vec<&String> = object.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                emit_string(key, out);
                out.push(':');
                emit(&object[*key], out);
            }
            out.push('}');
        },
    }
}

/// Emits a string with the minimal escaping RFC 8785 §3.2.2.2 requires:
/// quote, backslash, and the C0 controls (short escapes where defined).
fn emit_string(text: &str, out: &mut String) {
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ch if ch <= '\u{001F}' => {
                let _ = write!(out, "\\u{:04x}", u32::from(ch));
            },
            ch => out.push(ch),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_keys_and_strips_whitespace() {
        let input = r#"{ "z": 1, "a": 2, "m": 3 }"#;
        assert_eq!(canonicalize_str(input).unwrap(), r#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn sorts_keys_at_every_level() {
        let input = r#"{"outer": {"z": 1, "a": 2}, "arr": [{"y": 1, "x": 2}]}"#;
        assert_eq!(
            canonicalize_str(input).unwrap(),
            r#"{"arr":[{"x":2,"y":1}],"outer":{"a":2,"z":1}}"#
        );
    }

    #[test]
    fn arrays_preserve_order() {
        assert_eq!(canonicalize_str("[3, 1, 2]").unwrap(), "[3,1,2]");
    }

    #[test]
    fn primitives_pass_through() {
        assert_eq!(canonicalize_str("null").unwrap(), "null");
        assert_eq!(canonicalize_str("true").unwrap(), "true");
        assert_eq!(canonicalize_str("-42").unwrap(), "-42");
        assert_eq!(canonicalize_str(r#""hi""#).unwrap(), r#""hi""#);
        assert_eq!(canonicalize_str("{}").unwrap(), "{}");
        assert_eq!(canonicalize_str("[]").unwrap(), "[]");
    }

    #[test]
    fn idempotent_with_no_trailing_newline() {
        let inputs = [
            r#"{"z": 1, "a": 2}"#,
            r#"{"nested": {"b": 2, "a": 1}, "top": "value"}"#,
            r#"[1, 2, {"y": 3, "x": 4}]"#,
        ];
        for input in inputs {
            let once = canonicalize_str(input).unwrap();
            let twice = canonicalize_str(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {input}");
            assert!(!once.ends_with('\n'));
            assert!(is_canonical(&once));
        }
    }

    #[test]
    fn equivalent_inputs_canonicalize_identically() {
        let a = r#"{"z": {"c": 3, "a": 1}, "a": [1, {"y": 1, "x": 2}]}"#;
        let b = r#"{"a": [1, {"x": 2, "y": 1}], "z": {"a": 1, "c": 3}}"#;
        assert_eq!(canonicalize_str(a).unwrap(), canonicalize_str(b).unwrap());
    }

    #[test]
    fn rejects_floats() {
        assert_eq!(
            canonicalize_str(r#"{"x": 1.5}"#),
            Err(CanonicalJsonError::FloatNotAllowed)
        );
        assert_eq!(
            canonicalize_str("[1, 2.0e3]"),
            Err(CanonicalJsonError::FloatNotAllowed)
        );
    }

    #[test]
    fn rejects_integers_above_i64() {
        let value = (i64::MAX as u64) + 1;
        let result = canonicalize_str(&format!(r#"{{"x": {value}}}"#));
        assert!(matches!(
            result,
            Err(CanonicalJsonError::IntegerOutOfRange { .. })
        ));
    }

    #[test]
    fn accepts_i64_extremes_and_folds_negative_zero() {
        assert_eq!(
            canonicalize_str(&format!("[{}, {}]", i64::MIN, i64::MAX)).unwrap(),
            format!("[{},{}]", i64::MIN, i64::MAX)
        );
        assert_eq!(canonicalize_str("-0").unwrap(), "0");
    }

    #[test]
    fn rejects_duplicate_keys() {
        assert_eq!(
            canonicalize_str(r#"{"a": 1, "a": 2}"#),
            Err(CanonicalJsonError::DuplicateKey { key: "a".into() })
        );
    }

    #[test]
    fn rejects_duplicate_keys_after_escape_decoding() {
        // "\u0061" decodes to "a".
        assert_eq!(
            canonicalize_str(r#"{"a": 1, "\u0061": 2}"#),
            Err(CanonicalJsonError::DuplicateKey { key: "a".into() })
        );
    }

    #[test]
    fn same_key_in_sibling_objects_is_fine() {
        assert!(canonicalize_str(r#"{"a": {"x": 1}, "b": {"x": 2}}"#).is_ok());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            canonicalize_str("not json"),
            Err(CanonicalJsonError::Parse { .. })
        ));
        assert!(matches!(
            canonicalize_str(r#"{"key":"#),
            Err(CanonicalJsonError::Parse { .. })
        ));
        // Trailing garbage after a complete value is also structural.
        assert!(matches!(
            canonicalize_str("{} {}"),
            Err(CanonicalJsonError::Parse { .. })
        ));
    }

    #[test]
    fn rejects_non_utf8_bytes() {
        assert_eq!(
            canonicalize_bytes(&[0x7b, 0xff, 0x7d]),
            Err(CanonicalJsonError::NotUtf8)
        );
    }

    #[test]
    fn rejects_excessive_depth() {
        let mut json = String::from("0");
        for _ in 0..200 {
            json = format!("[{json}]");
        }
        let result = canonicalize_str(&json);
        // Either this crate's bound or serde_json's recursion limit trips.
        assert!(matches!(
            result,
            Err(CanonicalJsonError::DepthExceeded | CanonicalJsonError::Parse { .. })
        ));
    }

    #[test]
    fn minimal_escaping() {
        assert_eq!(
            canonicalize_str(r#"{"text": "line1\nline2\ttab"}"#).unwrap(),
            r#"{"text":"line1\nline2\ttab"}"#
        );
        assert_eq!(
            canonicalize_str(r#"{"text": "say \"hi\" \\"}"#).unwrap(),
            r#"{"text":"say \"hi\" \\"}"#
        );
        // NUL has no short escape.
        assert_eq!(
            canonicalize_str(r#"{"text": "\u0000"}"#).unwrap(),
            r#"{"text":"\u0000"}"#
        );
        // DEL and C1 controls stay raw per JCS minimal escaping.
        assert_eq!(
            canonicalize_str("\"\u{007f}\"").unwrap(),
            "\"\u{007f}\""
        );
    }

    #[test]
    fn unicode_passes_through() {
        assert_eq!(
            canonicalize_str(r#"{"emoji": "❤", "cjk": "中文"}"#).unwrap(),
            "{\"cjk\":\"\u{4e2d}\u{6587}\",\"emoji\":\"\u{2764}\"}"
        );
    }
}
