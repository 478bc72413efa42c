//! # Canonical Serialization — JCS-Compatible Byte Production
//!
//! This module defines `CanonicalBytes`, the sole construction path for
//! bytes that get hashed as structured data anywhere in the workspace.
//!
//! ## Security Invariant
//!
//! The `CanonicalBytes` newtype has a private inner field. The only way to
//! construct it is through `CanonicalBytes::new()`, which rejects floats
//! and then serializes with RFC 8785 (JSON Canonicalization Scheme): keys
//! sorted at every level, compact separators, no whitespace.
//!
//! Any function that needs canonical bytes for hashing accepts
//! `&CanonicalBytes`, so the "wrong serialization path" defect class is
//! ruled out by the type system.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization with float rejection.
///
/// # Invariants
///
/// - The only constructor is `CanonicalBytes::new()`.
/// - All numbers are integers; floats are rejected.
/// - Object keys are sorted at every nesting level.
/// - No whitespace between tokens.
/// - Always valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(String);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalizationError::FloatRejected` if the value contains
    /// a non-integer number. Returns `CanonicalizationError::SerializationFailed`
    /// if serialization fails.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        if let Some(f) = find_float(&value) {
            return Err(CanonicalizationError::FloatRejected(f));
        }
        Ok(Self(serde_jcs::to_string(&value)?))
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// The canonical text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

/// First non-integer number anywhere in `value`.
///
/// Settlement payloads carry no floats by the time they get here; this
/// holds the invariant for any other value given to `CanonicalBytes::new`.
fn find_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) if !n.is_i64() && !n.is_u64() => n.as_f64(),
        Value::Array(items) => items.iter().find_map(find_float),
        Value::Object(map) => map.values().find_map(find_float),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_bytes_simple_dict() {
        let data = serde_json::json!({"b": 2, "a": 1, "c": "hello"});
        let cb = CanonicalBytes::new(&data).expect("should canonicalize");
        assert_eq!(cb.as_str(), r#"{"a":1,"b":2,"c":"hello"}"#);
    }

    #[test]
    fn test_canonical_bytes_nested() {
        let data = serde_json::json!({
            "outer": {"b": 2, "a": 1},
            "list": [3, 2, 1]
        });
        let cb = CanonicalBytes::new(&data).expect("should canonicalize");
        // Arrays keep their order; only object keys are sorted.
        assert_eq!(cb.as_str(), r#"{"list":[3,2,1],"outer":{"a":1,"b":2}}"#);
    }

    #[test]
    fn test_float_rejection() {
        let data = serde_json::json!({"amount": 1.5});
        match CanonicalBytes::new(&data).unwrap_err() {
            CanonicalizationError::FloatRejected(f) => assert_eq!(f, 1.5),
            other => panic!("Expected FloatRejected, got: {other}"),
        }
    }

    #[test]
    fn test_deeply_nested_float_rejected() {
        let data = serde_json::json!({"a": {"b": [{"c": 3.25}]}});
        assert!(CanonicalBytes::new(&data).is_err());
    }

    #[test]
    fn test_large_integer_plain_decimal() {
        let data = serde_json::json!({"val": 10_000_000_000_000_000i64});
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(cb.as_str(), r#"{"val":10000000000000000}"#);
    }

    #[test]
    fn test_negative_integer() {
        let data = serde_json::json!({"val": -42});
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(cb.as_str(), r#"{"val":-42}"#);
    }

    #[test]
    fn test_null_and_bool_passthrough() {
        let data = serde_json::json!({"flag": true, "key": null});
        let cb = CanonicalBytes::new(&data).unwrap();
        assert_eq!(cb.as_str(), r#"{"flag":true,"key":null}"#);
    }

    #[test]
    fn test_empty_object() {
        let cb = CanonicalBytes::new(&serde_json::json!({})).unwrap();
        assert_eq!(cb.as_bytes(), b"{}");
        assert!(!cb.is_empty());
        assert_eq!(cb.len(), 2);
    }

    #[test]
    fn test_unicode_passthrough() {
        let data = serde_json::json!({"name": "Chennai \u{2192} Rotterdam"});
        let cb = CanonicalBytes::new(&data).unwrap();
        assert!(cb.as_str().contains('\u{2192}'));
    }
}
