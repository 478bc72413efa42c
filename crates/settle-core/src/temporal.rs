//! # Temporal Types — UTC-Only Timestamps
//!
//! Defines `Timestamp`, a UTC-only instant with millisecond precision,
//! rendered as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
//!
//! ## Security Invariant
//!
//! Timestamps inside a canonical settlement payload must be UTC with a `Z`
//! suffix. A local offset would produce different canonical bytes for the
//! same instant and break hash reproducibility.
//!
//! Non-UTC inputs are **rejected at construction**. `+00:00` is rejected
//! too: it names the same instant but spells it differently.

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CanonicalizationError;

/// A UTC-only timestamp truncated to millisecond precision.
///
/// # Construction
///
/// - [`Timestamp::from_utc()`] — from a `DateTime<Utc>`, truncating below milliseconds.
/// - [`Timestamp::parse()`] — from an RFC 3339 string, rejecting non-`Z` offsets
///   and nonzero digits below milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp from a `chrono::DateTime<Utc>`.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_millis(dt))
    }

    /// Parse a timestamp from an RFC 3339 string.
    ///
    /// Only timestamps with the `Z` suffix are accepted. Digits below the
    /// millisecond must be zero, so two distinct inputs never render to the
    /// same canonical text.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalizationError::InvalidTimestamp`] naming `field` if
    /// the string is not valid RFC 3339, does not end in `Z`, or carries
    /// sub-millisecond precision.
    pub fn parse(s: &str, field: &str) -> Result<Self, CanonicalizationError> {
        let invalid = || CanonicalizationError::InvalidTimestamp {
            field: field.to_string(),
            value: s.to_string(),
        };
        if !s.ends_with('Z') {
            return Err(invalid());
        }
        let dt = DateTime::parse_from_rfc3339(s).map_err(|_| invalid())?;
        if dt.nanosecond() % 1_000_000 != 0 {
            return Err(invalid());
        }
        Ok(Self(dt.with_timezone(&Utc)))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Render as RFC 3339 with millisecond precision and `Z` suffix
    /// (e.g., `2026-01-15T12:00:00.000Z`).
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw, "timestamp").map_err(serde::de::Error::custom)
    }
}

fn truncate_to_millis(dt: DateTime<Utc>) -> DateTime<Utc> {
    let millis = dt.nanosecond() / 1_000_000;
    dt.with_nanosecond(millis * 1_000_000).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_from_utc_truncates_below_millis() {
        let dt = Utc.with_ymd_and_hms(2026, 1, 15, 12, 30, 45).unwrap();
        let dt = dt.with_nanosecond(123_456_789).unwrap();
        let ts = Timestamp::from_utc(dt);
        assert_eq!(ts.to_rfc3339(), "2026-01-15T12:30:45.123Z");
    }

    #[test]
    fn test_parse_z_suffix_accepted() {
        let ts = Timestamp::parse("2026-01-15T12:00:00Z", "t").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-01-15T12:00:00.000Z");
    }

    #[test]
    fn test_parse_keeps_millis() {
        let ts = Timestamp::parse("2026-01-15T12:00:00.5Z", "t").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-01-15T12:00:00.500Z");
    }

    #[test]
    fn test_parse_rejects_sub_millisecond_digits() {
        for raw in ["2026-01-15T12:00:00.1234Z", "2026-01-15T12:00:00.1239Z", "2026-01-15T12:00:00.000001Z"] {
            let err = Timestamp::parse(raw, "finalizedAt").unwrap_err();
            assert!(matches!(
                err,
                CanonicalizationError::InvalidTimestamp { ref value, .. } if value == raw
            ));
        }
        let padded = Timestamp::parse("2026-01-15T12:00:00.123000Z", "t").unwrap();
        assert_eq!(padded.to_rfc3339(), "2026-01-15T12:00:00.123Z");
    }

    #[test]
    fn test_parse_plus_zero_rejected() {
        let err = Timestamp::parse("2026-01-15T12:00:00+00:00", "finalizedAt").unwrap_err();
        assert!(matches!(
            err,
            CanonicalizationError::InvalidTimestamp { ref field, .. } if field == "finalizedAt"
        ));
    }

    #[test]
    fn test_parse_offsets_rejected() {
        assert!(Timestamp::parse("2026-01-15T17:00:00+05:00", "t").is_err());
        assert!(Timestamp::parse("2026-01-15T08:00:00-04:00", "t").is_err());
    }

    #[test]
    fn test_parse_invalid_format() {
        assert!(Timestamp::parse("not-a-dateZ", "t").is_err());
        assert!(Timestamp::parse("2026-01-15", "t").is_err());
        assert!(Timestamp::parse("", "t").is_err());
        assert!(Timestamp::parse("2026-13-45T00:00:00Z", "t").is_err());
    }

    #[test]
    fn test_rendering_is_a_fixed_point() {
        let ts = Timestamp::parse("2026-06-30T23:59:59.999Z", "t").unwrap();
        let again = Timestamp::parse(&ts.to_rfc3339(), "t").unwrap();
        assert_eq!(ts, again);
        assert_eq!(ts.to_rfc3339(), again.to_rfc3339());
    }

    #[test]
    fn test_serde_roundtrip() {
        let ts = Timestamp::parse("2026-01-15T12:00:00Z", "t").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2026-01-15T12:00:00.000Z\"");
        let parsed: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, parsed);
    }

    #[test]
    fn test_ordering() {
        let earlier = Timestamp::parse("2026-01-15T12:00:00Z", "t").unwrap();
        let later = Timestamp::parse("2026-01-15T12:00:00.001Z", "t").unwrap();
        assert!(earlier < later);
    }
}
