//! # Hash Format — Validated SHA-256 Hex Digests
//!
//! Every hash that crosses a boundary in this workspace (payment snapshot,
//! export manifest, freight settlement, chain root, evidence references)
//! is exactly 64 lowercase hexadecimal characters. Any other shape is
//! rejected, never repaired: uppercase input is an error, not something to
//! lowercase, because two spellings of the same digest would compare unequal
//! in a store that never saw this validator.

use serde::{Deserialize, Serialize};

use crate::error::IntegrityError;

/// Length of a hex-encoded SHA-256 digest.
pub const SHA256_HEX_LEN: usize = 64;

/// A validated SHA-256 digest rendered as 64 lowercase hex characters.
///
/// The inner string is private; the only constructors are
/// [`Sha256Hex::parse`], [`Sha256Hex::from_digest`], and deserialization
/// (which runs the same validation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sha256Hex(String);

impl Sha256Hex {
    /// Validate and normalize a hash value.
    ///
    /// Surrounding whitespace is trimmed; the remainder must match
    /// `^[0-9a-f]{64}$`.
    ///
    /// # Errors
    ///
    /// Returns [`IntegrityError::InvalidHashFormat`] naming `field`.
    pub fn parse(value: &str, field: &str) -> Result<Self, IntegrityError> {
        let trimmed = value.trim();
        if is_valid_sha256_hex(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(IntegrityError::InvalidHashFormat {
                field: field.to_string(),
            })
        }
    }

    /// Render a raw 32-byte digest.
    pub fn from_digest(bytes: [u8; 32]) -> Self {
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// The 64-character hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Non-failing check used for optional fields and for classifying stored
/// values during verification.
pub fn is_valid_sha256_hex(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.len() == SHA256_HEX_LEN
        && trimmed
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

impl TryFrom<String> for Sha256Hex {
    type Error = IntegrityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value, "sha256")
    }
}

impl From<Sha256Hex> for String {
    fn from(value: Sha256Hex) -> Self {
        value.0
    }
}

impl AsRef<str> for Sha256Hex {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Sha256Hex {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Sha256Hex {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for Sha256Hex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a";

    #[test]
    fn accepts_lowercase_hex() {
        let h = Sha256Hex::parse(VALID, "h").unwrap();
        assert_eq!(h.as_str(), VALID);
    }

    #[test]
    fn trims_surrounding_whitespace() {
        let h = Sha256Hex::parse(&format!("  {VALID}\n"), "h").unwrap();
        assert_eq!(h, VALID);
    }

    #[test]
    fn rejects_uppercase() {
        let upper = "A".repeat(64);
        let err = Sha256Hex::parse(&upper, "paymentSnapshotHash").unwrap_err();
        assert!(matches!(
            err,
            IntegrityError::InvalidHashFormat { ref field } if field == "paymentSnapshotHash"
        ));
        assert!(!is_valid_sha256_hex(&upper));
    }

    #[test]
    fn rejects_wrong_length() {
        let short = "a".repeat(63);
        assert!(Sha256Hex::parse(&short, "h").is_err());
        assert!(!is_valid_sha256_hex(&short));
        assert!(!is_valid_sha256_hex(&"a".repeat(65)));
    }

    #[test]
    fn rejects_non_hex_and_empty() {
        assert!(!is_valid_sha256_hex(&"g".repeat(64)));
        assert!(!is_valid_sha256_hex(""));
        assert!(Sha256Hex::parse("   ", "h").is_err());
    }

    #[test]
    fn from_digest_renders_lowercase() {
        let h = Sha256Hex::from_digest([0xAB; 32]);
        assert_eq!(h.as_str(), "ab".repeat(32));
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let ok: Sha256Hex = serde_json::from_str(&format!("\"{VALID}\"")).unwrap();
        assert_eq!(ok, VALID);
        let bad: Result<Sha256Hex, _> = serde_json::from_str(&format!("\"{}\"", "F".repeat(64)));
        assert!(bad.is_err());
    }

    #[test]
    fn serializes_as_plain_string() {
        let h = Sha256Hex::parse(VALID, "h").unwrap();
        assert_eq!(serde_json::to_string(&h).unwrap(), format!("\"{VALID}\""));
    }
}
