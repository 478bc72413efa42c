//! # Settlement Payload — Input, Normalization, Canonical JSON
//!
//! [`SettlementPayloadInput`] is the loosely-shaped form a caller submits.
//! [`normalize`] turns it into a [`CanonicalSettlementPayload`] whose every
//! field is already validated, and [`canonicalize`] renders that through
//! [`CanonicalBytes`] into the one byte sequence that gets hashed.
//!
//! Normalization rules:
//!
//! - `schemaVersion`, `currency`, `incoterm` and `settlementStatus` accept a
//!   single pinned literal each. Anything else is rejected, never coerced.
//! - Required strings are trimmed and must be non-empty. Optional strings
//!   are trimmed; empty or absent means the key is omitted from the output.
//! - Amounts arrive as JSON numbers and leave as [`MinorUnits`]; a fractional
//!   or out-of-range amount fails with `NonIntegerAmount` naming `amounts.<key>`.
//! - `finalizedAt` must be a UTC instant with a `Z` suffix.
//! - Tracking numbers are trimmed, de-duplicated and sorted.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::canonical::CanonicalBytes;
use crate::chain::hash_canonical;
use crate::error::{CanonicalizationError, IntegrityError};
use crate::hash::Sha256Hex;
use crate::temporal::Timestamp;

/// The only accepted `schemaVersion`.
pub const SCHEMA_VERSION: &str = "freight-settlement/v1";
/// The only accepted `currency`.
pub const CURRENCY: &str = "INR";
/// The only accepted `incoterm` (Delivered Duty Paid).
pub const INCOTERM: &str = "DDP";
/// The only accepted `settlementStatus` inside a payload.
pub const PAYLOAD_STATUS: &str = "FINAL";

// ---------------------------------------------------------------------------
// MinorUnits
// ---------------------------------------------------------------------------

/// A monetary amount in minor currency units (paise for INR).
///
/// Built from any JSON number that denotes an integer: `1500`, `1.5e3` and
/// `-0.0` are accepted (the last as `0`); `12.5`, values outside `i64` and
/// anything non-finite are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct MinorUnits(i64);

impl MinorUnits {
    pub const ZERO: Self = Self(0);

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(self) -> i64 {
        self.0
    }

    /// Convert a float that denotes an integer.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalizationError::NonIntegerAmount`] naming `field`
    /// when `value` is fractional, non-finite or out of `i64` range.
    pub fn from_f64(value: f64, field: &str) -> Result<Self, CanonicalizationError> {
        // 2^63 is exactly representable; anything at or above it overflows.
        const LIMIT: f64 = 9_223_372_036_854_775_808.0;
        if !value.is_finite() || value.fract() != 0.0 || value >= LIMIT || value < -LIMIT {
            return Err(CanonicalizationError::NonIntegerAmount {
                field: field.to_string(),
            });
        }
        // Negative zero casts to 0.
        Ok(Self(value as i64))
    }

    /// Convert a JSON number, naming `field` on rejection.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalizationError::NonIntegerAmount`] for fractional
    /// or out-of-range numbers.
    pub fn from_number(value: &Number, field: &str) -> Result<Self, CanonicalizationError> {
        if let Some(v) = value.as_i64() {
            return Ok(Self(v));
        }
        if value.is_u64() {
            return Err(CanonicalizationError::NonIntegerAmount {
                field: field.to_string(),
            });
        }
        match value.as_f64() {
            Some(v) => Self::from_f64(v, field),
            None => Err(CanonicalizationError::NonIntegerAmount {
                field: field.to_string(),
            }),
        }
    }
}

impl From<i64> for MinorUnits {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for MinorUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Input shape
// ---------------------------------------------------------------------------

/// The six settlement amounts as submitted: any JSON number, checked by
/// [`AmountsInput::to_minor_units`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AmountsInput {
    pub subtotal: Number,
    pub shipping: Number,
    pub insurance: Number,
    pub duty: Number,
    pub gst: Number,
    pub total: Number,
}

impl AmountsInput {
    /// Convert every amount, naming the first offender as `amounts.<key>`.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalizationError::NonIntegerAmount`].
    pub fn to_minor_units(&self) -> Result<SettlementAmounts, CanonicalizationError> {
        Ok(SettlementAmounts {
            subtotal: MinorUnits::from_number(&self.subtotal, "amounts.subtotal")?,
            shipping: MinorUnits::from_number(&self.shipping, "amounts.shipping")?,
            insurance: MinorUnits::from_number(&self.insurance, "amounts.insurance")?,
            duty: MinorUnits::from_number(&self.duty, "amounts.duty")?,
            gst: MinorUnits::from_number(&self.gst, "amounts.gst")?,
            total: MinorUnits::from_number(&self.total, "amounts.total")?,
        })
    }
}

/// The six settlement amounts in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SettlementAmounts {
    pub subtotal: MinorUnits,
    pub shipping: MinorUnits,
    pub insurance: MinorUnits,
    pub duty: MinorUnits,
    pub gst: MinorUnits,
    pub total: MinorUnits,
}

/// Origin/destination lane as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LaneInput {
    pub origin_country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_port: Option<String>,
    pub destination_country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_port: Option<String>,
}

/// Compliance sub-record as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ComplianceInput {
    pub certificate_issued: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_hash: Option<String>,
}

/// A settlement payload as submitted by a caller, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SettlementPayloadInput {
    pub schema_version: String,
    pub order_id: String,
    pub payment_snapshot_hash: String,
    pub export_manifest_hash: String,
    pub currency: String,
    pub amounts: AmountsInput,
    pub incoterm: String,
    pub carrier_id: String,
    pub shipment_id: String,
    #[serde(default)]
    pub tracking_numbers: Vec<String>,
    pub lane: LaneInput,
    pub compliance: ComplianceInput,
    pub settlement_status: String,
    pub finalized_at: String,
}

// ---------------------------------------------------------------------------
// Normalized shape
// ---------------------------------------------------------------------------

/// Normalized lane. Absent ports are omitted from the canonical output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lane {
    pub origin_country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_port: Option<String>,
    pub destination_country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_port: Option<String>,
}

/// Normalized compliance sub-record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Compliance {
    pub certificate_issued: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_hash: Option<Sha256Hex>,
}

/// A fully validated settlement payload.
///
/// Only [`normalize`] builds one, so holding a value of this type means
/// every rule in the module docs already holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalSettlementPayload {
    schema_version: &'static str,
    order_id: String,
    payment_snapshot_hash: Sha256Hex,
    export_manifest_hash: Sha256Hex,
    currency: &'static str,
    amounts: SettlementAmounts,
    incoterm: &'static str,
    carrier_id: String,
    shipment_id: String,
    tracking_numbers: Vec<String>,
    lane: Lane,
    compliance: Compliance,
    settlement_status: &'static str,
    finalized_at: Timestamp,
}

impl CanonicalSettlementPayload {
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    pub fn payment_snapshot_hash(&self) -> &Sha256Hex {
        &self.payment_snapshot_hash
    }

    pub fn export_manifest_hash(&self) -> &Sha256Hex {
        &self.export_manifest_hash
    }

    pub fn amounts(&self) -> &SettlementAmounts {
        &self.amounts
    }

    pub fn tracking_numbers(&self) -> &[String] {
        &self.tracking_numbers
    }

    pub fn finalized_at(&self) -> Timestamp {
        self.finalized_at
    }

    /// Render the canonical JSON for this payload.
    ///
    /// # Errors
    ///
    /// Only fails if serialization itself fails.
    pub fn to_canonical_json(&self) -> Result<CanonicalJson, CanonicalizationError> {
        CanonicalBytes::new(self).map(CanonicalJson)
    }
}

/// Canonical JSON text of a settlement payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalJson(CanonicalBytes);

impl CanonicalJson {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// SHA-256 of the canonical text: the freight settlement hash.
    pub fn sha256(&self) -> Sha256Hex {
        hash_canonical(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0.into_string()
    }

    /// Parse canonical (or any) payload JSON back into the input shape.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalizationError::SerializationFailed`] for malformed
    /// JSON or unknown keys, and [`CanonicalizationError::NonIntegerAmount`]
    /// naming the amount for fractional or out-of-range amounts.
    pub fn parse(text: &str) -> Result<SettlementPayloadInput, CanonicalizationError> {
        let input: SettlementPayloadInput = serde_json::from_str(text)?;
        input.amounts.to_minor_units()?;
        Ok(input)
    }
}

impl std::fmt::Display for CanonicalJson {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Validate and normalize a submitted payload.
///
/// # Errors
///
/// Returns [`IntegrityError::InvalidHashFormat`] for malformed hashes and
/// [`IntegrityError::Canonicalization`] for every other rule.
pub fn normalize(input: &SettlementPayloadInput) -> Result<CanonicalSettlementPayload, IntegrityError> {
    let schema_version = pinned("schemaVersion", SCHEMA_VERSION, &input.schema_version)?;
    let currency = pinned("currency", CURRENCY, &input.currency)?;
    let incoterm = pinned("incoterm", INCOTERM, &input.incoterm)?;
    let settlement_status = pinned("settlementStatus", PAYLOAD_STATUS, &input.settlement_status)?;

    let compliance = Compliance {
        certificate_issued: input.compliance.certificate_issued,
        certificate_id: optional(input.compliance.certificate_id.as_deref()),
        certificate_hash: optional(input.compliance.certificate_hash.as_deref())
            .map(|h| Sha256Hex::parse(&h, "compliance.certificateHash"))
            .transpose()?,
    };

    Ok(CanonicalSettlementPayload {
        schema_version,
        order_id: required("orderId", &input.order_id)?,
        payment_snapshot_hash: Sha256Hex::parse(&input.payment_snapshot_hash, "paymentSnapshotHash")?,
        export_manifest_hash: Sha256Hex::parse(&input.export_manifest_hash, "exportManifestHash")?,
        currency,
        amounts: input.amounts.to_minor_units()?,
        incoterm,
        carrier_id: required("carrierId", &input.carrier_id)?,
        shipment_id: required("shipmentId", &input.shipment_id)?,
        tracking_numbers: tracking_numbers(&input.tracking_numbers)?,
        lane: Lane {
            origin_country: required("lane.originCountry", &input.lane.origin_country)?,
            origin_port: optional(input.lane.origin_port.as_deref()),
            destination_country: required("lane.destinationCountry", &input.lane.destination_country)?,
            destination_port: optional(input.lane.destination_port.as_deref()),
        },
        compliance,
        settlement_status,
        finalized_at: Timestamp::parse(input.finalized_at.trim(), "finalizedAt")?,
    })
}

/// Normalize and render a payload as canonical JSON.
///
/// Two inputs that differ only in key order or tracking-number order
/// produce byte-identical output, and `canonicalize(parse(c)) == c`.
///
/// # Errors
///
/// See [`normalize`].
pub fn canonicalize(input: &SettlementPayloadInput) -> Result<CanonicalJson, IntegrityError> {
    Ok(normalize(input)?.to_canonical_json()?)
}

fn pinned(
    field: &'static str,
    expected: &'static str,
    actual: &str,
) -> Result<&'static str, CanonicalizationError> {
    if actual.trim() == expected {
        Ok(expected)
    } else {
        Err(CanonicalizationError::UnsupportedLiteral {
            field,
            expected,
            actual: actual.to_string(),
        })
    }
}

fn required(field: &str, value: &str) -> Result<String, CanonicalizationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(CanonicalizationError::EmptyField(field.to_string()))
    } else {
        Ok(trimmed.to_string())
    }
}

fn optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn tracking_numbers(raw: &[String]) -> Result<Vec<String>, CanonicalizationError> {
    let mut set = BTreeSet::new();
    for (i, value) in raw.iter().enumerate() {
        set.insert(required(&format!("trackingNumbers[{i}]"), value)?);
    }
    Ok(set.into_iter().collect())
}
