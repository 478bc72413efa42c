//! # Verification Result
//!
//! [`IntegrityVerificationResult`] is what an auditor sees: the verdict,
//! the single failure class, every hash examined and an [`EvidenceTrail`]
//! that says where each hash came from. It is computed on demand and never
//! stored.

use serde::{Deserialize, Serialize};
use settle_core::Timestamp;

/// PASS or FAIL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    Pass,
    Fail,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why verification failed. Surfaced verbatim to auditors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureClass {
    /// The manifest or settlement disagrees with the order's payment snapshot.
    SnapshotMismatch,
    /// The manifest hash (recomputed or stored) disagrees with a record.
    ManifestMismatch,
    /// The canonical payload does not hash to the stored settlement hash.
    SettlementMismatch,
    /// The declared chain root differs from the computed one.
    ChainRootInvalid,
    /// A record, hash or payload needed for verification is absent or unreadable.
    MissingReference,
}

impl FailureClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SnapshotMismatch => "SNAPSHOT_MISMATCH",
            Self::ManifestMismatch => "MANIFEST_MISMATCH",
            Self::SettlementMismatch => "SETTLEMENT_MISMATCH",
            Self::ChainRootInvalid => "CHAIN_ROOT_INVALID",
            Self::MissingReference => "MISSING_REFERENCE",
        }
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the manifest hash used for comparison came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManifestHashSource {
    /// SHA-256 of the manifest file bytes, computed during this run.
    RecomputedFromFile,
    /// The file was unavailable; the stored record hash was trusted.
    StoredValue,
}

impl ManifestHashSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RecomputedFromFile => "RECOMPUTED_FROM_FILE",
            Self::StoredValue => "STORED_VALUE",
        }
    }
}

/// One stage of the cascade that completed successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Check {
    ReferencesPresent,
    SnapshotConsistent,
    ManifestConsistent,
    SettlementConsistent,
    ChainRootComputed,
    DeclaredRootMatches,
}

/// What was read and how each hash was justified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceTrail {
    /// Name of the payment snapshot source that was queried.
    pub payment_snapshot_source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_record_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_record_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_hash_source: Option<ManifestHashSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recomputed_manifest_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recomputed_settlement_sha256: Option<String>,
    /// Stages passed, in order.
    pub checks_passed: Vec<Check>,
}

/// Outcome of verifying one order's integrity chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityVerificationResult {
    pub order_id: String,
    pub status: VerificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_class: Option<FailureClass>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_snapshot_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_manifest_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freight_settlement_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_root_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_chain_root_sha256: Option<String>,
    pub evidence: EvidenceTrail,
    pub verified_at: Timestamp,
    /// Human-readable reason for a FAIL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl IntegrityVerificationResult {
    pub fn is_pass(&self) -> bool {
        self.status == VerificationStatus::Pass
    }
}
