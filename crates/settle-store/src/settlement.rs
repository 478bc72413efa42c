//! # Freight Settlement Store
//!
//! One [`FreightSettlementRecord`] per (order, settlement version). A record
//! starts as DRAFT with no hashes and is sealed by moving to FINAL together
//! with its canonical payload. After that, the three hashes and the payload
//! are write-once; VOID keeps them as they were.
//!
//! [`FreightSettlementStore::finalize`] is the usual sealing path: it
//! canonicalizes a payload, derives `freightSettlementHash` from it and
//! takes the payment and manifest hashes from the payload itself.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use settle_core::{
    canonicalize, ensure_canonical_payload, ensure_write_once, Clock, FieldPatch, IntegrityError,
    SettlementPayloadInput, SettlementStatus, Sha256Hex, Timestamp,
};

use crate::collection::{Document, DocumentCollection, Filter, IndexSpec};
use crate::error::StoreError;
use crate::gate::IndexGate;

const PAYMENT_SNAPSHOT_HASH: &str = "paymentSnapshotHash";
const EXPORT_MANIFEST_HASH: &str = "exportManifestHash";
const FREIGHT_SETTLEMENT_HASH: &str = "freightSettlementHash";

/// Indexes of the `freight_settlements` collection.
pub const SETTLEMENT_INDEXES: &[IndexSpec] = &[
    IndexSpec::lookup("freight_settlements_order_id", &["orderId"]),
    IndexSpec::unique(
        "freight_settlements_order_version_hash",
        &["orderId", "settlementVersion", FREIGHT_SETTLEMENT_HASH],
    ),
];

/// A pointer to a supporting document (invoice, carrier receipt, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRef {
    #[serde(rename = "type")]
    pub ref_type: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<Sha256Hex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// An evidence reference as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvidenceRefInput {
    #[serde(rename = "type")]
    pub ref_type: String,
    pub id: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

impl EvidenceRefInput {
    fn validate(self, index: usize) -> Result<EvidenceRef, IntegrityError> {
        let required = |value: &str, name: &str| {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                Err(IntegrityError::MissingField(format!("evidenceRefs[{index}].{name}")))
            } else {
                Ok(trimmed.to_string())
            }
        };
        let optional = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Ok(EvidenceRef {
            ref_type: required(&self.ref_type, "type")?,
            id: required(&self.id, "id")?,
            hash: optional(self.hash)
                .map(|h| Sha256Hex::parse(&h, &format!("evidenceRefs[{index}].hash")))
                .transpose()?,
            path: optional(self.path),
        })
    }
}

/// Stored freight settlement evidence for one order and version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreightSettlementRecord {
    pub order_id: String,
    pub settlement_version: u32,
    pub status: SettlementStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_snapshot_hash: Option<Sha256Hex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_manifest_hash: Option<Sha256Hex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freight_settlement_hash: Option<Sha256Hex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement_payload_canonical_json: Option<String>,
    #[serde(default)]
    pub evidence_refs: Vec<EvidenceRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalized_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl FreightSettlementRecord {
    /// Collection key for an order and version.
    pub fn key_for(order_id: &str, version: u32) -> String {
        format!("{order_id}#v{version}")
    }
}

impl Document for FreightSettlementRecord {
    const COLLECTION: &'static str = "freight_settlements";

    fn key(&self) -> String {
        Self::key_for(&self.order_id, self.settlement_version)
    }
}

fn default_version() -> u32 {
    1
}

/// A create or upsert request for a freight settlement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FreightSettlementInput {
    pub order_id: String,
    #[serde(default = "default_version")]
    pub settlement_version: u32,
    /// Absent keeps the stored status (DRAFT for a new record).
    #[serde(default)]
    pub status: Option<SettlementStatus>,
    #[serde(default)]
    pub payment_snapshot_hash: FieldPatch<String>,
    #[serde(default)]
    pub export_manifest_hash: FieldPatch<String>,
    #[serde(default)]
    pub freight_settlement_hash: FieldPatch<String>,
    #[serde(default)]
    pub settlement_payload_canonical_json: FieldPatch<String>,
    /// Replaces the stored list when present.
    #[serde(default)]
    pub evidence_refs: Option<Vec<EvidenceRefInput>>,
}

impl FreightSettlementInput {
    pub fn new(order_id: impl Into<String>, settlement_version: u32) -> Self {
        Self {
            order_id: order_id.into(),
            settlement_version,
            status: None,
            payment_snapshot_hash: FieldPatch::Unchanged,
            export_manifest_hash: FieldPatch::Unchanged,
            freight_settlement_hash: FieldPatch::Unchanged,
            settlement_payload_canonical_json: FieldPatch::Unchanged,
            evidence_refs: None,
        }
    }
}

struct ValidatedSettlement {
    order_id: String,
    settlement_version: u32,
    status: Option<SettlementStatus>,
    payment_snapshot_hash: FieldPatch<Sha256Hex>,
    export_manifest_hash: FieldPatch<Sha256Hex>,
    freight_settlement_hash: FieldPatch<Sha256Hex>,
    payload: FieldPatch<String>,
    evidence_refs: Option<Vec<EvidenceRef>>,
}

impl ValidatedSettlement {
    fn from_input(input: FreightSettlementInput) -> Result<Self, IntegrityError> {
        let order_id = input.order_id.trim().to_string();
        if order_id.is_empty() {
            return Err(IntegrityError::MissingField("orderId".to_string()));
        }
        if input.settlement_version == 0 {
            return Err(IntegrityError::MissingField("settlementVersion".to_string()));
        }
        // The payload is stored byte-exact: no trimming, only "" means clear.
        let payload = match input.settlement_payload_canonical_json {
            FieldPatch::Set(p) if p.is_empty() => FieldPatch::Clear,
            other => other,
        };
        let evidence_refs = input
            .evidence_refs
            .map(|refs| {
                refs.into_iter()
                    .enumerate()
                    .map(|(i, r)| r.validate(i))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;
        Ok(Self {
            order_id,
            settlement_version: input.settlement_version,
            status: input.status,
            payment_snapshot_hash: input.payment_snapshot_hash.into_hash(PAYMENT_SNAPSHOT_HASH)?,
            export_manifest_hash: input.export_manifest_hash.into_hash(EXPORT_MANIFEST_HASH)?,
            freight_settlement_hash: input
                .freight_settlement_hash
                .into_hash(FREIGHT_SETTLEMENT_HASH)?,
            payload,
            evidence_refs,
        })
    }

    fn key(&self) -> String {
        FreightSettlementRecord::key_for(&self.order_id, self.settlement_version)
    }

    fn merge(
        self,
        existing: Option<&FreightSettlementRecord>,
        now: Timestamp,
    ) -> Result<FreightSettlementRecord, IntegrityError> {
        let prior_status = existing.map(|r| r.status);
        let next_status = self
            .status
            .or(prior_status)
            .unwrap_or(SettlementStatus::Draft);
        if let Some(from) = prior_status {
            from.ensure_transition(next_status)?;
        }

        if let Some(existing) = existing {
            ensure_write_once(
                PAYMENT_SNAPSHOT_HASH,
                existing.payment_snapshot_hash.as_ref(),
                &self.payment_snapshot_hash,
            )?;
            ensure_write_once(
                EXPORT_MANIFEST_HASH,
                existing.export_manifest_hash.as_ref(),
                &self.export_manifest_hash,
            )?;
            ensure_write_once(
                FREIGHT_SETTLEMENT_HASH,
                existing.freight_settlement_hash.as_ref(),
                &self.freight_settlement_hash,
            )?;
        }
        ensure_canonical_payload(
            existing.and_then(|r| r.settlement_payload_canonical_json.as_deref()),
            prior_status,
            &self.payload,
            next_status,
        )?;

        let finalized_at = existing.and_then(|r| r.finalized_at).or(
            (next_status == SettlementStatus::Final).then_some(now),
        );

        Ok(FreightSettlementRecord {
            order_id: self.order_id,
            settlement_version: self.settlement_version,
            status: next_status,
            payment_snapshot_hash: self
                .payment_snapshot_hash
                .apply(existing.and_then(|r| r.payment_snapshot_hash.clone())),
            export_manifest_hash: self
                .export_manifest_hash
                .apply(existing.and_then(|r| r.export_manifest_hash.clone())),
            freight_settlement_hash: self
                .freight_settlement_hash
                .apply(existing.and_then(|r| r.freight_settlement_hash.clone())),
            settlement_payload_canonical_json: self
                .payload
                .apply(existing.and_then(|r| r.settlement_payload_canonical_json.clone())),
            evidence_refs: self
                .evidence_refs
                .or_else(|| existing.map(|r| r.evidence_refs.clone()))
                .unwrap_or_default(),
            finalized_at,
            created_at: existing.map_or(now, |r| r.created_at),
            updated_at: now,
        })
    }
}

/// Write-once guarded persistence of freight settlement records.
pub struct FreightSettlementStore {
    collection: Arc<dyn DocumentCollection<FreightSettlementRecord>>,
    clock: Arc<dyn Clock>,
    gate: IndexGate,
}

impl std::fmt::Debug for FreightSettlementStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreightSettlementStore")
            .field("indexes_ready", &self.gate.is_ready())
            .finish_non_exhaustive()
    }
}

impl FreightSettlementStore {
    pub fn new(
        collection: Arc<dyn DocumentCollection<FreightSettlementRecord>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            collection,
            clock,
            gate: IndexGate::new(),
        }
    }

    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        self.gate
            .ensure(self.collection.as_ref(), SETTLEMENT_INDEXES)
            .await
    }

    /// Insert a new settlement record.
    ///
    /// The canonical-payload gate runs against an empty prior state, so a
    /// payload on a DRAFT create is rejected.
    #[tracing::instrument(skip_all, fields(order_id = %input.order_id, version = input.settlement_version))]
    pub async fn create(
        &self,
        input: FreightSettlementInput,
    ) -> Result<FreightSettlementRecord, StoreError> {
        let validated = ValidatedSettlement::from_input(input)?;
        self.ensure_indexes().await?;
        let record = validated.merge(None, self.clock.now())?;
        self.collection.insert_one(&record).await?;
        tracing::info!(status = %record.status, "freight settlement created");
        Ok(record)
    }

    /// Create or update a settlement record as one atomic step.
    #[tracing::instrument(skip_all, fields(order_id = %input.order_id, version = input.settlement_version))]
    pub async fn upsert(
        &self,
        input: FreightSettlementInput,
    ) -> Result<FreightSettlementRecord, StoreError> {
        let validated = ValidatedSettlement::from_input(input)?;
        self.ensure_indexes().await?;
        let key = validated.key();
        let now = self.clock.now();
        let record = self
            .collection
            .find_one_and_update(
                &key,
                Box::new(move |existing: Option<&FreightSettlementRecord>| {
                    validated.merge(existing, now).map_err(StoreError::from)
                }),
            )
            .await
            .map_err(|e| {
                if let StoreError::Integrity(ref inner) = e {
                    tracing::warn!(field = inner.field().unwrap_or_default(), error = %inner, "settlement write rejected");
                }
                e
            })?;
        tracing::info!(status = %record.status, "freight settlement upserted");
        Ok(record)
    }

    /// Seal a settlement version with a payload.
    ///
    /// Canonicalizes `payload`, stores the canonical text and its SHA-256 as
    /// `freightSettlementHash`, copies the payment and manifest hashes from
    /// the payload, and moves the record to FINAL. Re-finalizing with the
    /// same payload is a no-op; a different payload is a write-once violation.
    #[tracing::instrument(skip_all, fields(order_id = %payload.order_id, version = settlement_version))]
    pub async fn finalize(
        &self,
        settlement_version: u32,
        payload: &SettlementPayloadInput,
        evidence_refs: Option<Vec<EvidenceRefInput>>,
    ) -> Result<FreightSettlementRecord, StoreError> {
        let canonical = canonicalize(payload)?;
        let settlement_hash = canonical.sha256();
        let mut input = FreightSettlementInput::new(payload.order_id.trim(), settlement_version);
        input.status = Some(SettlementStatus::Final);
        input.payment_snapshot_hash = FieldPatch::Set(payload.payment_snapshot_hash.trim().to_string());
        input.export_manifest_hash = FieldPatch::Set(payload.export_manifest_hash.trim().to_string());
        input.freight_settlement_hash = FieldPatch::Set(settlement_hash.to_string());
        input.settlement_payload_canonical_json = FieldPatch::Set(canonical.into_string());
        input.evidence_refs = evidence_refs;
        self.upsert(input).await
    }

    /// The highest-version FINAL record for an order.
    pub async fn get_latest_final_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Option<FreightSettlementRecord>, StoreError> {
        self.latest(
            Filter::eq("orderId", order_id.trim()).and("status", SettlementStatus::Final.as_str()),
        )
        .await
    }

    /// The highest-version record for an order, whatever its status.
    pub async fn get_latest_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Option<FreightSettlementRecord>, StoreError> {
        self.latest(Filter::eq("orderId", order_id.trim())).await
    }

    async fn latest(&self, filter: Filter) -> Result<Option<FreightSettlementRecord>, StoreError> {
        self.ensure_indexes().await?;
        let records = self.collection.find(&filter).await?;
        Ok(records
            .into_iter()
            .max_by_key(|r| (r.settlement_version, r.updated_at)))
    }
}
