//! # Export Manifest Store
//!
//! One [`ExportManifestRecord`] per order. `paymentSnapshotHash` and
//! `exportManifestHash` are write-once; the descriptive fields
//! (`manifestPath`, `generatedAt`, `signingKeyId`, `signaturePresent`) may
//! change on resync.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use settle_core::{ensure_write_once, Clock, FieldPatch, IntegrityError, Sha256Hex, Timestamp};

use crate::collection::{Document, DocumentCollection, Filter, IndexSpec};
use crate::error::StoreError;
use crate::gate::IndexGate;

const PAYMENT_SNAPSHOT_HASH: &str = "paymentSnapshotHash";
const EXPORT_MANIFEST_HASH: &str = "exportManifestHash";

/// Indexes of the `export_manifests` collection.
pub const MANIFEST_INDEXES: &[IndexSpec] = &[
    IndexSpec::lookup("export_manifests_order_id", &["orderId"]),
    IndexSpec::unique(
        "export_manifests_order_manifest_hash",
        &["orderId", EXPORT_MANIFEST_HASH],
    ),
];

/// Stored export manifest evidence for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportManifestRecord {
    pub order_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_snapshot_hash: Option<Sha256Hex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_manifest_hash: Option<Sha256Hex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_key_id: Option<String>,
    #[serde(default)]
    pub signature_present: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Document for ExportManifestRecord {
    const COLLECTION: &'static str = "export_manifests";

    fn key(&self) -> String {
        self.order_id.clone()
    }
}

/// A create or upsert request for an export manifest.
///
/// Absent keys leave the stored value alone; `null` or `""` clears it
/// (which a sealed hash refuses).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExportManifestInput {
    pub order_id: String,
    #[serde(default)]
    pub payment_snapshot_hash: FieldPatch<String>,
    #[serde(default)]
    pub export_manifest_hash: FieldPatch<String>,
    #[serde(default)]
    pub manifest_path: FieldPatch<String>,
    #[serde(default)]
    pub generated_at: FieldPatch<String>,
    #[serde(default)]
    pub signing_key_id: FieldPatch<String>,
    #[serde(default)]
    pub signature_present: Option<bool>,
}

/// Input after format validation, before it meets stored state.
struct ValidatedManifest {
    order_id: String,
    payment_snapshot_hash: FieldPatch<Sha256Hex>,
    export_manifest_hash: FieldPatch<Sha256Hex>,
    manifest_path: FieldPatch<String>,
    generated_at: FieldPatch<Timestamp>,
    signing_key_id: FieldPatch<String>,
    signature_present: Option<bool>,
}

impl ValidatedManifest {
    fn from_input(input: ExportManifestInput) -> Result<Self, IntegrityError> {
        let order_id = input.order_id.trim().to_string();
        if order_id.is_empty() {
            return Err(IntegrityError::MissingField("orderId".to_string()));
        }
        Ok(Self {
            order_id,
            payment_snapshot_hash: input.payment_snapshot_hash.into_hash(PAYMENT_SNAPSHOT_HASH)?,
            export_manifest_hash: input.export_manifest_hash.into_hash(EXPORT_MANIFEST_HASH)?,
            manifest_path: input.manifest_path.normalized_text(),
            generated_at: input
                .generated_at
                .normalized_text()
                .try_map(|t| Timestamp::parse(&t, "generatedAt"))?,
            signing_key_id: input.signing_key_id.normalized_text(),
            signature_present: input.signature_present,
        })
    }

    /// Merge into `existing` (or a fresh record), applying write-once rules.
    fn merge(
        self,
        existing: Option<&ExportManifestRecord>,
        now: Timestamp,
    ) -> Result<ExportManifestRecord, IntegrityError> {
        let Some(existing) = existing else {
            return Ok(ExportManifestRecord {
                order_id: self.order_id,
                payment_snapshot_hash: self.payment_snapshot_hash.apply(None),
                export_manifest_hash: self.export_manifest_hash.apply(None),
                manifest_path: self.manifest_path.apply(None),
                generated_at: self.generated_at.apply(None),
                signing_key_id: self.signing_key_id.apply(None),
                signature_present: self.signature_present.unwrap_or(false),
                created_at: now,
                updated_at: now,
            });
        };

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

        let mut next = existing.clone();
        next.payment_snapshot_hash = self
            .payment_snapshot_hash
            .apply(existing.payment_snapshot_hash.clone());
        next.export_manifest_hash = self
            .export_manifest_hash
            .apply(existing.export_manifest_hash.clone());
        next.manifest_path = self.manifest_path.apply(existing.manifest_path.clone());
        next.generated_at = self.generated_at.apply(existing.generated_at);
        next.signing_key_id = self.signing_key_id.apply(existing.signing_key_id.clone());
        if let Some(present) = self.signature_present {
            next.signature_present = present;
        }
        next.updated_at = now;
        Ok(next)
    }
}

/// Write-once guarded persistence of export manifest records.
pub struct ExportManifestStore {
    collection: Arc<dyn DocumentCollection<ExportManifestRecord>>,
    clock: Arc<dyn Clock>,
    gate: IndexGate,
}

impl std::fmt::Debug for ExportManifestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportManifestStore")
            .field("indexes_ready", &self.gate.is_ready())
            .finish_non_exhaustive()
    }
}

impl ExportManifestStore {
    pub fn new(
        collection: Arc<dyn DocumentCollection<ExportManifestRecord>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            collection,
            clock,
            gate: IndexGate::new(),
        }
    }

    /// Create this store's indexes if that has not happened yet.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        self.gate.ensure(self.collection.as_ref(), MANIFEST_INDEXES).await
    }

    /// Insert a new manifest record.
    ///
    /// # Errors
    ///
    /// [`StoreError::Integrity`] for a blank order id or malformed hash or
    /// timestamp; [`StoreError::DuplicateKey`] if the order already has one.
    #[tracing::instrument(skip_all, fields(order_id = %input.order_id))]
    pub async fn create(&self, input: ExportManifestInput) -> Result<ExportManifestRecord, StoreError> {
        let validated = ValidatedManifest::from_input(input)?;
        self.ensure_indexes().await?;
        let record = validated.merge(None, self.clock.now())?;
        self.collection.insert_one(&record).await?;
        tracing::info!("export manifest created");
        Ok(record)
    }

    /// Create or update the manifest record for an order.
    ///
    /// Only supplied fields change. The write-once check and the write run as
    /// one atomic step against the collection.
    #[tracing::instrument(skip_all, fields(order_id = %input.order_id))]
    pub async fn upsert(&self, input: ExportManifestInput) -> Result<ExportManifestRecord, StoreError> {
        let validated = ValidatedManifest::from_input(input)?;
        self.ensure_indexes().await?;
        let key = validated.order_id.clone();
        let now = self.clock.now();
        let record = self
            .collection
            .find_one_and_update(
                &key,
                Box::new(move |existing: Option<&ExportManifestRecord>| {
                    validated.merge(existing, now).map_err(StoreError::from)
                }),
            )
            .await
            .map_err(|e| {
                if let StoreError::Integrity(ref inner) = e {
                    tracing::warn!(field = inner.field().unwrap_or_default(), error = %inner, "manifest write rejected");
                }
                e
            })?;
        tracing::info!("export manifest upserted");
        Ok(record)
    }

    /// The newest manifest for an order by (`generatedAt`, `updatedAt`).
    pub async fn get_latest_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Option<ExportManifestRecord>, StoreError> {
        self.ensure_indexes().await?;
        let records = self
            .collection
            .find(&Filter::eq("orderId", order_id.trim()))
            .await?;
        Ok(records
            .into_iter()
            .max_by_key(|r| (r.generated_at, r.updated_at)))
    }
}
