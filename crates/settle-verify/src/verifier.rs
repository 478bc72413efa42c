//! # Integrity Chain Verifier
//!
//! Re-reads the evidence for one order, recomputes every hash it can, and
//! returns PASS or the first failure of a fail-fast cascade:
//!
//! 1. **References** — order snapshot hash, latest manifest, latest FINAL
//!    settlement, fetched concurrently. Anything absent, malformed or
//!    unreadable → `MISSING_REFERENCE`.
//! 2. **Snapshot** — manifest and settlement both carry the order's payment
//!    snapshot hash → else `SNAPSHOT_MISMATCH`.
//! 3. **Manifest** — the manifest hash (recomputed from the file when it can
//!    be read, otherwise the stored value) matches the manifest record and
//!    the settlement's reference → else `MANIFEST_MISMATCH`.
//! 4. **Settlement** — the stored canonical payload hashes to the stored
//!    settlement hash → else `SETTLEMENT_MISMATCH` (no payload →
//!    `MISSING_REFERENCE`).
//! 5. **Chain root** — computed from the three confirmed hashes; a declared
//!    root must match it → else `CHAIN_ROOT_INVALID`.
//!
//! The verifier owns no state. Every dependency is injected.

use std::future::Future;
use std::sync::Arc;

use settle_core::{hash_bytes, ChainHashes, Clock, Sha256Hex};
use settle_store::{Document, EvidenceStores, ExportManifestRecord, FreightSettlementRecord, StoreError};

use crate::error::VerifyError;
use crate::result::{
    Check, EvidenceTrail, FailureClass, IntegrityVerificationResult, ManifestHashSource,
    VerificationStatus,
};
use crate::sources::{ManifestByteReader, ManifestLookup, PaymentSnapshotSource, SettlementLookup};

/// A record read from a store: present, absent, or present but undecodable.
enum Fetched<T> {
    Found(T),
    Absent,
    Corrupt(String),
}

async fn fetch<T>(
    what: &'static str,
    lookup: impl Future<Output = Result<Option<T>, StoreError>>,
) -> Result<Fetched<T>, VerifyError> {
    match lookup.await {
        Ok(Some(record)) => Ok(Fetched::Found(record)),
        Ok(None) => Ok(Fetched::Absent),
        Err(StoreError::Corrupt { reason, .. }) => Ok(Fetched::Corrupt(reason)),
        Err(error) => Err(VerifyError::Store { what, error }),
    }
}

/// The hashes every FINAL chain must carry, borrowed from the two records.
struct Required<'a> {
    manifest_snapshot: &'a Sha256Hex,
    manifest_hash: &'a Sha256Hex,
    settlement_snapshot: &'a Sha256Hex,
    settlement_manifest_ref: &'a Sha256Hex,
    settlement_hash: &'a Sha256Hex,
}

impl<'a> Required<'a> {
    /// Err names the first absent hash.
    fn from_records(
        manifest: &'a ExportManifestRecord,
        settlement: &'a FreightSettlementRecord,
    ) -> Result<Self, &'static str> {
        fn present<'h>(hash: &'h Option<Sha256Hex>, name: &'static str) -> Result<&'h Sha256Hex, &'static str> {
            hash.as_ref().ok_or(name)
        }
        Ok(Self {
            manifest_snapshot: present(&manifest.payment_snapshot_hash, "export manifest paymentSnapshotHash")?,
            manifest_hash: present(&manifest.export_manifest_hash, "export manifest exportManifestHash")?,
            settlement_snapshot: present(&settlement.payment_snapshot_hash, "settlement paymentSnapshotHash")?,
            settlement_manifest_ref: present(&settlement.export_manifest_hash, "settlement exportManifestHash")?,
            settlement_hash: present(&settlement.freight_settlement_hash, "settlement freightSettlementHash")?,
        })
    }
}

/// Verifies the settlement integrity chain of individual orders.
#[derive(Clone)]
pub struct IntegrityChainVerifier {
    payments: Arc<dyn PaymentSnapshotSource>,
    manifests: Arc<dyn ManifestLookup>,
    settlements: Arc<dyn SettlementLookup>,
    manifest_bytes: Arc<dyn ManifestByteReader>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for IntegrityChainVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrityChainVerifier")
            .field("payments", &self.payments.name())
            .finish_non_exhaustive()
    }
}

/// Accumulates the result while the cascade runs.
struct Run {
    result: IntegrityVerificationResult,
}

impl Run {
    fn fail(mut self, class: FailureClass, detail: String) -> IntegrityVerificationResult {
        tracing::info!(
            order_id = %self.result.order_id,
            failure_class = class.as_str(),
            detail = %detail,
            "integrity verification failed"
        );
        self.result.status = VerificationStatus::Fail;
        self.result.failure_class = Some(class);
        self.result.detail = Some(detail);
        self.result
    }

    fn passed(&mut self, check: Check) {
        self.result.evidence.checks_passed.push(check);
    }
}

impl IntegrityChainVerifier {
    pub fn new(
        payments: Arc<dyn PaymentSnapshotSource>,
        manifests: Arc<dyn ManifestLookup>,
        settlements: Arc<dyn SettlementLookup>,
        manifest_bytes: Arc<dyn ManifestByteReader>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            payments,
            manifests,
            settlements,
            manifest_bytes,
            clock,
        }
    }

    /// A verifier reading manifests and settlements from `stores`.
    pub fn over_stores(
        payments: Arc<dyn PaymentSnapshotSource>,
        stores: &EvidenceStores,
        manifest_bytes: Arc<dyn ManifestByteReader>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::new(
            payments,
            stores.manifests.clone(),
            stores.settlements.clone(),
            manifest_bytes,
            clock,
        )
    }

    /// Verify one order's chain, optionally against a declared root.
    ///
    /// # Errors
    ///
    /// Only for a blank `order_id`, a declared root that is not a valid
    /// hash, or a source that cannot be read. Every evidence problem is a
    /// FAIL result instead.
    #[tracing::instrument(skip(self, order_id), fields(order_id = %order_id.trim()))]
    pub async fn verify(
        &self,
        order_id: &str,
        declared_root: Option<&str>,
    ) -> Result<IntegrityVerificationResult, VerifyError> {
        let order_id = order_id.trim();
        if order_id.is_empty() {
            return Err(VerifyError::MissingOrderId);
        }
        let declared = declared_root
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|r| Sha256Hex::parse(r, "declaredChainRootSha256"))
            .transpose()
            .map_err(VerifyError::InvalidDeclaredRoot)?;

        let mut run = Run {
            result: IntegrityVerificationResult {
                order_id: order_id.to_string(),
                status: VerificationStatus::Pass,
                failure_class: None,
                payment_snapshot_sha256: None,
                export_manifest_sha256: None,
                freight_settlement_sha256: None,
                chain_root_sha256: None,
                declared_chain_root_sha256: declared.as_ref().map(|d| d.to_string()),
                evidence: EvidenceTrail {
                    payment_snapshot_source: self.payments.name().to_string(),
                    ..EvidenceTrail::default()
                },
                verified_at: self.clock.now(),
                detail: None,
            },
        };

        // -- 1. References --------------------------------------------------
        let payments = async {
            self.payments
                .payment_snapshot_hash(order_id)
                .await
                .map_err(|error| VerifyError::Source {
                    what: "payment snapshot source",
                    error,
                })
        };
        let (snapshot, manifest, settlement) = tokio::try_join!(
            payments,
            fetch("export manifest store", self.manifests.latest_manifest(order_id)),
            fetch(
                "freight settlement store",
                self.settlements.latest_final_settlement(order_id)
            ),
        )?;

        run.result.payment_snapshot_sha256 = snapshot.clone();
        let Some(raw_snapshot) = snapshot else {
            return Ok(run.fail(
                FailureClass::MissingReference,
                "order has no payment snapshot hash".into(),
            ));
        };
        let Ok(order_snapshot) = Sha256Hex::parse(&raw_snapshot, "paymentSnapshotHash") else {
            return Ok(run.fail(
                FailureClass::MissingReference,
                "order payment snapshot hash is not a 64-character lowercase hex digest".into(),
            ));
        };

        let manifest: ExportManifestRecord = match manifest {
            Fetched::Found(m) => m,
            Fetched::Absent => {
                return Ok(run.fail(
                    FailureClass::MissingReference,
                    "no export manifest record for order".into(),
                ))
            }
            Fetched::Corrupt(reason) => {
                return Ok(run.fail(
                    FailureClass::MissingReference,
                    format!("export manifest record is unreadable: {reason}"),
                ))
            }
        };
        run.result.evidence.manifest_record_key = Some(manifest.key());
        run.result.evidence.manifest_path = manifest.manifest_path.clone();

        let settlement: FreightSettlementRecord = match settlement {
            Fetched::Found(s) => s,
            Fetched::Absent => {
                return Ok(run.fail(
                    FailureClass::MissingReference,
                    "no FINAL freight settlement record for order".into(),
                ))
            }
            Fetched::Corrupt(reason) => {
                return Ok(run.fail(
                    FailureClass::MissingReference,
                    format!("freight settlement record is unreadable: {reason}"),
                ))
            }
        };
        run.result.evidence.settlement_record_key = Some(settlement.key());
        run.result.evidence.settlement_version = Some(settlement.settlement_version);

        let Required {
            manifest_snapshot,
            manifest_hash,
            settlement_snapshot,
            settlement_manifest_ref,
            settlement_hash,
        } = match Required::from_records(&manifest, &settlement) {
            Ok(required) => required,
            Err(name) => {
                return Ok(run.fail(FailureClass::MissingReference, format!("{name} is absent")))
            }
        };
        run.result.export_manifest_sha256 = Some(manifest_hash.to_string());
        run.result.freight_settlement_sha256 = Some(settlement_hash.to_string());
        run.passed(Check::ReferencesPresent);

        // -- 2. Snapshot consistency ------------------------------------------
        if manifest_snapshot != &order_snapshot {
            return Ok(run.fail(
                FailureClass::SnapshotMismatch,
                format!(
                    "export manifest paymentSnapshotHash {manifest_snapshot} does not match order snapshot {order_snapshot}"
                ),
            ));
        }
        if settlement_snapshot != &order_snapshot {
            return Ok(run.fail(
                FailureClass::SnapshotMismatch,
                format!(
                    "settlement paymentSnapshotHash {settlement_snapshot} does not match order snapshot {order_snapshot}"
                ),
            ));
        }
        run.passed(Check::SnapshotConsistent);

        // -- 3. Manifest consistency ------------------------------------------
        let file_bytes = match manifest.manifest_path.as_deref() {
            Some(path) => self
                .manifest_bytes
                .read_all_bytes(path)
                .await
                .map_err(|error| VerifyError::Source {
                    what: "manifest file store",
                    error,
                })?,
            None => None,
        };
        let effective_manifest = match file_bytes {
            Some(bytes) => {
                let recomputed = hash_bytes(&bytes);
                run.result.evidence.manifest_hash_source = Some(ManifestHashSource::RecomputedFromFile);
                run.result.evidence.recomputed_manifest_sha256 = Some(recomputed.to_string());
                recomputed
            }
            None => {
                run.result.evidence.manifest_hash_source = Some(ManifestHashSource::StoredValue);
                manifest_hash.clone()
            }
        };
        tracing::debug!(
            manifest_hash_source = run
                .result
                .evidence
                .manifest_hash_source
                .map(|s| s.as_str())
                .unwrap_or_default(),
            "manifest hash resolved"
        );
        if &effective_manifest != manifest_hash {
            return Ok(run.fail(
                FailureClass::ManifestMismatch,
                format!(
                    "manifest file hashes to {effective_manifest} but the manifest record stores {manifest_hash}"
                ),
            ));
        }
        if &effective_manifest != settlement_manifest_ref {
            return Ok(run.fail(
                FailureClass::ManifestMismatch,
                format!(
                    "settlement references manifest {settlement_manifest_ref} but the manifest hash is {effective_manifest}"
                ),
            ));
        }
        run.passed(Check::ManifestConsistent);

        // -- 4. Settlement consistency ----------------------------------------
        let Some(payload) = settlement
            .settlement_payload_canonical_json
            .as_deref()
            .filter(|p| !p.is_empty())
        else {
            return Ok(run.fail(
                FailureClass::MissingReference,
                "FINAL settlement has no canonical payload".into(),
            ));
        };
        let recomputed_settlement = hash_bytes(payload.as_bytes());
        run.result.evidence.recomputed_settlement_sha256 = Some(recomputed_settlement.to_string());
        if &recomputed_settlement != settlement_hash {
            return Ok(run.fail(
                FailureClass::SettlementMismatch,
                format!(
                    "canonical payload hashes to {recomputed_settlement} but the settlement stores {settlement_hash}"
                ),
            ));
        }
        run.passed(Check::SettlementConsistent);

        // -- 5. Chain root ----------------------------------------------------
        let root = ChainHashes {
            payment_snapshot: order_snapshot,
            export_manifest: effective_manifest,
            freight_settlement: recomputed_settlement,
        }
        .root();
        run.result.chain_root_sha256 = Some(root.to_string());
        run.passed(Check::ChainRootComputed);

        if let Some(declared) = declared {
            if declared != root {
                return Ok(run.fail(
                    FailureClass::ChainRootInvalid,
                    format!("declared chain root {declared} does not match computed root {root}"),
                ));
            }
            run.passed(Check::DeclaredRootMatches);
        }

        tracing::info!(chain_root = %root, "integrity verification passed");
        Ok(run.result)
    }
}
