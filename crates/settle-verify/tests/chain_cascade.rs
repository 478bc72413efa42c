//! End-to-end verification of one order's chain.
//!
//! The fixture seals ORD-900 the way production does: the manifest file is
//! written under a manifest root, its record is upserted, and the
//! settlement is finalized from a payload. Each scenario then tampers with
//! exactly one piece of evidence and checks the failure class.

use std::sync::Arc;

use serde_json::json;
use settle_core::{
    hash_bytes, ChainHashes, FieldPatch, ManualClock, SettlementPayloadInput, SettlementStatus,
    Sha256Hex, Timestamp,
};
use settle_store::{
    EvidenceStores, ExportManifestInput, ExportManifestRecord, FreightSettlementRecord,
    MemoryCollection, StoreError,
};
use settle_verify::{
    Check, FailureClass, FsManifestReader, IntegrityChainVerifier, ManifestHashSource,
    MemorySnapshotSource, SettlementLookup, VerificationStatus, VerifyError,
};

const ORDER: &str = "ORD-900";
const A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const D: &str = "dddddddddddddddddddddddddddddddddddddddddddddddddddddddddddddddd";
const MANIFEST_PATH: &str = "ORD-900/manifest.pdf";
const MANIFEST_BYTES: &[u8] = b"%PDF-1.7 export manifest ORD-900";

struct Fixture {
    dir: tempfile::TempDir,
    stores: EvidenceStores,
    manifests: MemoryCollection<ExportManifestRecord>,
    settlements: MemoryCollection<FreightSettlementRecord>,
    snapshots: MemorySnapshotSource,
    verifier: IntegrityChainVerifier,
    manifest_hash: Sha256Hex,
    settlement_hash: Sha256Hex,
}

impl Fixture {
    async fn sealed() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("ORD-900")).unwrap();
        std::fs::write(dir.path().join(MANIFEST_PATH), MANIFEST_BYTES).unwrap();
        let manifest_hash = hash_bytes(MANIFEST_BYTES);

        let clock = Arc::new(ManualClock::new(
            Timestamp::parse("2026-01-15T12:00:00Z", "now").unwrap(),
        ));
        let manifests = MemoryCollection::new();
        let settlements = MemoryCollection::new();
        let stores =
            EvidenceStores::with_collections(manifests.clone(), settlements.clone(), clock.clone());

        stores
            .manifests
            .upsert(ExportManifestInput {
                order_id: ORDER.into(),
                payment_snapshot_hash: FieldPatch::Set(A.into()),
                export_manifest_hash: FieldPatch::Set(manifest_hash.to_string()),
                manifest_path: FieldPatch::Set(MANIFEST_PATH.into()),
                generated_at: FieldPatch::Set("2026-01-15T11:00:00Z".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        clock.advance(1_000);
        let settled = stores
            .settlements
            .finalize(1, &payload(&manifest_hash), None)
            .await
            .unwrap();
        let settlement_hash = settled.freight_settlement_hash.clone().unwrap();

        let snapshots = MemorySnapshotSource::new();
        snapshots.insert(ORDER, A);

        let verifier = IntegrityChainVerifier::over_stores(
            Arc::new(snapshots.clone()),
            &stores,
            Arc::new(FsManifestReader::new(dir.path())),
            clock,
        );

        Self {
            dir,
            stores,
            manifests,
            settlements,
            snapshots,
            verifier,
            manifest_hash,
            settlement_hash,
        }
    }

    fn expected_root(&self) -> Sha256Hex {
        ChainHashes {
            payment_snapshot: Sha256Hex::parse(A, "a").unwrap(),
            export_manifest: self.manifest_hash.clone(),
            freight_settlement: self.settlement_hash.clone(),
        }
        .root()
    }

    async fn tamper_manifest(&self, edit: impl FnOnce(&mut ExportManifestRecord)) {
        let mut record = self
            .stores
            .manifests
            .get_latest_by_order_id(ORDER)
            .await
            .unwrap()
            .unwrap();
        edit(&mut record);
        self.manifests.seed(record);
    }

    async fn tamper_settlement(&self, edit: impl FnOnce(&mut FreightSettlementRecord)) {
        let mut record = self
            .stores
            .settlements
            .get_latest_by_order_id(ORDER)
            .await
            .unwrap()
            .unwrap();
        edit(&mut record);
        self.settlements.seed(record);
    }
}

fn payload(manifest_hash: &Sha256Hex) -> SettlementPayloadInput {
    serde_json::from_value(json!({
        "schemaVersion": "freight-settlement/v1",
        "orderId": ORDER,
        "paymentSnapshotHash": A,
        "exportManifestHash": manifest_hash.as_str(),
        "currency": "INR",
        "amounts": {
            "subtotal": 100000, "shipping": 12000, "insurance": 1500,
            "duty": 8000, "gst": 18000, "total": 139500
        },
        "incoterm": "DDP",
        "carrierId": "DHL",
        "shipmentId": "SHP-900",
        "trackingNumbers": ["TN-9", "TN-1"],
        "lane": {"originCountry": "IN", "originPort": "INMAA", "destinationCountry": "NL"},
        "compliance": {"certificateIssued": true, "certificateId": "CERT-900"},
        "settlementStatus": "FINAL",
        "finalizedAt": "2026-01-15T12:00:00Z"
    }))
    .unwrap()
}

#[tokio::test]
async fn sealed_chain_passes_with_expected_root() {
    let fx = Fixture::sealed().await;
    let root = fx.expected_root();

    let result = fx.verifier.verify(ORDER, Some(root.as_str())).await.unwrap();

    assert_eq!(result.status, VerificationStatus::Pass);
    assert!(result.is_pass());
    assert_eq!(result.failure_class, None);
    assert_eq!(result.chain_root_sha256.as_deref(), Some(root.as_str()));
    assert_eq!(result.payment_snapshot_sha256.as_deref(), Some(A));
    assert_eq!(
        result.export_manifest_sha256.as_deref(),
        Some(fx.manifest_hash.as_str())
    );
    assert_eq!(
        result.freight_settlement_sha256.as_deref(),
        Some(fx.settlement_hash.as_str())
    );
    assert_eq!(
        result.evidence.manifest_hash_source,
        Some(ManifestHashSource::RecomputedFromFile)
    );
    assert_eq!(result.evidence.settlement_version, Some(1));
    assert_eq!(result.evidence.checks_passed.last(), Some(&Check::DeclaredRootMatches));
    assert_eq!(result.evidence.checks_passed.len(), 6);
}

#[tokio::test]
async fn root_is_returned_without_declared_root() {
    let fx = Fixture::sealed().await;
    let result = fx.verifier.verify(" ORD-900 ", None).await.unwrap();
    assert!(result.is_pass());
    assert_eq!(result.order_id, ORDER);
    assert_eq!(
        result.chain_root_sha256.as_deref(),
        Some(fx.expected_root().as_str())
    );
    assert!(!result.evidence.checks_passed.contains(&Check::DeclaredRootMatches));
}

#[tokio::test]
async fn manifest_with_foreign_snapshot_is_snapshot_mismatch() {
    let fx = Fixture::sealed().await;
    fx.tamper_manifest(|m| m.payment_snapshot_hash = Some(Sha256Hex::parse(D, "d").unwrap())).await;

    let result = fx.verifier.verify(ORDER, None).await.unwrap();
    assert_eq!(result.status, VerificationStatus::Fail);
    assert_eq!(result.failure_class, Some(FailureClass::SnapshotMismatch));
    assert_eq!(result.chain_root_sha256, None);
}

#[tokio::test]
async fn order_snapshot_changed_after_sealing_is_snapshot_mismatch() {
    let fx = Fixture::sealed().await;
    fx.snapshots.insert(ORDER, D);

    let result = fx.verifier.verify(ORDER, None).await.unwrap();
    assert_eq!(result.failure_class, Some(FailureClass::SnapshotMismatch));
}

#[tokio::test]
async fn settlement_pointing_at_other_manifest_is_manifest_mismatch() {
    let fx = Fixture::sealed().await;
    fx.tamper_settlement(|s| s.export_manifest_hash = Some(Sha256Hex::parse(D, "d").unwrap())).await;

    let result = fx.verifier.verify(ORDER, None).await.unwrap();
    assert_eq!(result.failure_class, Some(FailureClass::ManifestMismatch));
    assert!(result.evidence.checks_passed.contains(&Check::SnapshotConsistent));
}

#[tokio::test]
async fn tampered_manifest_file_is_manifest_mismatch() {
    let fx = Fixture::sealed().await;
    std::fs::write(fx.dir.path().join(MANIFEST_PATH), b"%PDF-1.7 edited").unwrap();

    let result = fx.verifier.verify(ORDER, None).await.unwrap();
    assert_eq!(result.failure_class, Some(FailureClass::ManifestMismatch));
    assert_eq!(
        result.evidence.recomputed_manifest_sha256.as_deref(),
        Some(hash_bytes(b"%PDF-1.7 edited").as_str())
    );
}

#[tokio::test]
async fn unreadable_manifest_file_falls_back_to_stored_hash() {
    let fx = Fixture::sealed().await;
    std::fs::remove_file(fx.dir.path().join(MANIFEST_PATH)).unwrap();

    let result = fx.verifier.verify(ORDER, None).await.unwrap();
    assert!(result.is_pass());
    assert_eq!(
        result.evidence.manifest_hash_source,
        Some(ManifestHashSource::StoredValue)
    );
    assert_eq!(result.evidence.recomputed_manifest_sha256, None);
    assert_eq!(
        result.chain_root_sha256.as_deref(),
        Some(fx.expected_root().as_str())
    );
}

#[tokio::test]
async fn escaping_manifest_path_falls_back_to_stored_hash() {
    let fx = Fixture::sealed().await;
    fx.tamper_manifest(|m| m.manifest_path = Some("../../etc/passwd".into())).await;

    let result = fx.verifier.verify(ORDER, None).await.unwrap();
    assert!(result.is_pass());
    assert_eq!(
        result.evidence.manifest_hash_source,
        Some(ManifestHashSource::StoredValue)
    );
}

#[tokio::test]
async fn wrong_stored_settlement_hash_is_settlement_mismatch() {
    let fx = Fixture::sealed().await;
    fx.tamper_settlement(|s| s.freight_settlement_hash = Some(Sha256Hex::parse(D, "d").unwrap())).await;

    let result = fx.verifier.verify(ORDER, None).await.unwrap();
    assert_eq!(result.failure_class, Some(FailureClass::SettlementMismatch));
    assert_eq!(
        result.evidence.recomputed_settlement_sha256.as_deref(),
        Some(fx.settlement_hash.as_str())
    );
}

#[tokio::test]
async fn edited_canonical_payload_is_settlement_mismatch() {
    let fx = Fixture::sealed().await;
    fx.tamper_settlement(|s| {
        let text = s.settlement_payload_canonical_json.take().unwrap();
        s.settlement_payload_canonical_json = Some(text.replace("139500", "139501"));
    }).await;

    let result = fx.verifier.verify(ORDER, None).await.unwrap();
    assert_eq!(result.failure_class, Some(FailureClass::SettlementMismatch));
}

#[tokio::test]
async fn wrong_declared_root_is_chain_root_invalid() {
    let fx = Fixture::sealed().await;

    let result = fx.verifier.verify(ORDER, Some(D)).await.unwrap();
    assert_eq!(result.failure_class, Some(FailureClass::ChainRootInvalid));
    assert_eq!(result.declared_chain_root_sha256.as_deref(), Some(D));
    assert_eq!(
        result.chain_root_sha256.as_deref(),
        Some(fx.expected_root().as_str())
    );
}

#[tokio::test]
async fn missing_manifest_is_missing_reference() {
    let fx = Fixture::sealed().await;
    let verifier = {
        let clock = Arc::new(ManualClock::new(
            Timestamp::parse("2026-01-16T00:00:00Z", "now").unwrap(),
        ));
        let stores = EvidenceStores::with_collections(
            MemoryCollection::new(),
            fx.settlements.clone(),
            clock.clone(),
        );
        IntegrityChainVerifier::over_stores(
            Arc::new(fx.snapshots.clone()),
            &stores,
            Arc::new(FsManifestReader::new(fx.dir.path())),
            clock,
        )
    };

    let result = verifier.verify(ORDER, None).await.unwrap();
    assert_eq!(result.failure_class, Some(FailureClass::MissingReference));
    assert!(result.evidence.checks_passed.is_empty());
}

#[tokio::test]
async fn voided_settlement_is_missing_reference() {
    let fx = Fixture::sealed().await;
    fx.tamper_settlement(|s| s.status = SettlementStatus::Void).await;

    let result = fx.verifier.verify(ORDER, None).await.unwrap();
    assert_eq!(result.failure_class, Some(FailureClass::MissingReference));
}

#[tokio::test]
async fn malformed_order_snapshot_is_missing_reference() {
    let fx = Fixture::sealed().await;
    fx.snapshots.insert(ORDER, "ABC");

    let result = fx.verifier.verify(ORDER, None).await.unwrap();
    assert_eq!(result.failure_class, Some(FailureClass::MissingReference));
    assert_eq!(result.payment_snapshot_sha256.as_deref(), Some("ABC"));
}

#[tokio::test]
async fn unknown_order_is_missing_reference() {
    let fx = Fixture::sealed().await;
    let result = fx.verifier.verify("ORD-404", None).await.unwrap();
    assert_eq!(result.failure_class, Some(FailureClass::MissingReference));
}

#[tokio::test]
async fn blank_order_and_bad_declared_root_are_errors() {
    let fx = Fixture::sealed().await;
    assert!(matches!(
        fx.verifier.verify("  ", None).await,
        Err(VerifyError::MissingOrderId)
    ));
    assert!(matches!(
        fx.verifier.verify(ORDER, Some("not-a-root")).await,
        Err(VerifyError::InvalidDeclaredRoot(_))
    ));
}

#[tokio::test]
async fn final_settlement_without_payload_is_missing_reference() {
    let fx = Fixture::sealed().await;
    fx.tamper_settlement(|s| s.settlement_payload_canonical_json = None).await;

    let result = fx.verifier.verify(ORDER, None).await.unwrap();
    assert_eq!(result.failure_class, Some(FailureClass::MissingReference));
    assert_eq!(
        result.detail.as_deref(),
        Some("FINAL settlement has no canonical payload")
    );
    assert!(result.evidence.checks_passed.contains(&Check::ManifestConsistent));
    assert_eq!(result.chain_root_sha256, None);
}

#[tokio::test]
async fn manifest_record_without_hash_is_missing_reference() {
    let fx = Fixture::sealed().await;
    fx.tamper_manifest(|m| m.export_manifest_hash = None).await;

    let result = fx.verifier.verify(ORDER, None).await.unwrap();
    assert_eq!(result.failure_class, Some(FailureClass::MissingReference));
    assert_eq!(
        result.detail.as_deref(),
        Some("export manifest exportManifestHash is absent")
    );
    assert!(result.evidence.checks_passed.is_empty());
}

/// Settlement lookup whose stored document cannot be decoded.
struct UndecodableSettlements;

#[async_trait::async_trait]
impl SettlementLookup for UndecodableSettlements {
    async fn latest_final_settlement(
        &self,
        order_id: &str,
    ) -> Result<Option<FreightSettlementRecord>, StoreError> {
        Err(StoreError::Corrupt {
            collection: "freight_settlements",
            key: format!("{order_id}#v1"),
            reason: "missing field `status`".into(),
        })
    }
}

#[tokio::test]
async fn undecodable_settlement_is_missing_reference() {
    let fx = Fixture::sealed().await;
    let clock = Arc::new(ManualClock::new(
        Timestamp::parse("2026-01-16T00:00:00Z", "now").unwrap(),
    ));
    let verifier = IntegrityChainVerifier::new(
        Arc::new(fx.snapshots.clone()),
        fx.stores.manifests.clone(),
        Arc::new(UndecodableSettlements),
        Arc::new(FsManifestReader::new(fx.dir.path())),
        clock,
    );

    let result = verifier.verify(ORDER, None).await.unwrap();
    assert_eq!(result.failure_class, Some(FailureClass::MissingReference));
    let detail = result.detail.unwrap();
    assert!(detail.starts_with("freight settlement record is unreadable"), "{detail}");
    assert!(detail.contains("missing field `status`"));
}
