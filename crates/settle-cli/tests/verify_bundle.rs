//! Offline verification of exported evidence bundles.

use std::sync::Arc;

use serde_json::{json, Value};
use settle_cli::bundle::{run_verify, EvidenceBundle, VerifyArgs};
use settle_core::{hash_bytes, FieldPatch, SystemClock};
use settle_store::{EvidenceStores, ExportManifestInput};
use settle_verify::FailureClass;

const A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

/// Seal ORD-900 through the real stores and export it as a bundle.
async fn export_bundle(dir: &std::path::Path) -> Value {
    let manifest_bytes = b"%PDF-1.7 ORD-900";
    std::fs::write(dir.join("ORD-900.pdf"), manifest_bytes).unwrap();
    let manifest_hash = hash_bytes(manifest_bytes);

    let stores = EvidenceStores::in_memory(Arc::new(SystemClock));
    let manifest = stores
        .manifests
        .upsert(ExportManifestInput {
            order_id: "ORD-900".into(),
            payment_snapshot_hash: FieldPatch::Set(A.into()),
            export_manifest_hash: FieldPatch::Set(manifest_hash.to_string()),
            manifest_path: FieldPatch::Set("ORD-900.pdf".into()),
            ..Default::default()
        })
        .await
        .unwrap();

    let payload = serde_json::from_value(json!({
        "schemaVersion": "freight-settlement/v1",
        "orderId": "ORD-900",
        "paymentSnapshotHash": A,
        "exportManifestHash": manifest_hash.as_str(),
        "currency": "INR",
        "amounts": {"subtotal": 5000, "shipping": 700, "insurance": 0, "duty": 300, "gst": 900, "total": 6900},
        "incoterm": "DDP",
        "carrierId": "BLUEDART",
        "shipmentId": "SHP-900",
        "trackingNumbers": ["BD-1"],
        "lane": {"originCountry": "IN", "destinationCountry": "DE"},
        "compliance": {"certificateIssued": false},
        "settlementStatus": "FINAL",
        "finalizedAt": "2026-02-01T09:30:00Z"
    }))
    .unwrap();
    let settlement = stores.settlements.finalize(1, &payload, None).await.unwrap();

    json!({
        "orderId": "ORD-900",
        "paymentSnapshotHash": A,
        "exportManifest": manifest,
        "freightSettlements": [settlement]
    })
}

fn write_bundle(dir: &std::path::Path, bundle: &Value) -> std::path::PathBuf {
    let path = dir.join("ORD-900.bundle.json");
    std::fs::write(&path, serde_json::to_string_pretty(bundle).unwrap()).unwrap();
    path
}

#[tokio::test]
async fn exported_bundle_verifies() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = export_bundle(dir.path()).await;
    let path = write_bundle(dir.path(), &bundle);

    let result = EvidenceBundle::load(&path)
        .unwrap()
        .verify(dir.path(), None)
        .await
        .unwrap();
    assert!(result.is_pass(), "{:?}", result.detail);
}

#[tokio::test]
async fn edited_bundle_payload_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut bundle = export_bundle(dir.path()).await;
    let text = bundle["freightSettlements"][0]["settlementPayloadCanonicalJson"]
        .as_str()
        .unwrap()
        .replace("BLUEDART", "DHL");
    bundle["freightSettlements"][0]["settlementPayloadCanonicalJson"] = json!(text);
    let path = write_bundle(dir.path(), &bundle);

    let result = EvidenceBundle::load(&path)
        .unwrap()
        .verify(dir.path(), None)
        .await
        .unwrap();
    assert_eq!(result.failure_class, Some(FailureClass::SettlementMismatch));
}

#[tokio::test]
async fn bundle_without_snapshot_is_missing_reference() {
    let dir = tempfile::tempdir().unwrap();
    let mut bundle = export_bundle(dir.path()).await;
    bundle.as_object_mut().unwrap().remove("paymentSnapshotHash");
    let path = write_bundle(dir.path(), &bundle);

    let result = EvidenceBundle::load(&path)
        .unwrap()
        .verify(dir.path(), None)
        .await
        .unwrap();
    assert_eq!(result.failure_class, Some(FailureClass::MissingReference));
}

#[test]
fn run_verify_exit_codes() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let bundle = runtime.block_on(export_bundle(dir.path()));
    let path = write_bundle(dir.path(), &bundle);

    let pass = VerifyArgs {
        bundle: path.clone(),
        manifest_root: None,
        declared_root: None,
    };
    assert_eq!(run_verify(&pass).unwrap(), 0);

    let wrong_root = VerifyArgs {
        bundle: path,
        manifest_root: Some(dir.path().to_path_buf()),
        declared_root: Some("f".repeat(64)),
    };
    assert_eq!(
        run_verify(&wrong_root).unwrap(),
        settle_cli::EXIT_VERIFICATION_FAILED
    );
}

#[test]
fn unknown_bundle_keys_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_bundle(dir.path(), &json!({"orderId": "ORD-1", "extra": true}));
    assert!(EvidenceBundle::load(&path).is_err());
}
