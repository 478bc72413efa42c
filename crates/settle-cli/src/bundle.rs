//! # Evidence Bundle Verification
//!
//! An evidence bundle is the stored documents of one order exported as a
//! single JSON file:
//!
//! ```json
//! {
//!   "orderId": "ORD-900",
//!   "paymentSnapshotHash": "…",
//!   "exportManifest": { …ExportManifestRecord… },
//!   "freightSettlements": [ { …FreightSettlementRecord… } ]
//! }
//! ```
//!
//! The documents are loaded as-is into in-memory collections (no write
//! guards, since the point is to check what was stored) and the regular
//! verifier runs over them. Manifest paths resolve against
//! `--manifest-root`, which defaults to the bundle's directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;
use settle_core::SystemClock;
use settle_store::{EvidenceStores, ExportManifestRecord, FreightSettlementRecord, MemoryCollection};
use settle_verify::{
    FsManifestReader, IntegrityChainVerifier, IntegrityVerificationResult, MemorySnapshotSource,
};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Evidence bundle JSON file.
    #[arg(value_name = "BUNDLE")]
    pub bundle: PathBuf,

    /// Directory manifest paths are relative to.
    #[arg(long, value_name = "DIR")]
    pub manifest_root: Option<PathBuf>,

    /// Chain root the caller expects.
    #[arg(long, value_name = "HEX")]
    pub declared_root: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EvidenceBundle {
    pub order_id: String,
    #[serde(default)]
    pub payment_snapshot_hash: Option<String>,
    #[serde(default)]
    pub export_manifest: Option<ExportManifestRecord>,
    #[serde(default)]
    pub freight_settlements: Vec<FreightSettlementRecord>,
}

impl EvidenceBundle {
    pub fn load(path: &Path) -> Result<Self> {
        let text = crate::read_text(path)?;
        serde_json::from_str(&text)
            .with_context(|| format!("{} is not an evidence bundle", path.display()))
    }

    /// Run the verifier over the bundle's documents.
    pub async fn verify(
        self,
        manifest_root: &Path,
        declared_root: Option<&str>,
    ) -> Result<IntegrityVerificationResult> {
        let manifests = MemoryCollection::new();
        let settlements = MemoryCollection::new();
        if let Some(manifest) = self.export_manifest {
            manifests.seed(manifest);
        }
        for settlement in self.freight_settlements {
            settlements.seed(settlement);
        }

        let snapshots = MemorySnapshotSource::new();
        if let Some(hash) = self.payment_snapshot_hash {
            snapshots.insert(self.order_id.trim(), hash);
        }

        let clock = Arc::new(SystemClock);
        let stores = EvidenceStores::with_collections(manifests, settlements, clock.clone());
        let verifier = IntegrityChainVerifier::over_stores(
            Arc::new(snapshots),
            &stores,
            Arc::new(FsManifestReader::new(manifest_root)),
            clock,
        );
        Ok(verifier.verify(&self.order_id, declared_root).await?)
    }
}

pub fn run_verify(args: &VerifyArgs) -> Result<u8> {
    let bundle = EvidenceBundle::load(&args.bundle)?;
    let manifest_root = match &args.manifest_root {
        Some(root) => root.clone(),
        None => args
            .bundle
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    tracing::debug!(manifest_root = %manifest_root.display(), "verifying evidence bundle");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let result = runtime.block_on(bundle.verify(&manifest_root, args.declared_root.as_deref()))?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    if result.is_pass() {
        Ok(0)
    } else {
        Ok(crate::EXIT_VERIFICATION_FAILED)
    }
}
