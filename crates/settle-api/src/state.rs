//! # Application State
//!
//! Built once at startup and cloned into every handler: the two evidence
//! stores, the verifier wired to the same stores, an optional database pool
//! (for readiness), and the metrics handle.

use std::path::PathBuf;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use settle_core::{Clock, SystemClock};
use settle_store::{EvidenceStores, StorageBackend, StoreError};
use settle_verify::{
    FsManifestReader, IntegrityChainVerifier, MemorySnapshotSource, PaymentSnapshotSource,
    PgSnapshotSource, SourceError,
};
use sqlx::PgPool;
use thiserror::Error;

use crate::config::ApiConfig;

#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("evidence store initialization failed: {0}")]
    Store(#[from] StoreError),

    #[error("order source misconfigured: {0}")]
    Source(#[from] SourceError),
}

#[derive(Clone)]
pub struct AppState {
    pub stores: EvidenceStores,
    pub verifier: Arc<IntegrityChainVerifier>,
    pub db_pool: Option<PgPool>,
    pub metrics: Option<PrometheusHandle>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("stores", &self.stores)
            .field("verifier", &self.verifier)
            .field("database", &self.db_pool.is_some())
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl AppState {
    /// In-memory stores, with payment snapshot hashes read from `payments`.
    pub fn in_memory(
        payments: Arc<dyn PaymentSnapshotSource>,
        manifest_root: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let stores = EvidenceStores::in_memory(Arc::clone(&clock));
        Self::assemble(stores, payments, manifest_root.into(), clock, None)
    }

    /// Connect to the configured backend and create indexes.
    ///
    /// Without `DATABASE_URL` the service runs on in-memory collections
    /// and an empty order source, so every verification reports a missing
    /// payment snapshot.
    pub async fn from_config(config: &ApiConfig) -> Result<Self, BootstrapError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        match &config.database_url {
            Some(url) => {
                let pool = settle_store::connect(url, config.db_max_connections).await?;
                let stores =
                    EvidenceStores::open(StorageBackend::Postgres(pool.clone()), Arc::clone(&clock))
                        .await?;
                let payments = Arc::new(PgSnapshotSource::new(pool.clone(), &config.orders_table)?);
                Ok(Self::assemble(
                    stores,
                    payments,
                    config.manifest_root.clone(),
                    clock,
                    Some(pool),
                ))
            }
            None => {
                tracing::warn!("DATABASE_URL not set; evidence is kept in memory only");
                let stores = EvidenceStores::open(StorageBackend::Memory, Arc::clone(&clock)).await?;
                Ok(Self::assemble(
                    stores,
                    Arc::new(MemorySnapshotSource::new()),
                    config.manifest_root.clone(),
                    clock,
                    None,
                ))
            }
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    fn assemble(
        stores: EvidenceStores,
        payments: Arc<dyn PaymentSnapshotSource>,
        manifest_root: PathBuf,
        clock: Arc<dyn Clock>,
        db_pool: Option<PgPool>,
    ) -> Self {
        let verifier = IntegrityChainVerifier::over_stores(
            payments,
            &stores,
            Arc::new(FsManifestReader::new(manifest_root)),
            clock,
        );
        Self {
            stores,
            verifier: Arc::new(verifier),
            db_pool,
            metrics: None,
        }
    }
}
