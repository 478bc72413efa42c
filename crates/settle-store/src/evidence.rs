//! Startup wiring for both evidence stores.

use std::sync::Arc;

use settle_core::Clock;
use sqlx::PgPool;

use crate::error::StoreError;
use crate::manifest::{ExportManifestRecord, ExportManifestStore};
use crate::memory::MemoryCollection;
use crate::postgres::PgCollection;
use crate::settlement::{FreightSettlementRecord, FreightSettlementStore};

/// Where evidence documents live.
#[derive(Debug, Clone)]
pub enum StorageBackend {
    /// Process-local collections. Nothing survives a restart.
    Memory,
    /// The `settle_documents` table.
    Postgres(PgPool),
}

impl StorageBackend {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres(_) => "postgres",
        }
    }
}

/// The two evidence stores, constructed once per process.
#[derive(Debug, Clone)]
pub struct EvidenceStores {
    pub manifests: Arc<ExportManifestStore>,
    pub settlements: Arc<FreightSettlementStore>,
}

impl EvidenceStores {
    /// Build both stores on `backend` and create their indexes.
    pub async fn open(backend: StorageBackend, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        tracing::info!(backend = backend.name(), "opening evidence stores");
        let stores = match backend {
            StorageBackend::Memory => Self::in_memory(clock),
            StorageBackend::Postgres(pool) => Self {
                manifests: Arc::new(ExportManifestStore::new(
                    Arc::new(PgCollection::<ExportManifestRecord>::new(pool.clone())),
                    Arc::clone(&clock),
                )),
                settlements: Arc::new(FreightSettlementStore::new(
                    Arc::new(PgCollection::<FreightSettlementRecord>::new(pool)),
                    clock,
                )),
            },
        };
        stores.manifests.ensure_indexes().await?;
        stores.settlements.ensure_indexes().await?;
        Ok(stores)
    }

    /// Both stores over fresh in-memory collections. Indexes are created
    /// lazily on first use.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::with_collections(MemoryCollection::new(), MemoryCollection::new(), clock)
    }

    /// Both stores over caller-held in-memory collections, e.g. pre-seeded
    /// from an evidence bundle.
    pub fn with_collections(
        manifests: MemoryCollection<ExportManifestRecord>,
        settlements: MemoryCollection<FreightSettlementRecord>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            manifests: Arc::new(ExportManifestStore::new(
                Arc::new(manifests),
                Arc::clone(&clock),
            )),
            settlements: Arc::new(FreightSettlementStore::new(Arc::new(settlements), clock)),
        }
    }
}
