//! One-time index initialization.
//!
//! Each store owns an [`IndexGate`]. Every operation awaits
//! [`IndexGate::ensure`] first; the gate runs `create_index` for the store's
//! specs exactly once per process, however many callers race on it. A
//! failed attempt leaves the gate closed so the next caller retries.

use tokio::sync::OnceCell;

use crate::collection::{Document, DocumentCollection, IndexSpec};
use crate::error::StoreError;

#[derive(Debug, Default)]
pub struct IndexGate {
    ready: OnceCell<()>,
}

impl IndexGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create every index in `specs` unless that already happened.
    pub async fn ensure<D: Document>(
        &self,
        collection: &dyn DocumentCollection<D>,
        specs: &[IndexSpec],
    ) -> Result<(), StoreError> {
        self.ready
            .get_or_try_init(|| async {
                for spec in specs {
                    collection.create_index(spec).await?;
                }
                tracing::info!(collection = D::COLLECTION, count = specs.len(), "indexes ready");
                Ok::<(), StoreError>(())
            })
            .await?;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }
}
