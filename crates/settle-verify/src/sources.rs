//! # Evidence Sources
//!
//! The verifier reads through four traits so any backing system can be
//! plugged in:
//!
//! | Trait | Question it answers |
//! |-------|---------------------|
//! | [`PaymentSnapshotSource`] | What payment snapshot hash does the order carry? |
//! | [`ManifestLookup`] | What is the latest export manifest record? |
//! | [`SettlementLookup`] | What is the latest FINAL settlement record? |
//! | [`ManifestByteReader`] | What are the raw bytes of the manifest file? |
//!
//! The evidence stores implement the two lookups directly.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use settle_store::{
    ExportManifestRecord, ExportManifestStore, FreightSettlementRecord, FreightSettlementStore,
    StoreError,
};
use sqlx::PgPool;

use crate::error::SourceError;

/// Read access to the order store's payment snapshot hash.
///
/// The value is returned raw; the verifier validates its format.
#[async_trait]
pub trait PaymentSnapshotSource: Send + Sync {
    /// Short name recorded in the evidence trail.
    fn name(&self) -> &str;

    async fn payment_snapshot_hash(&self, order_id: &str) -> Result<Option<String>, SourceError>;
}

#[async_trait]
pub trait ManifestLookup: Send + Sync {
    async fn latest_manifest(&self, order_id: &str)
        -> Result<Option<ExportManifestRecord>, StoreError>;
}

#[async_trait]
pub trait SettlementLookup: Send + Sync {
    async fn latest_final_settlement(
        &self,
        order_id: &str,
    ) -> Result<Option<FreightSettlementRecord>, StoreError>;
}

/// Fetches raw manifest file bytes. `None` means the file is unavailable.
#[async_trait]
pub trait ManifestByteReader: Send + Sync {
    async fn read_all_bytes(&self, path: &str) -> Result<Option<Vec<u8>>, SourceError>;
}

#[async_trait]
impl ManifestLookup for ExportManifestStore {
    async fn latest_manifest(
        &self,
        order_id: &str,
    ) -> Result<Option<ExportManifestRecord>, StoreError> {
        self.get_latest_by_order_id(order_id).await
    }
}

#[async_trait]
impl SettlementLookup for FreightSettlementStore {
    async fn latest_final_settlement(
        &self,
        order_id: &str,
    ) -> Result<Option<FreightSettlementRecord>, StoreError> {
        self.get_latest_final_by_order_id(order_id).await
    }
}

// -- In-memory order source ---------------------------------------------------

/// Payment snapshot hashes held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotSource {
    hashes: Arc<RwLock<HashMap<String, String>>>,
}

impl MemorySnapshotSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) the snapshot hash of an order.
    pub fn insert(&self, order_id: impl Into<String>, hash: impl Into<String>) {
        self.hashes.write().insert(order_id.into(), hash.into());
    }

    pub fn remove(&self, order_id: &str) -> Option<String> {
        self.hashes.write().remove(order_id)
    }
}

#[async_trait]
impl PaymentSnapshotSource for MemorySnapshotSource {
    fn name(&self) -> &str {
        "memory"
    }

    async fn payment_snapshot_hash(&self, order_id: &str) -> Result<Option<String>, SourceError> {
        Ok(self.hashes.read().get(order_id).cloned())
    }
}

// -- Postgres order source ----------------------------------------------------

/// Reads `payment_snapshot_hash` from the marketplace orders table.
#[derive(Debug, Clone)]
pub struct PgSnapshotSource {
    pool: PgPool,
    table: String,
    query: String,
}

impl PgSnapshotSource {
    /// # Errors
    ///
    /// [`SourceError::InvalidConfig`] unless `table` is a plain identifier,
    /// optionally schema-qualified (`orders`, `shop.orders`).
    pub fn new(pool: PgPool, table: &str) -> Result<Self, SourceError> {
        if !is_table_identifier(table) {
            return Err(SourceError::InvalidConfig(format!(
                "orders table name {table:?} is not a plain identifier"
            )));
        }
        Ok(Self {
            pool,
            table: table.to_string(),
            query: format!("SELECT payment_snapshot_hash FROM {table} WHERE order_id = $1"),
        })
    }
}

fn is_table_identifier(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|p| {
            let mut chars = p.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

#[async_trait]
impl PaymentSnapshotSource for PgSnapshotSource {
    fn name(&self) -> &str {
        &self.table
    }

    async fn payment_snapshot_hash(&self, order_id: &str) -> Result<Option<String>, SourceError> {
        let row: Option<(Option<String>,)> = sqlx::query_as(&self.query)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|(hash,)| hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_source_returns_raw_values() {
        let source = MemorySnapshotSource::new();
        source.insert("ORD-1", "not-a-hash");
        assert_eq!(
            source.payment_snapshot_hash("ORD-1").await.unwrap().as_deref(),
            Some("not-a-hash")
        );
        assert_eq!(source.payment_snapshot_hash("ORD-2").await.unwrap(), None);
        assert_eq!(source.remove("ORD-1").as_deref(), Some("not-a-hash"));
    }

    #[test]
    fn table_identifiers() {
        assert!(is_table_identifier("orders"));
        assert!(is_table_identifier("shop.orders_v2"));
        assert!(is_table_identifier("_orders"));
        assert!(!is_table_identifier("orders; DROP TABLE x"));
        assert!(!is_table_identifier("a.b.c"));
        assert!(!is_table_identifier("1orders"));
        assert!(!is_table_identifier(""));
    }
}
