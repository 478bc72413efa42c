//! # settle-store — Evidence Persistence
//!
//! Durable storage of the two evidence record types of the settlement
//! integrity chain:
//!
//! - [`ExportManifestStore`] — one export manifest record per order.
//! - [`FreightSettlementStore`] — one freight settlement record per
//!   (order, settlement version).
//!
//! Both stores validate input completely before touching storage, then run
//! the write-once guard from `settle-core` inside
//! [`DocumentCollection::find_one_and_update`], so the check and the write
//! are one atomic step even with concurrent writers.
//!
//! ## Backends
//!
//! - [`MemoryCollection`] — `parking_lot::RwLock` over a `HashMap`.
//! - [`PgCollection`] — JSONB documents in Postgres via `sqlx`, with
//!   advisory locks for atomic updates.
//!
//! ## Crate Policy
//!
//! - Depends only on `settle-core` internally.
//! - No `.unwrap()` outside tests.

pub mod collection;
pub mod error;
pub mod evidence;
pub mod gate;
pub mod manifest;
pub mod memory;
pub mod postgres;
pub mod settlement;

pub use collection::{Document, DocumentCollection, Filter, IndexSpec, UpdateFn};
pub use error::StoreError;
pub use evidence::{EvidenceStores, StorageBackend};
pub use gate::IndexGate;
pub use manifest::{ExportManifestInput, ExportManifestRecord, ExportManifestStore, MANIFEST_INDEXES};
pub use memory::MemoryCollection;
pub use postgres::{connect, PgCollection};
pub use settlement::{
    EvidenceRef, EvidenceRefInput, FreightSettlementInput, FreightSettlementRecord,
    FreightSettlementStore, SETTLEMENT_INDEXES,
};
