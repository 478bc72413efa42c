//! # API Route Modules
//!
//! - `manifests` — export manifest records (create, upsert, latest).
//! - `settlements` — freight settlement records (create, upsert, finalize,
//!   latest, latest FINAL).
//! - `integrity` — chain verification for one order.
//! - `canonicalize` — canonical JSON and hash of a settlement payload,
//!   without storing anything.

pub mod canonicalize;
pub mod integrity;
pub mod manifests;
pub mod settlements;
