//! # Hash Chain — SHA-256 Digests and the Chain Root
//!
//! One primitive, [`hash_bytes`], hashes both the canonical settlement JSON
//! and the raw manifest file bytes, so the verifier recomputes both with
//! the same code path that produced them.
//!
//! The chain root binds the three evidence hashes:
//!
//! ```text
//! root = SHA256( payment_hex ‖ manifest_hex ‖ settlement_hex )
//! ```
//!
//! over the ASCII hex strings, in exactly that order. Reordering is a
//! breaking format change.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalBytes;
use crate::error::IntegrityError;
use crate::hash::Sha256Hex;

/// SHA-256 over raw bytes.
///
/// Use this for opaque artifacts (manifest PDFs, canonical JSON text read
/// back from a store). For structured values, build [`CanonicalBytes`]
/// first and call [`hash_canonical`].
pub fn hash_bytes(bytes: &[u8]) -> Sha256Hex {
    let hash = Sha256::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hash);
    Sha256Hex::from_digest(out)
}

/// SHA-256 over canonical bytes.
pub fn hash_canonical(data: &CanonicalBytes) -> Sha256Hex {
    hash_bytes(data.as_bytes())
}

/// Compute the chain root from three hash strings.
///
/// Each input is validated first; a malformed input fails loudly instead of
/// silently producing a root nobody can reproduce.
///
/// # Errors
///
/// Returns [`IntegrityError::InvalidHashFormat`] naming the first malformed input.
pub fn chain_root(
    payment_snapshot: &str,
    export_manifest: &str,
    freight_settlement: &str,
) -> Result<Sha256Hex, IntegrityError> {
    let hashes = ChainHashes {
        payment_snapshot: Sha256Hex::parse(payment_snapshot, "paymentSnapshotHash")?,
        export_manifest: Sha256Hex::parse(export_manifest, "exportManifestHash")?,
        freight_settlement: Sha256Hex::parse(freight_settlement, "freightSettlementHash")?,
    };
    Ok(hashes.root())
}

/// The three confirmed evidence hashes of one order's settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHashes {
    pub payment_snapshot: Sha256Hex,
    pub export_manifest: Sha256Hex,
    pub freight_settlement: Sha256Hex,
}

impl ChainHashes {
    /// SHA-256 over `payment ‖ manifest ‖ settlement`.
    pub fn root(&self) -> Sha256Hex {
        let mut hasher = Sha256::new();
        hasher.update(self.payment_snapshot.as_str().as_bytes());
        hasher.update(self.export_manifest.as_str().as_bytes());
        hasher.update(self.freight_settlement.as_str().as_bytes());
        let mut out = [0u8; 32];
        out.copy_from_slice(&hasher.finalize());
        Sha256Hex::from_digest(out)
    }
}
