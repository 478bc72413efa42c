//! # settle-cli — Settlement Integrity Chain CLI
//!
//! Provides the `settle` command-line interface.
//!
//! ## Subcommands
//!
//! - `settle canonicalize <payload.json>` — canonical JSON of a payload.
//! - `settle hash <file>` — SHA-256 of a file's raw bytes.
//! - `settle chain-root <payment> <manifest> <settlement>` — chain root.
//! - `settle verify <bundle.json>` — verify an exported evidence bundle
//!   offline. Exit code 0 on PASS, 2 on FAIL.
//!
//! ```bash
//! settle canonicalize settlement.json --with-hash
//! settle verify ORD-900.bundle.json --manifest-root ./manifests
//! ```

pub mod bundle;
pub mod digest;

use std::path::Path;

use anyhow::{Context, Result};

/// Exit code for a verification that ran and reported FAIL.
pub const EXIT_VERIFICATION_FAILED: u8 = 2;

/// Read a file as UTF-8, naming it in the error.
pub(crate) fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
