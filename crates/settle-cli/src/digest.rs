//! # Digest Subcommands
//!
//! `canonicalize`, `hash` and `chain-root`: the pure parts of the chain,
//! usable without any store.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use settle_core::{canonicalize, chain_root, hash_bytes, CanonicalJson, SettlementPayloadInput, Sha256Hex};

#[derive(Args, Debug)]
pub struct CanonicalizeArgs {
    /// Settlement payload JSON file.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Also print the SHA-256 of the canonical text on a second line.
    #[arg(long)]
    pub with_hash: bool,
}

#[derive(Args, Debug)]
pub struct HashArgs {
    /// File whose raw bytes are hashed.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct ChainRootArgs {
    /// Payment snapshot hash.
    pub payment: String,
    /// Export manifest hash.
    pub manifest: String,
    /// Freight settlement hash.
    pub settlement: String,
}

/// Canonical JSON of the payload stored in `path`.
pub fn canonicalize_file(path: &Path) -> Result<CanonicalJson> {
    let text = crate::read_text(path)?;
    let input: SettlementPayloadInput = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a settlement payload", path.display()))?;
    Ok(canonicalize(&input)?)
}

pub fn hash_file(path: &Path) -> Result<Sha256Hex> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(hash_bytes(&bytes))
}

pub fn run_canonicalize(args: &CanonicalizeArgs) -> Result<u8> {
    let canonical = canonicalize_file(&args.file)?;
    println!("{canonical}");
    if args.with_hash {
        println!("{}", canonical.sha256());
    }
    Ok(0)
}

pub fn run_hash(args: &HashArgs) -> Result<u8> {
    println!("{}", hash_file(&args.file)?);
    Ok(0)
}

pub fn run_chain_root(args: &ChainRootArgs) -> Result<u8> {
    let root = chain_root(&args.payment, &args.manifest, &args.settlement)?;
    println!("{root}");
    Ok(0)
}
