//! # settle CLI entry point
//!
//! Parses command-line arguments and dispatches to subcommand handlers.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use settle_cli::bundle::{run_verify, VerifyArgs};
use settle_cli::digest::{
    run_canonicalize, run_chain_root, run_hash, CanonicalizeArgs, ChainRootArgs, HashArgs,
};

/// Settlement integrity chain toolkit.
///
/// Canonicalizes settlement payloads, hashes evidence files, computes chain
/// roots, and verifies exported evidence bundles offline.
#[derive(Parser, Debug)]
#[command(name = "settle", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the canonical JSON of a settlement payload.
    Canonicalize(CanonicalizeArgs),

    /// Print the SHA-256 of a file's raw bytes.
    Hash(HashArgs),

    /// Print the chain root of three hashes.
    ChainRoot(ChainRootArgs),

    /// Verify an evidence bundle. Exits 2 when the chain fails.
    Verify(VerifyArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match &cli.command {
        Commands::Canonicalize(args) => run_canonicalize(args),
        Commands::Hash(args) => run_hash(args),
        Commands::ChainRoot(args) => run_chain_root(args),
        Commands::Verify(args) => run_verify(args),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
