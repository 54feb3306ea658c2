use clap::{Parser, Subcommand};
use inventory_collator_core::RescanMode;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "inventory-collator")]
#[command(about = "Catalog audio archives across removable volumes", long_about = None)]
pub struct Cli {
    /// Catalog database path (overrides the configured one)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a volume and reconcile it with the catalog
    Scan {
        /// Volume root directory
        root: PathBuf,
        /// Skip content hashing
        #[arg(long)]
        fast: bool,
        /// Discard the volume's identity marker and register it as a new volume
        #[arg(long)]
        force_new: bool,
        /// Stop after the configured test-mode file limit (counts every file, audio or not)
        #[arg(long)]
        test_mode: bool,
        /// Human-readable volume label
        #[arg(long)]
        label: Option<String>,
        /// Reuse (skip) or recompute (force) hashes of unchanged files
        #[arg(long, value_name = "skip|force")]
        rescan: Option<RescanMode>,
    },
    /// Resolve or create a volume identity without scanning
    Identify {
        root: PathBuf,
        #[arg(long)]
        force_new: bool,
    },
    /// List cataloged volumes
    Volumes,
    /// List entries of a volume that were not found by its latest scan
    Missing { volume_key: String },
    /// Export a volume's catalog entries to CSV
    Export {
        volume_key: String,
        output: PathBuf,
    },
    /// Print configuration values
    PrintConfig,
}
