//! CLI definitions for registry-janitor
//!
//! This module contains all CLI argument parsing structures using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "registry-janitor",
    version,
    about = "Housekeeping for Quay container registries",
    long_about = "Removes orphaned signature, attestation, SBOM and source tags,\nand re-enables repository notifications disabled by delivery failures."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (YAML)
    #[arg(short, long, global = true, env = "JANITOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Quay API token
    #[arg(long, global = true, env = "QUAY_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Delete orphaned and superseded tags in every repository of a namespace
    ///
    /// Every deletion is logged with repository, tag and reason. Keep
    /// decisions are logged at debug level; pass --verbose to see them.
    PruneTags {
        /// Organization namespace
        #[arg(short, long)]
        namespace: String,

        /// Report what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,

        /// Only consider tags created in the last N days
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        days: Option<u32>,
    },

    /// Reset repository notifications that have failed deliveries
    ResetNotifications {
        /// Organization namespace
        #[arg(short, long)]
        namespace: String,

        /// Report what would be reset without resetting
        #[arg(long)]
        dry_run: bool,
    },
}
