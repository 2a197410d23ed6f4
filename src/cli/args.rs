//! CLI argument structures
//!
//! This module defines the command-line interface of coloc-dataset.

use crate::config::Compression;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Split word frequency and colocation records into aggregated datasets
#[derive(Parser)]
#[command(name = "coloc-dataset")]
#[command(about = "coloc-dataset - Split and aggregate word frequency and colocation records", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Aggregate mixed records into per-type, per-bucket output files
    Run {
        /// Input files or directories of part files (.gz is decompressed)
        #[arg(required = true, value_name = "INPUT")]
        inputs: Vec<PathBuf>,

        /// Output directory (defaults to <first input without extension>-processed)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Path to a TOML options file
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,

        /// Number of malformed lines to skip before failing
        #[arg(long, value_name = "N")]
        tolerance: Option<u64>,

        /// Number of parallel workers
        #[arg(short = 'w', long, value_name = "N")]
        workers: Option<usize>,

        /// Output file encoding: gzip or none
        #[arg(long)]
        compression: Option<Compression>,
    },
    /// Classify input lines and report counts per record type
    Classify {
        /// Input files or directories of part files
        #[arg(required = true, value_name = "INPUT")]
        inputs: Vec<PathBuf>,
    },
}
