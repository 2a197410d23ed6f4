//! # coloc-dataset
//!
//! Splits the mixed output of a word colocation analysis into two aggregated
//! datasets: term frequencies and term co-occurrences, each partitioned by
//! the leading bucket field (typically a year-month code).
//!
//! ## Usage
//!
//! ```bash
//! coloc-dataset run warcs-2017-word-coloc.tsv [-o out/] [--tolerance N]
//! ```
//!
//! ## Modules
//!
//! - `cli` - Command-line argument parsing and command handlers
//! - `config` - Job options loaded from TOML and environment
//! - `error` - Typed errors for classification, aggregation and routing
//! - `pipeline` - Classification, partitioning, aggregation and output routing
pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;

pub use config::JobOptions;
pub use error::{JobError, JobFailure};
pub use pipeline::{Job, JobSummary};
