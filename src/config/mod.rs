//! Job configuration
//!
//! Options are built once (defaults, then TOML file, then environment, then
//! command-line overrides), validated, and handed to the job as an immutable
//! value.

use crate::error::ConfigError;
use crate::pipeline::record::RecordType;
use serde::{Deserialize, Serialize};

pub mod loader;

pub use loader::ConfigLoader;

/// Coarse partitioning always uses the single leading bucket field.
pub const COARSE_PARTITION_FIELDS: usize = 1;

pub const ENV_MALFORMED_TOLERANCE: &str = "COLOC_MALFORMED_TOLERANCE";
pub const ENV_WORKERS: &str = "COLOC_WORKERS";
pub const ENV_COMPRESSION: &str = "COLOC_COMPRESSION";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOptions {
    /// Number of leading key fields used to distribute work
    pub coarse_partition_fields: usize,
    /// Malformed lines skipped before the job fails
    pub malformed_line_tolerance: u64,
    pub output_naming: OutputNaming,
    /// Parallel map and reduce workers
    pub workers: usize,
    pub compression: Compression,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            coarse_partition_fields: COARSE_PARTITION_FIELDS,
            malformed_line_tolerance: 0,
            output_naming: OutputNaming::default(),
            workers: default_workers(),
            compression: Compression::default(),
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl JobOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.coarse_partition_fields != COARSE_PARTITION_FIELDS {
            return Err(ConfigError::invalid(
                "coarse_partition_fields",
                format!(
                    "must be {COARSE_PARTITION_FIELDS}, got {}",
                    self.coarse_partition_fields
                ),
            ));
        }
        if self.workers == 0 {
            return Err(ConfigError::invalid("workers", "must be at least 1"));
        }
        self.output_naming.validate()
    }

    /// Apply `COLOC_*` overrides using the given variable lookup
    pub fn merge_env_vars_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_MALFORMED_TOLERANCE) {
            self.malformed_line_tolerance = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid(ENV_MALFORMED_TOLERANCE, value.clone()))?;
        }
        if let Some(value) = lookup(ENV_WORKERS) {
            self.workers = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::invalid(ENV_WORKERS, value.clone()))?;
        }
        if let Some(value) = lookup(ENV_COMPRESSION) {
            self.compression = value.parse()?;
        }
        Ok(())
    }

    pub fn merge_env_vars(&mut self) -> Result<(), ConfigError> {
        self.merge_env_vars_with(|name| std::env::var(name).ok())
    }
}

/// Logical destination name per record type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputNaming {
    pub frequency: String,
    pub cooccurrence: String,
}

impl Default for OutputNaming {
    fn default() -> Self {
        Self {
            frequency: "freqn".to_string(),
            cooccurrence: "coloc".to_string(),
        }
    }
}

impl OutputNaming {
    pub fn name_for(&self, record_type: RecordType) -> &str {
        match record_type {
            RecordType::Frequency => &self.frequency,
            RecordType::Cooccurrence => &self.cooccurrence,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for record_type in RecordType::ALL {
            let name = self.name_for(record_type);
            let field = format!("output_naming.{}", record_type);
            if name.is_empty() {
                return Err(ConfigError::invalid(field, "must not be empty"));
            }
            if name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(ConfigError::invalid(
                    field,
                    format!("{name:?} is not a plain file name prefix"),
                ));
            }
        }
        if self.frequency == self.cooccurrence {
            return Err(ConfigError::invalid(
                "output_naming",
                "frequency and cooccurrence destinations must differ",
            ));
        }
        Ok(())
    }
}

/// Encoding of physical output files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    #[default]
    Gzip,
}

impl Compression {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::None => "tsv",
            Self::Gzip => "tsv.gz",
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "plain" => Ok(Self::None),
            "gzip" | "gz" => Ok(Self::Gzip),
            other => Err(ConfigError::invalid(
                "compression",
                format!("unknown compression {other:?} (expected gzip or none)"),
            )),
        }
    }
}
