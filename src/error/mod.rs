use std::path::PathBuf;
use thiserror::Error;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

use crate::pipeline::record::GroupKey;

/// Why a raw line could not be classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// Split produced a field count other than 3 or 4
    FieldCount(usize),
    /// Trailing field is not an unsigned integer
    InvalidCount(String),
    /// Line bytes are not valid UTF-8
    InvalidUtf8,
}

impl std::fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FieldCount(n) => write!(f, "expected 3 or 4 fields, found {n}"),
            Self::InvalidCount(value) => write!(f, "count {value:?} is not an unsigned integer"),
            Self::InvalidUtf8 => write!(f, "line is not valid UTF-8"),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClassificationError {
    #[error("Malformed line ({reason}): {line:?}")]
    MalformedLine { line: String, reason: MalformedReason },
}

impl ClassificationError {
    /// The offending raw line
    pub fn line(&self) -> &str {
        match self {
            Self::MalformedLine { line, .. } => line,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("Counter overflow for {key}: {current} + {increment} exceeds u64::MAX")]
    CounterOverflow {
        key: GroupKey,
        current: u64,
        increment: u64,
    },
}

#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("Output destination {destination} unavailable ({operation} {path:?})")]
    DestinationUnavailable {
        destination: String,
        operation: &'static str,
        path: Option<PathBuf>,
        #[source]
        source: std::io::Error,
    },
}

impl RoutingError {
    pub fn unavailable(
        destination: impl Into<String>,
        operation: &'static str,
        path: Option<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::DestinationUnavailable {
            destination: destination.into(),
            operation,
            path,
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that abort a job
#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to read input {path}")]
    Input {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("Job aborted")]
    Aborted,
}

impl JobError {
    pub fn code(&self) -> u16 {
        match self {
            Self::Config(ConfigError::NotFound(_)) => ErrorCode::CONFIG_NOT_FOUND,
            Self::Config(ConfigError::Parse { .. }) => ErrorCode::CONFIG_PARSE_ERROR,
            Self::Config(ConfigError::InvalidValue { .. }) => ErrorCode::CONFIG_INVALID_VALUE,
            Self::Config(ConfigError::Read { .. }) => ErrorCode::CONFIG_GENERIC,
            Self::Input { .. } => ErrorCode::INPUT_IO_ERROR,
            Self::Classification(_) => ErrorCode::INPUT_TOLERANCE_EXCEEDED,
            Self::Aggregation(_) => ErrorCode::AGGREGATION_COUNTER_OVERFLOW,
            Self::Routing(RoutingError::DestinationUnavailable { operation, .. }) => {
                if *operation == "commit" {
                    ErrorCode::ROUTING_COMMIT_FAILED
                } else {
                    ErrorCode::ROUTING_DESTINATION_UNAVAILABLE
                }
            }
            Self::Worker(_) => ErrorCode::WORKER_FAILED,
            Self::Aborted => ErrorCode::JOB_ABORTED,
        }
    }
}

/// Terminal job failure, reported together with the malformed-line count
/// observed before the job stopped.
#[derive(Debug, Error)]
#[error("[E{code:04}] {cause} ({malformed_lines} malformed line(s) encountered)", code = .cause.code())]
pub struct JobFailure {
    #[source]
    pub cause: JobError,
    pub malformed_lines: u64,
}

pub type JobResult<T> = Result<T, JobError>;
