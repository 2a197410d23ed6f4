//! Input sources and line scanning
//!
//! Files ending in `.gz` are decompressed transparently. Lines are read as
//! bytes so that invalid UTF-8 counts as a malformed line instead of an I/O
//! failure.

use crate::error::{ClassificationError, JobError, JobResult, MalformedReason};
use crate::pipeline::classifier::classify;
use crate::pipeline::record::ClassifiedRecord;
use crate::pipeline::AbortSignal;
use flate2::read::MultiGzDecoder;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Where raw lines come from
#[derive(Debug, Clone)]
pub enum InputSource {
    File(PathBuf),
    Memory { name: String, data: Arc<Vec<u8>> },
}

impl InputSource {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn memory(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::Memory {
            name: name.into(),
            data: Arc::new(data.into()),
        }
    }

    /// Open as a buffered line reader
    pub fn open(&self) -> JobResult<Box<dyn BufRead + Send>> {
        match self {
            Self::File(path) => {
                let file = File::open(path).map_err(|source| JobError::Input {
                    path: path.clone(),
                    source,
                })?;
                if is_gzip(path) {
                    Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
                } else {
                    Ok(Box::new(BufReader::new(file)))
                }
            }
            Self::Memory { data, .. } => Ok(Box::new(Cursor::new(data.to_vec()))),
        }
    }

    fn path(&self) -> PathBuf {
        match self {
            Self::File(path) => path.clone(),
            Self::Memory { name, .. } => PathBuf::from(name),
        }
    }
}

impl fmt::Display for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Memory { name, .. } => write!(f, "<{name}>"),
        }
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Job-wide malformed line budget shared by all map workers
#[derive(Debug, Clone)]
pub struct MalformedBudget {
    tolerance: u64,
    seen: Arc<AtomicU64>,
}

impl MalformedBudget {
    pub fn new(tolerance: u64) -> Self {
        Self {
            tolerance,
            seen: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Count one malformed line; fails once the tolerance is exceeded
    pub fn charge(&self, error: ClassificationError) -> Result<(), ClassificationError> {
        let seen = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
        if seen > self.tolerance {
            Err(error)
        } else {
            Ok(())
        }
    }

    pub fn seen(&self) -> u64 {
        self.seen.load(Ordering::SeqCst)
    }

    pub fn tolerance(&self) -> u64 {
        self.tolerance
    }
}

/// Line counts for one scanned source
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub lines: u64,
    pub classified: u64,
    pub malformed: u64,
}

/// Classify every line of `source`, handing valid records to `emit`.
///
/// Stops early when `abort` is raised by another worker or when `emit`
/// fails.
pub fn scan_source<F>(
    source: &InputSource,
    budget: &MalformedBudget,
    abort: &AbortSignal,
    mut emit: F,
) -> JobResult<ScanStats>
where
    F: FnMut(ClassifiedRecord) -> JobResult<()>,
{
    let mut reader = source.open()?;
    let mut stats = ScanStats::default();
    let mut buf = Vec::new();

    loop {
        if abort.is_raised() {
            return Err(JobError::Aborted);
        }

        buf.clear();
        let read = reader.read_until(b'\n', &mut buf).map_err(|e| JobError::Input {
            path: source.path(),
            source: e,
        })?;
        if read == 0 {
            break;
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
        }
        stats.lines += 1;

        let result = match std::str::from_utf8(&buf) {
            Ok(line) => classify(line),
            Err(_) => Err(ClassificationError::MalformedLine {
                line: String::from_utf8_lossy(&buf).into_owned(),
                reason: MalformedReason::InvalidUtf8,
            }),
        };

        match result {
            Ok(record) => {
                stats.classified += 1;
                emit(record)?;
            }
            Err(error) => {
                warn!("{}:{}: {}", source, stats.lines, error);
                stats.malformed += 1;
                budget.charge(error)?;
            }
        }
    }

    debug!(
        "Scanned {}: {} lines, {} malformed",
        source, stats.lines, stats.malformed
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::record::RecordType;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    const SAMPLE: &str = "201701\taaaee\trukc\t2\n201701\taaaf\t3\n201701\taaagh\there\t7\n";

    fn collect(source: &InputSource, tolerance: u64) -> (JobResult<ScanStats>, Vec<ClassifiedRecord>) {
        let budget = MalformedBudget::new(tolerance);
        let abort = AbortSignal::new();
        let mut records = Vec::new();
        let result = scan_source(source, &budget, &abort, |r| {
            records.push(r);
            Ok(())
        });
        (result, records)
    }

    #[test]
    fn test_scan_memory_source() {
        let source = InputSource::memory("sample", SAMPLE);
        let (stats, records) = collect(&source, 0);

        let stats = stats.unwrap();
        assert_eq!(stats.lines, 3);
        assert_eq!(stats.classified, 3);
        assert_eq!(records[1].record_type, RecordType::Frequency);
    }

    #[test]
    fn test_missing_trailing_newline() {
        let source = InputSource::memory("sample", "201701\taa\t1\n201701\tbb\t2");
        let (stats, records) = collect(&source, 0);
        assert_eq!(stats.unwrap().lines, 2);
        assert_eq!(records[1].count, 2);
    }

    #[test]
    fn test_malformed_within_tolerance() {
        let source = InputSource::memory("sample", "201701\taa\n201701\tbb\t2\n");
        let (stats, records) = collect(&source, 1);

        let stats = stats.unwrap();
        assert_eq!(stats.malformed, 1);
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_malformed_beyond_tolerance() {
        let source = InputSource::memory("sample", "201701\taa\n");
        let (stats, _) = collect(&source, 0);
        assert!(matches!(
            stats,
            Err(JobError::Classification(ClassificationError::MalformedLine { .. }))
        ));
    }

    #[test]
    fn test_invalid_utf8_is_malformed() {
        let source = InputSource::memory("sample", b"201701\t\xff\t1\n".to_vec());
        let (stats, records) = collect(&source, 1);
        assert_eq!(stats.unwrap().malformed, 1);
        assert!(records.is_empty());
    }

    #[test]
    fn test_budget_is_shared() {
        let budget = MalformedBudget::new(1);
        let other = budget.clone();
        let error = ClassificationError::MalformedLine {
            line: String::new(),
            reason: MalformedReason::FieldCount(1),
        };

        assert!(budget.charge(error.clone()).is_ok());
        assert!(other.charge(error).is_err());
        assert_eq!(budget.seen(), 2);
    }

    #[test]
    fn test_abort_stops_scan() {
        let source = InputSource::memory("sample", SAMPLE);
        let budget = MalformedBudget::new(0);
        let abort = AbortSignal::new();
        abort.raise();

        let result = scan_source(&source, &budget, &abort, |_| Ok(()));
        assert!(matches!(result, Err(JobError::Aborted)));
    }

    #[test]
    fn test_emit_failure_stops_scan() {
        let source = InputSource::memory("sample", SAMPLE);
        let budget = MalformedBudget::new(0);
        let abort = AbortSignal::new();
        let mut emitted = 0;

        let result = scan_source(&source, &budget, &abort, |_| {
            emitted += 1;
            Err(JobError::Aborted)
        });
        assert!(matches!(result, Err(JobError::Aborted)));
        assert_eq!(emitted, 1);
    }

    #[test]
    fn test_gzip_file_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("part-00000.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(SAMPLE.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let (stats, records) = collect(&InputSource::file(&path), 0);
        assert_eq!(stats.unwrap().classified, 3);
        assert_eq!(records[2].secondary_key, "here");
    }

    #[test]
    fn test_missing_file() {
        let (stats, _) = collect(&InputSource::file("/nonexistent/input.tsv"), 0);
        assert!(matches!(stats, Err(JobError::Input { .. })));
    }
}
