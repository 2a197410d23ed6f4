//! Physical output sinks
//!
//! A [`SinkProvider`] opens one physical part per (destination, bucket).
//! Parts are staged until the whole job succeeded; `commit` publishes them,
//! `discard` removes every staged part so no incomplete file is left behind.

use crate::config::Compression;
use flate2::write::GzEncoder;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Marker written into the output directory after a successful commit
pub const SUCCESS_MARKER: &str = "_SUCCESS";
const STAGING_SUFFIX: &str = ".partial";

/// An open physical part
pub trait OutputSink: Write + Send {
    /// Flush and close; the part stays staged until committed
    fn finish(self: Box<Self>) -> io::Result<()>;
}

pub trait SinkProvider: Send + Sync {
    fn open(&self, destination: &str, part: &str) -> io::Result<Box<dyn OutputSink>>;

    /// Publish all finished parts; returns their final locations
    fn commit(&self) -> io::Result<Vec<PathBuf>>;

    /// Drop every staged part
    fn discard(&self);
}

/// Physical file name for one part: `<destination>-<bucket>.<ext>`
pub fn part_file_name(destination: &str, part: &str, compression: Compression) -> String {
    format!(
        "{}-{}.{}",
        destination,
        escape_part(part),
        compression.extension()
    )
}

/// Buckets come from input data; keep them to a safe file name alphabet.
///
/// `-` is escaped as well, so the last `-` in a file name always separates
/// the destination from the bucket and no two parts share a name.
fn escape_part(part: &str) -> String {
    let mut escaped = String::with_capacity(part.len());
    for byte in part.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' => escaped.push(byte as char),
            _ => escaped.push_str(&format!("%{byte:02X}")),
        }
    }
    escaped
}

#[derive(Debug, Clone)]
struct StagedFile {
    staging: PathBuf,
    target: PathBuf,
}

/// Writes parts as files under one output directory
pub struct FileSinkProvider {
    dir: PathBuf,
    compression: Compression,
    staged: Arc<Mutex<Vec<StagedFile>>>,
}

impl FileSinkProvider {
    pub fn new(dir: impl Into<PathBuf>, compression: Compression) -> Self {
        Self {
            dir: dir.into(),
            compression,
            staged: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn staged(&self) -> Vec<StagedFile> {
        lock(&self.staged).clone()
    }
}

impl SinkProvider for FileSinkProvider {
    fn open(&self, destination: &str, part: &str) -> io::Result<Box<dyn OutputSink>> {
        fs::create_dir_all(&self.dir)?;

        let target = self
            .dir
            .join(part_file_name(destination, part, self.compression));
        let mut staging = target.clone().into_os_string();
        staging.push(STAGING_SUFFIX);
        let staging = PathBuf::from(staging);

        // Held until the part is registered so two workers cannot claim one name
        let mut staged = lock(&self.staged);
        if target.exists() || staged.iter().any(|file| file.target == target) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("output {} already exists", target.display()),
            ));
        }

        let file = BufWriter::new(File::create(&staging)?);
        debug!("Staging output part {}", staging.display());
        staged.push(StagedFile { staging, target });
        drop(staged);

        let writer = match self.compression {
            Compression::None => FileWriter::Plain(file),
            Compression::Gzip => {
                FileWriter::Gzip(GzEncoder::new(file, flate2::Compression::default()))
            }
        };
        Ok(Box::new(writer))
    }

    /// Rename every staged part into place, then write the marker.
    ///
    /// If any step fails, parts already renamed are moved back to their
    /// staging names so a later `discard` leaves no output behind.
    fn commit(&self) -> io::Result<Vec<PathBuf>> {
        fs::create_dir_all(&self.dir)?;

        let mut committed: Vec<StagedFile> = Vec::new();
        let result = self.staged().into_iter().try_for_each(|file| {
            fs::rename(&file.staging, &file.target)?;
            committed.push(file);
            Ok::<(), io::Error>(())
        });
        let result =
            result.and_then(|()| File::create(self.dir.join(SUCCESS_MARKER)).map(|_| ()));

        if let Err(e) = result {
            rollback(&committed);
            return Err(e);
        }

        lock(&self.staged).clear();
        let mut targets: Vec<PathBuf> = committed.into_iter().map(|file| file.target).collect();
        targets.sort();
        Ok(targets)
    }

    fn discard(&self) {
        for file in self.staged() {
            if let Err(e) = fs::remove_file(&file.staging) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(
                        "Failed to remove staged output {}: {}",
                        file.staging.display(),
                        e
                    );
                }
            }
        }
        lock(&self.staged).clear();
    }
}

fn rollback(committed: &[StagedFile]) {
    for file in committed {
        if let Err(e) = fs::rename(&file.target, &file.staging) {
            warn!(
                "Failed to roll back {}: {}; removing it",
                file.target.display(),
                e
            );
            if let Err(e) = fs::remove_file(&file.target) {
                warn!("Failed to remove {}: {}", file.target.display(), e);
            }
        }
    }
}

enum FileWriter {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
        }
    }
}

impl OutputSink for FileWriter {
    fn finish(self: Box<Self>) -> io::Result<()> {
        let mut file = match *self {
            Self::Plain(w) => w,
            Self::Gzip(w) => w.finish()?,
        };
        file.flush()?;
        file.get_ref().sync_all()
    }
}

type PartMap = BTreeMap<String, Vec<u8>>;

/// Keeps parts in memory, keyed by `<destination>-<part>`
#[derive(Clone, Default)]
pub struct MemorySinkProvider {
    staged: Arc<Mutex<PartMap>>,
    committed: Arc<Mutex<PartMap>>,
}

impl MemorySinkProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed parts and their contents
    pub fn committed(&self) -> BTreeMap<String, String> {
        lock(&self.committed)
            .iter()
            .map(|(name, bytes)| (name.clone(), String::from_utf8_lossy(bytes).into_owned()))
            .collect()
    }

    pub fn staged_count(&self) -> usize {
        lock(&self.staged).len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl SinkProvider for MemorySinkProvider {
    fn open(&self, destination: &str, part: &str) -> io::Result<Box<dyn OutputSink>> {
        Ok(Box::new(MemorySink {
            name: format!("{destination}-{}", escape_part(part)),
            buffer: Vec::new(),
            staged: Arc::clone(&self.staged),
        }))
    }

    fn commit(&self) -> io::Result<Vec<PathBuf>> {
        let staged = std::mem::take(&mut *lock(&self.staged));
        let names = staged.keys().map(PathBuf::from).collect();
        lock(&self.committed).extend(staged);
        Ok(names)
    }

    fn discard(&self) {
        lock(&self.staged).clear();
    }
}

struct MemorySink {
    name: String,
    buffer: Vec<u8>,
    staged: Arc<Mutex<PartMap>>,
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl OutputSink for MemorySink {
    fn finish(self: Box<Self>) -> io::Result<()> {
        let sink = *self;
        lock(&sink.staged)
            .entry(sink.name)
            .or_default()
            .extend(sink.buffer);
        Ok(())
    }
}
