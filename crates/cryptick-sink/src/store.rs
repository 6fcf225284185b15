//! Storage backends.
//!
//! A backend owns at most one object at a time: `create` opens it, `append`
//! adds lines, `finish` completes it. The filesystem backend streams lines
//! to disk as they arrive; the in-memory store holds the whole object back
//! until it is finished, the way an object-store upload would.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{SinkError, SinkResult};

/// Destination for partition files.
pub trait Backend: Send {
    /// Open a fresh object at `path`, failing if one already exists.
    fn create(&mut self, path: &Path) -> SinkResult<()>;

    /// Append one line to the open object.
    fn append(&mut self, line: &str) -> SinkResult<()>;

    /// Complete the open object. For stores that upload on completion this
    /// is the point where the object becomes visible.
    fn finish(&mut self) -> SinkResult<()>;
}

// ============================================================================
// Filesystem backend
// ============================================================================

/// Writes partition files under a root directory, creating the date
/// hierarchy on demand. Line buffered, so records hit the disk as whole
/// lines even if the process dies mid-partition.
pub struct FsBackend {
    root: PathBuf,
    file: Option<LineWriter<File>>,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            file: None,
        }
    }
}

impl Backend for FsBackend {
    fn create(&mut self, path: &Path) -> SinkResult<()> {
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => SinkError::AlreadyExists(full.clone()),
                _ => SinkError::Io(e),
            })?;

        debug!(path = %full.display(), "opened partition file");
        self.file = Some(LineWriter::new(file));
        Ok(())
    }

    fn append(&mut self, line: &str) -> SinkResult<()> {
        let file = self.file.as_mut().ok_or(SinkError::Closed)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    fn finish(&mut self) -> SinkResult<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }
        Ok(())
    }
}

// ============================================================================
// In-memory object store
// ============================================================================

/// Shared map of finished objects, addressed by partition path.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    objects: Arc<Mutex<HashMap<PathBuf, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contents of a finished object, if present.
    pub fn get(&self, path: &Path) -> Option<String> {
        self.objects.lock().get(path).cloned()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.objects.lock().contains_key(path)
    }

    /// Paths of every finished object, in no particular order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.objects.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    fn put(&self, path: PathBuf, body: String) {
        self.objects.lock().insert(path, body);
    }
}

/// Buffers the open object in memory and puts it to the store only on
/// `finish`. An unfinished partition is invisible to readers.
pub struct MemoryBackend {
    store: MemoryStore,
    /// Key prefix, so several backends can share one store.
    prefix: PathBuf,
    open: Option<(PathBuf, String)>,
}

impl MemoryBackend {
    pub fn new(store: MemoryStore) -> Self {
        Self::with_prefix(store, PathBuf::new())
    }

    pub fn with_prefix(store: MemoryStore, prefix: impl Into<PathBuf>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            open: None,
        }
    }
}

impl Backend for MemoryBackend {
    fn create(&mut self, path: &Path) -> SinkResult<()> {
        let key = self.prefix.join(path);
        if self.store.contains(&key) {
            return Err(SinkError::AlreadyExists(key));
        }
        self.open = Some((key, String::new()));
        Ok(())
    }

    fn append(&mut self, line: &str) -> SinkResult<()> {
        let (_, body) = self.open.as_mut().ok_or(SinkError::Closed)?;
        body.push_str(line);
        body.push('\n');
        Ok(())
    }

    fn finish(&mut self) -> SinkResult<()> {
        if let Some((path, body)) = self.open.take() {
            debug!(path = %path.display(), bytes = body.len(), "putting finished object");
            self.store.put(path, body);
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
