use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Task;

/// Namespace key under which the canonical task collection is persisted.
pub const TASKS_KEY: &str = "storedTasks";

/// Opaque key/value persistence for whole blobs.
///
/// Each call reads or replaces an entire blob; partial writes are never observable.
pub trait BlobStore: Send + Sync {
    /// Returns `None` when nothing has been stored under `key` yet.
    fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn write_blob(&self, key: &str, bytes: &[u8]) -> Result<()>;
}

/// Returns the default data directory.
///
/// The path is determined in the following order:
/// 1. `CADENCE_DATA_DIR` environment variable.
/// 2. `~/.local/share/cadence` (on Linux).
/// 3. `./` (fallback).
pub fn default_data_dir() -> PathBuf {
    std::env::var("CADENCE_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let mut p = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
            p.push("cadence");
            p
        })
}

/// Stores each blob as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the file backing `key`.
    pub fn blob_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl BlobStore for FileBlobStore {
    fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.blob_path(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes to a temporary file in the same directory, then renames it over
    /// the target so readers see either the old or the new blob.
    fn write_blob(&self, key: &str, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.blob_path(key);
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        temp.write_all(bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|err| Error::Persist {
            path: path.clone(),
            message: err.error.to_string(),
        })?;
        debug!(path = %path.display(), bytes = bytes.len(), "wrote blob");
        Ok(())
    }
}

/// In-memory blob store with switchable failures, used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    inner: Arc<Mutex<MemoryInner>>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    blobs: HashMap<String, Vec<u8>>,
    fail_reads: bool,
    fail_writes: bool,
    writes: usize,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // A poisoned lock only means a test panicked mid-call; the map is still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, key: &str, bytes: impl Into<Vec<u8>>) {
        self.lock().blobs.insert(key.to_string(), bytes.into());
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().blobs.get(key).cloned()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Number of successful writes so far.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }
}

impl BlobStore for MemoryBlobStore {
    fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let inner = self.lock();
        if inner.fail_reads {
            return Err(Error::Io(std::io::Error::other("blob store unavailable")));
        }
        Ok(inner.blobs.get(key).cloned())
    }

    fn write_blob(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(Error::Io(std::io::Error::other("blob store unavailable")));
        }
        inner.blobs.insert(key.to_string(), bytes.to_vec());
        inner.writes += 1;
        Ok(())
    }
}

/// Encodes and decodes the canonical task collection under [`TASKS_KEY`].
#[derive(Clone)]
pub struct LocalTaskStore {
    blobs: Arc<dyn BlobStore>,
}

impl LocalTaskStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Reads the raw blob without decoding it.
    pub fn read_raw(&self) -> Result<Option<Vec<u8>>> {
        self.blobs.read_blob(TASKS_KEY)
    }

    /// Loads all tasks from the store.
    ///
    /// Returns `Ok(None)` if nothing has been persisted yet.
    pub fn load_tasks(&self) -> Result<Option<Vec<Task>>> {
        match self.read_raw()? {
            Some(bytes) => decode_tasks(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Saves the given list of tasks, replacing the previous snapshot.
    pub fn save_tasks(&self, tasks: &[Task]) -> Result<()> {
        let bytes = encode_tasks(tasks)?;
        self.blobs.write_blob(TASKS_KEY, &bytes)
    }
}

pub fn encode_tasks(tasks: &[Task]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(tasks)?)
}

pub fn decode_tasks(bytes: &[u8]) -> Result<Vec<Task>> {
    Ok(serde_json::from_slice(bytes)?)
}
