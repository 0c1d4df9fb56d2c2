//! File-backed state store.
//!
//! # Responsibilities
//! - Persist breaker fields as a JSON object on disk
//! - Make writes from one process visible to every other process using the
//!   same file
//!
//! # Design Decisions
//! - Every operation re-reads the file; nothing is cached between calls
//! - Each write holds an exclusive OS lock on `<file>.lock` across its
//!   read-modify-write, so writers in different processes never drop each
//!   other's keys even when they hold different breaker locks
//! - Writes go to a temporary sibling and are renamed into place, so readers
//!   never observe a half-written file
//! - A missing file is an empty store

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use uuid::Uuid;

use crate::lock::file::open_lock_file;
use crate::store::{StateStore, StoreError, StoreResult, StoreValue};

type Snapshot = HashMap<String, StoreValue>;

/// A store persisted to a single JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Sidecar whose OS lock serializes writers across processes.
    guard_path: PathBuf,
}

impl FileStore {
    /// Open (or lazily create) a store at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut guard_name = path.file_name().unwrap_or_default().to_os_string();
        guard_name.push(".lock");
        let guard_path = path.with_file_name(guard_name);

        tracing::debug!(path = %path.display(), "Opened file store");
        Ok(Self { path, guard_path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StoreResult<Snapshot> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Snapshot::new()),
            Err(e) => return Err(e.into()),
        };
        if file.metadata()?.len() == 0 {
            return Ok(Snapshot::new());
        }
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    fn save(&self, snapshot: &Snapshot) -> StoreResult<()> {
        let tmp = self
            .path
            .with_extension(format!("tmp-{}", Uuid::new_v4().simple()));
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(&mut writer, snapshot)?;
            writer.flush()?;
        }
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn modify(&self, f: impl FnOnce(&mut Snapshot)) -> StoreResult<()> {
        let guard = open_lock_file(&self.guard_path)?;
        guard.lock_exclusive()?;

        let mut snapshot = self.load()?;
        f(&mut snapshot);
        let result = self.save(&snapshot);

        // Dropping the handle releases the lock even if this fails
        let _ = FileExt::unlock(&guard);
        result
    }
}

impl StateStore for FileStore {
    fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.load()?.contains_key(key))
    }

    fn retrieve(&self, key: &str) -> StoreResult<StoreValue> {
        self.load()?
            .remove(key)
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
    }

    fn store(&self, key: &str, value: StoreValue) -> StoreResult<()> {
        self.modify(|snapshot| {
            snapshot.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.modify(|snapshot| {
            snapshot.remove(key);
        })
    }
}
