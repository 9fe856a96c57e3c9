//! Durable whole-collection snapshot storage.
//!
//! Each collection (patients, instrument sets, service requests, doctors) is read and written
//! as a single JSON document under a key. There are no partial updates and no migrations: the
//! owning repository reads its collection once at load time and rewrites all of it after every
//! mutation.
//!
//! ## Storage Layout
//!
//! ```text
//! <data_dir>/
//!   patients.json
//!   instruments.json
//!   service_requests.json
//!   doctors.json
//! ```

use crate::constants::SNAPSHOT_FILE_EXTENSION;
use crate::validation::validate_store_key;
use crate::{CareError, CareResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Whole-snapshot read/write keyed by collection name.
pub trait SnapshotStore: Send + Sync {
    /// Returns the stored payload, or `None` when the key has never been written.
    fn read(&self, key: &str) -> CareResult<Option<String>>;

    /// Replaces the payload stored under `key`.
    fn write(&self, key: &str, payload: &str) -> CareResult<()>;
}

/// Stores each collection as `<dir>/<key>.json`.
///
/// Writes go to a sibling temporary file first and are then renamed into place, so a reader
/// never observes a half-written collection.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`CareError::StorageDirCreation`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> CareResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(CareError::StorageDirCreation)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> CareResult<PathBuf> {
        validate_store_key(key)?;
        Ok(self.dir.join(format!("{key}.{SNAPSHOT_FILE_EXTENSION}")))
    }
}

impl SnapshotStore for JsonFileStore {
    fn read(&self, key: &str) -> CareResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CareError::FileRead {
                key: key.to_string(),
                source: e,
            }),
        }
    }

    fn write(&self, key: &str, payload: &str) -> CareResult<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension(format!("{SNAPSHOT_FILE_EXTENSION}.tmp"));

        let to_write_error = |e| CareError::FileWrite {
            key: key.to_string(),
            source: e,
        };
        fs::write(&tmp, payload).map_err(to_write_error)?;
        fs::rename(&tmp, &path).map_err(to_write_error)
    }
}

/// Process-local store, used by tests and by embedders that do not need durability.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

impl SnapshotStore for MemoryStore {
    fn read(&self, key: &str) -> CareResult<Option<String>> {
        validate_store_key(key)?;
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn write(&self, key: &str, payload: &str) -> CareResult<()> {
        validate_store_key(key)?;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), payload.to_string());
        Ok(())
    }
}

/// Memory store that starts refusing writes once told to.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FailingStore {
    inner: MemoryStore,
    refuse_writes: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl FailingStore {
    pub(crate) fn refuse_writes(&self) {
        self.refuse_writes.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl SnapshotStore for FailingStore {
    fn read(&self, key: &str) -> CareResult<Option<String>> {
        self.inner.read(key)
    }

    fn write(&self, key: &str, payload: &str) -> CareResult<()> {
        if self.refuse_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(CareError::FileWrite {
                key: key.to_string(),
                source: std::io::Error::other("no space left on device"),
            });
        }
        self.inner.write(key, payload)
    }
}

/// Reads and decodes a whole collection. `None` means the key is missing.
pub(crate) fn load_collection<T: DeserializeOwned>(
    store: &dyn SnapshotStore,
    key: &str,
) -> CareResult<Option<Vec<T>>> {
    let Some(raw) = store.read(key)? else {
        return Ok(None);
    };

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| CareError::Deserialization {
            key: key.to_string(),
            source,
        })
}

/// Encodes and writes a whole collection.
pub(crate) fn save_collection<T: Serialize>(
    store: &dyn SnapshotStore,
    key: &str,
    items: &[T],
) -> CareResult<()> {
    let raw = serde_json::to_string_pretty(items).map_err(|source| CareError::Serialization {
        key: key.to_string(),
        source,
    })?;
    store.write(key, &raw)
}
