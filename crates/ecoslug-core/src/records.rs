//! Local record persistence for the tracked data set.
//!
//! The tracker keeps a handful of logical records (settings, pesticide log,
//! pest counts, last application date) plus the `lastCloudSync` marker used by
//! the sync coordinator. Values are stored as raw strings; interpretation is
//! left to the callers.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

/// Result type alias for record store operations.
pub type RecordResult<T> = Result<T, RecordError>;

/// Errors raised by a [`LocalRecordStore`] implementation.
#[derive(Debug, Error)]
pub enum RecordError {
    /// IO error while reading or writing the backing file
    #[error("Record store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error for the backing document
    #[error("Record store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Keys for the logical records tracked locally.
///
/// The string names double as the JSON field names of the cloud payload
/// (except [`RecordKey::LastCloudSync`], which never leaves the device).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKey {
    /// Tracker settings (JSON object)
    Settings,
    /// Pesticide application log (JSON array)
    Log,
    /// Per-day pest count data (JSON object)
    PestCount,
    /// Timestamp of the most recent pesticide application
    LastApplication,
    /// Timestamp of the last successful cloud sync
    LastCloudSync,
}

impl RecordKey {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Settings => "settings",
            Self::Log => "log",
            Self::PestCount => "pestCount",
            Self::LastApplication => "lastApplication",
            Self::LastCloudSync => "lastCloudSync",
        }
    }
}

/// Key/value persistence for the tracked records.
///
/// Implementations are assumed single-writer while a sync operation is in
/// flight; the coordinator provides no locking beyond its own state flag.
pub trait LocalRecordStore: Send + Sync {
    fn get(&self, key: RecordKey) -> RecordResult<Option<String>>;

    fn set(&self, key: RecordKey, value: &str) -> RecordResult<()>;

    /// Apply a batch of writes atomically: either every entry lands or none do.
    fn set_batch(&self, entries: &[(RecordKey, String)]) -> RecordResult<()>;
}

/// In-memory record store for tests and embedding.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<Mutex<HashMap<RecordKey, String>>>,
}

impl MemoryRecordStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RecordKey, String>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LocalRecordStore for MemoryRecordStore {
    fn get(&self, key: RecordKey) -> RecordResult<Option<String>> {
        Ok(self.lock().get(&key).cloned())
    }

    fn set(&self, key: RecordKey, value: &str) -> RecordResult<()> {
        self.lock().insert(key, value.to_string());
        Ok(())
    }

    fn set_batch(&self, entries: &[(RecordKey, String)]) -> RecordResult<()> {
        let mut map = self.lock();
        for (key, value) in entries {
            map.insert(*key, value.clone());
        }
        Ok(())
    }
}

/// File-backed record store persisting all records as one JSON document.
///
/// Every mutation rewrites the whole file, so a batch is applied in a single
/// write and a failed batch leaves the previous document in place.
#[derive(Debug, Clone)]
pub struct JsonFileRecordStore {
    path: PathBuf,
}

impl JsonFileRecordStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> RecordResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, records: &BTreeMap<String, String>) -> RecordResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(records)?;
        // Stage and rename so an interrupted write cannot truncate the
        // previous document.
        let staging = self.staging_path();
        std::fs::write(&staging, serialized)?;
        std::fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl LocalRecordStore for JsonFileRecordStore {
    fn get(&self, key: RecordKey) -> RecordResult<Option<String>> {
        Ok(self.load()?.get(key.as_str()).cloned())
    }

    fn set(&self, key: RecordKey, value: &str) -> RecordResult<()> {
        let mut records = self.load()?;
        records.insert(key.as_str().to_string(), value.to_string());
        self.save(&records)
    }

    fn set_batch(&self, entries: &[(RecordKey, String)]) -> RecordResult<()> {
        let mut records = self.load()?;
        for (key, value) in entries {
            records.insert(key.as_str().to_string(), value.clone());
        }
        self.save(&records)
    }
}
