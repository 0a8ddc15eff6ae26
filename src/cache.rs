//! Key-value checkpoint storage for intermediate pipeline results
//!
//! The pipeline memoizes its expensive steps (the full message list and one
//! sender tally per chunk) under string keys. [`CheckpointStore`] is the
//! byte-level backend seam; [`BlobCache`] layers JSON encoding on top and
//! turns every storage or decoding failure into a logged cache miss.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, error, info};

use crate::error::{GmailError, Result};

/// Key of the persisted message list
pub const MESSAGES_KEY: &str = "messages";

/// Key of the persisted final sender tally
pub const SENDER_COUNTS_KEY: &str = "senders_count/senders_count";

/// Key of the sender tally for a 1-based chunk index
pub fn chunk_key(index: usize) -> String {
    format!("senders_count/senders_count_{}", index)
}

/// Storage backend for opaque blobs
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Fetch the blob stored under `key`, `None` if there is none
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous blob
    async fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Delete the blob under `key`; missing keys are not an error
    async fn remove(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl<S: CheckpointStore + ?Sized> CheckpointStore for std::sync::Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.as_ref().get(key).await
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.as_ref().put(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.as_ref().remove(key).await
    }
}

/// One JSON file per key under a root directory
///
/// Key segments separated by `/` become subdirectories, so
/// `senders_count/senders_count_3` lives at
/// `<root>/senders_count/senders_count_3.json`.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to its file, rejecting keys that escape the root
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(GmailError::CacheError(format!("Invalid cache key: {:?}", key)));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl CheckpointStore for FsStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write-then-rename so a crash never leaves a truncated entry behind
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local store, mostly for tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|e| GmailError::CacheError(format!("Memory store poisoned: {}", e)))
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// Single-file SQLite store
#[cfg(feature = "cache")]
pub struct SqliteStore {
    conn: Mutex<rusqlite::Connection>,
}

#[cfg(feature = "cache")]
impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = rusqlite::Connection::open(path).map_err(sqlite_error)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS blobs (
                key   TEXT PRIMARY KEY,
                value BLOB NOT NULL
            );
            "#,
        )
        .map_err(sqlite_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory().map_err(sqlite_error)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS blobs (key TEXT PRIMARY KEY, value BLOB NOT NULL);",
        )
        .map_err(sqlite_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, rusqlite::Connection>> {
        self.conn
            .lock()
            .map_err(|e| GmailError::CacheError(format!("SQLite connection poisoned: {}", e)))
    }
}

#[cfg(feature = "cache")]
fn sqlite_error(e: rusqlite::Error) -> GmailError {
    GmailError::CacheError(format!("SQLite error: {}", e))
}

#[cfg(feature = "cache")]
#[async_trait]
impl CheckpointStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        use rusqlite::OptionalExtension;

        self.conn()?
            .query_row(
                "SELECT value FROM blobs WHERE key = ?1",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(sqlite_error)
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO blobs (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                rusqlite::params![key, value],
            )
            .map_err(sqlite_error)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM blobs WHERE key = ?1", rusqlite::params![key])
            .map_err(sqlite_error)?;
        Ok(())
    }
}

/// Typed JSON view over a [`CheckpointStore`] that never fails its caller
pub struct BlobCache<S> {
    store: S,
}

impl<S: CheckpointStore> BlobCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load the value under `key`, or `T::default()` if it is missing or
    /// cannot be read or decoded
    pub async fn read<T>(&self, key: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        match self.store.get(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    info!("Loaded cached data from {}", key);
                    value
                }
                Err(e) => {
                    error!("Failed to decode cached data from {}: {}", key, e);
                    T::default()
                }
            },
            Ok(None) => {
                debug!("No cached data for {}", key);
                T::default()
            }
            Err(e) => {
                error!("Failed to load cached data from {}: {}", key, e);
                T::default()
            }
        }
    }

    /// Serialize and store `value` under `key`; failures are only logged
    pub async fn write<T>(&self, key: &str, value: &T)
    where
        T: Serialize + ?Sized,
    {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to serialize data for {}: {}", key, e);
                return;
            }
        };

        match self.store.put(key, &bytes).await {
            Ok(()) => info!("Wrote cached data to {}", key),
            Err(e) => error!("Failed to write cached data to {}: {}", key, e),
        }
    }

    /// Drop the entry under `key`; failures are only logged
    pub async fn invalidate(&self, key: &str) {
        if let Err(e) = self.store.remove(key).await {
            error!("Failed to remove cached data for {}: {}", key, e);
        }
    }
}
