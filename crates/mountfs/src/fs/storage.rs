//! Persisted key/value storage areas.
//!
//! A [`StorageArea`] is the durable medium behind [`FlatFs`](super::FlatFs):
//! a flat string-to-string map in the shape of a browser's local storage.
//!
//! - [`MemoryStorageArea`]: process-local map with an optional byte quota
//! - [`DiskStorageArea`]: one file per key inside a host directory

// RwLock.read()/write().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

/// Storage medium failure.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Writing the value would exceed the area's quota.
    #[error("quota exceeded: {needed} bytes needed, {quota} bytes allowed")]
    QuotaExceeded { needed: usize, quota: usize },

    /// Key cannot be represented by this medium.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// I/O error from the underlying medium.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Async key/value storage.
#[async_trait]
pub trait StorageArea: Send + Sync {
    /// Value stored under `key`, if any.
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Missing keys are ignored.
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory storage area.
///
/// Quota accounting counts key and value bytes, like browsers do for local
/// storage.
#[derive(Debug, Default)]
pub struct MemoryStorageArea {
    items: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStorageArea {
    /// Create an empty, unbounded storage area.
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit total stored bytes.
    pub fn with_quota(mut self, bytes: usize) -> Self {
        self.quota = Some(bytes);
        self
    }

    /// Total key and value bytes currently stored.
    pub fn used_bytes(&self) -> usize {
        let items = self.items.read().unwrap();
        items.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

#[async_trait]
impl StorageArea for MemoryStorageArea {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.read().unwrap();
        Ok(items.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().unwrap();

        if let Some(quota) = self.quota {
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.write().unwrap();
        items.remove(key);
        Ok(())
    }
}

/// Storage area persisting each key as a file `<dir>/<key>.json`.
///
/// Keys are restricted to ASCII alphanumerics, `-`, `_` and `.` so they map
/// one-to-one onto file names.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct DiskStorageArea {
    dir: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl DiskStorageArea {
    /// Use `dir` as the storage directory. It is created on first write.
    pub fn new(dir: impl Into<std::path::PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The storage directory.
    pub fn dir(&self) -> &std::path::Path {
        &self.dir
    }

    fn item_path(&self, key: &str) -> Result<std::path::PathBuf, StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[async_trait]
impl StorageArea for DiskStorageArea {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.item_path(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.item_path(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, value).await?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let path = self.item_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
