//! Flat persisted filesystem.
//!
//! [`FlatFs`] emulates a tree with one flat map from canonical address to
//! [`FlatRecord`]. The whole map is the unit of persistence: every mutation
//! serializes it to JSON and writes it back to the [`StorageArea`] before the
//! call returns.
//!
//! This store is thinner than [`InMemoryFs`](super::InMemoryFs):
//!
//! | Operation    | Behavior                                                  |
//! |--------------|-----------------------------------------------------------|
//! | `read_dir`   | always returns an empty listing                           |
//! | `mkdir`      | `EEXIST` if the key exists; no ancestor checks            |
//! | `write_file` | overwrites any record, even a directory (no `EISDIR`)     |
//!
//! # Consistency
//!
//! The in-memory map is updated under a lock, serialized, and the lock is
//! released before the storage write is awaited. Two overlapping mutations
//! may therefore persist in either order, and the last full write wins.
//! Callers that need more must serialize writers themselves.

// RwLock.read()/write().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use super::address::{Address, DEFAULT_BASE};
use super::storage::StorageArea;
use super::traits::{DirEntry, FileSystem, FileType, Metadata};
use crate::error::{Error, Result, SetupError};
use crate::logging::{fs_debug, fs_trace};

/// Default prefix of the storage key holding a store's records.
pub const DEFAULT_KEY_PREFIX: &str = "mountfs-flat";

/// A persisted entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FlatRecord {
    /// Directory marker.
    Directory,
    /// File with base64-encoded content.
    File { content: String },
}

impl FlatRecord {
    fn file_type(&self) -> FileType {
        match self {
            FlatRecord::Directory => FileType::Directory,
            FlatRecord::File { .. } => FileType::File,
        }
    }
}

/// Filesystem persisted as one flat map in a [`StorageArea`].
///
/// # Example
///
/// ```rust
/// use mountfs::{FileSystem, FlatFs, MemoryStorageArea};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let storage = Arc::new(MemoryStorageArea::new());
///
/// let fs = FlatFs::open("workspace", storage.clone()).await?;
/// fs.write_file("file:///notes.txt", b"remember").await?;
///
/// // A second instance over the same storage sees the persisted state
/// let reopened = FlatFs::open("workspace", storage).await?;
/// assert_eq!(reopened.read_file("file:///notes.txt").await?, b"remember");
/// # Ok(())
/// # }
/// ```
pub struct FlatFs {
    key: String,
    storage: Arc<dyn StorageArea>,
    records: RwLock<BTreeMap<String, FlatRecord>>,
}

impl FlatFs {
    /// Open the store `id`, loading any state previously persisted under the
    /// default key prefix.
    pub async fn open(
        id: &str,
        storage: Arc<dyn StorageArea>,
    ) -> std::result::Result<Self, SetupError> {
        Self::open_with_prefix(DEFAULT_KEY_PREFIX, id, storage).await
    }

    /// Open the store `id` under a custom key prefix.
    pub async fn open_with_prefix(
        prefix: &str,
        id: &str,
        storage: Arc<dyn StorageArea>,
    ) -> std::result::Result<Self, SetupError> {
        let key = format!("{prefix}-{id}");
        let records = match storage.get_item(&key).await? {
            Some(text) => {
                serde_json::from_str(&text).map_err(|e| SetupError::CorruptState {
                    key: key.clone(),
                    reason: e.to_string(),
                })?
            }
            None => BTreeMap::new(),
        };
        fs_debug!(key = %key, "flat store opened");

        Ok(Self {
            key,
            storage,
            records: RwLock::new(records),
        })
    }

    /// Storage key holding this store's records.
    pub fn storage_key(&self) -> &str {
        &self.key
    }

    /// Number of records (files and directories).
    pub fn len(&self) -> usize {
        self.records.read().unwrap().len()
    }

    /// True when no records exist.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Canonical key for an address: trailing slash stripped, `//` collapsed.
    fn key_for(address: &str) -> Result<String> {
        Ok(Address::parse(address, DEFAULT_BASE)?.to_string())
    }

    /// Apply `mutate` to a copy of the map, persist the copy, then install it.
    ///
    /// The in-memory map only changes once the storage area accepted the
    /// new state.
    async fn mutate<F>(&self, key: &str, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, FlatRecord>) -> Result<()>,
    {
        let mut next = self.records.read().unwrap().clone();
        mutate(&mut next)?;
        let serialized = serde_json::to_string(&next).map_err(|e| Error::medium(key, e))?;

        fs_trace!(key = %self.key, bytes = serialized.len(), "flat store persist");
        self.storage
            .set_item(&self.key, &serialized)
            .await
            .map_err(|e| Error::medium(key, e))?;

        *self.records.write().unwrap() = next;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<FlatRecord> {
        let records = self.records.read().unwrap();
        records
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))
    }
}

#[async_trait]
impl FileSystem for FlatFs {
    async fn mkdir(&self, address: &str, _recursive: bool) -> Result<()> {
        let key = Self::key_for(address)?;
        self.mutate(&key, |records| {
            if records.contains_key(&key) {
                return Err(Error::AlreadyExists(key.clone()));
            }
            records.insert(key.clone(), FlatRecord::Directory);
            Ok(())
        })
        .await
    }

    async fn read_dir(&self, address: &str) -> Result<Vec<DirEntry>> {
        // Enumerating children would need a prefix scan; listing is not
        // supported by this store.
        Self::key_for(address)?;
        Ok(Vec::new())
    }

    async fn read_file(&self, address: &str) -> Result<Vec<u8>> {
        let key = Self::key_for(address)?;
        match self.get(&key)? {
            FlatRecord::File { content } => {
                STANDARD.decode(content).map_err(|e| Error::medium(&key, e))
            }
            FlatRecord::Directory => Err(Error::IsADirectory(key)),
        }
    }

    async fn write_file(&self, address: &str, content: &[u8]) -> Result<()> {
        let key = Self::key_for(address)?;
        let record = FlatRecord::File {
            content: STANDARD.encode(content),
        };
        self.mutate(&key, |records| {
            records.insert(key.clone(), record);
            Ok(())
        })
        .await
    }

    async fn stat(&self, address: &str) -> Result<Metadata> {
        let key = Self::key_for(address)?;
        let record = self.get(&key)?;
        Ok(Metadata {
            file_type: record.file_type(),
        })
    }

    async fn remove(&self, address: &str) -> Result<()> {
        let key = Self::key_for(address)?;
        self.mutate(&key, |records| {
            records
                .remove(&key)
                .map(|_| ())
                .ok_or_else(|| Error::NotFound(key.clone()))
        })
        .await
    }
}
