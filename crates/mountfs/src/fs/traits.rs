//! Filesystem trait definitions

use async_trait::async_trait;
use std::sync::Arc;

use super::watch::{FsWatcher, noop_watcher};
use crate::error::Result;

/// Async filesystem trait.
///
/// Every backing store and the [`MountFs`](super::MountFs) router implement
/// this trait. Addresses are `file:///...` strings; each store rejects
/// addresses outside its base with `EACCES`.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Create a directory.
    ///
    /// With `recursive`, missing ancestors are created and an existing
    /// directory at the address is accepted.
    async fn mkdir(&self, address: &str, recursive: bool) -> Result<()>;

    /// Read directory entries.
    async fn read_dir(&self, address: &str) -> Result<Vec<DirEntry>>;

    /// Read a file's contents.
    async fn read_file(&self, address: &str) -> Result<Vec<u8>>;

    /// Create or replace a file with `content`.
    async fn write_file(&self, address: &str, content: &[u8]) -> Result<()>;

    /// Get entry metadata.
    async fn stat(&self, address: &str) -> Result<Metadata>;

    /// Remove a file or directory (with its whole subtree).
    async fn remove(&self, address: &str) -> Result<()>;

    /// Begin watching a set of addresses.
    ///
    /// Stores without live change notification return the shared
    /// [`NoopWatcher`](super::NoopWatcher).
    fn watch(&self, _addresses: &[String]) -> Arc<dyn FsWatcher> {
        noop_watcher()
    }

    /// Change permissions. Accepted everywhere, enforced nowhere.
    async fn chmod(&self, _address: &str, _mode: u32) -> Result<()> {
        Ok(())
    }
}

/// File type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Regular file
    File,
    /// Directory
    Directory,
}

impl FileType {
    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }
}

/// Entry metadata returned by `stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    /// Entry type
    pub file_type: FileType,
}

impl Metadata {
    /// Metadata for a file.
    pub fn file() -> Self {
        Self {
            file_type: FileType::File,
        }
    }

    /// Metadata for a directory.
    pub fn directory() -> Self {
        Self {
            file_type: FileType::Directory,
        }
    }

    /// Check if this entry is a file.
    pub fn is_file(&self) -> bool {
        self.file_type.is_file()
    }

    /// Check if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.file_type.is_dir()
    }

    /// Symbolic links do not exist in this filesystem; always false.
    pub fn is_symlink(&self) -> bool {
        false
    }
}

/// Directory entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name (not full address)
    pub name: String,
    /// Entry metadata
    pub metadata: Metadata,
}

impl DirEntry {
    /// Build a listing entry.
    pub fn new(name: impl Into<String>, file_type: FileType) -> Self {
        Self {
            name: name.into(),
            metadata: Metadata { file_type },
        }
    }

    /// Check if this entry is a file.
    pub fn is_file(&self) -> bool {
        self.metadata.is_file()
    }

    /// Check if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.metadata.is_dir()
    }

    /// Always false.
    pub fn is_symlink(&self) -> bool {
        false
    }
}
