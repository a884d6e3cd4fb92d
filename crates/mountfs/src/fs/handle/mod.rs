//! Hierarchical directory-handle API.
//!
//! These traits describe an external storage API built from directory and
//! file handles: a directory handle can look up or create children by name,
//! enumerate them and remove them; a file handle can hand out its full
//! content and a writable stream. [`HandleFs`](super::HandleFs) adapts any
//! implementation to the [`FileSystem`](super::FileSystem) contract.
//!
//! Two implementations ship with the crate:
//!
//! - [`MemoryDirectoryHandle`]: in-process handle tree
//! - [`HostDirectoryHandle`]: host OS directories via `tokio::fs`

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

mod memory;
#[cfg(not(target_arch = "wasm32"))]
mod host;

#[cfg(not(target_arch = "wasm32"))]
pub use host::{HostDirectoryHandle, HostFileHandle, HostStorageManager};
pub use memory::{MemoryDirectoryHandle, MemoryFileHandle, MemoryStorageManager};

/// Errors raised by handle implementations, named after the conditions the
/// handle API distinguishes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    /// No entry with that name.
    #[error("entry not found")]
    NotFound,

    /// Entry exists but has the other kind.
    #[error("entry has the wrong kind")]
    TypeMismatch,

    /// Access refused by the host.
    #[error("not allowed")]
    NotAllowed,

    /// The entry cannot be modified this way (e.g. non-empty directory).
    #[error("invalid modification")]
    InvalidModification,

    /// Name is empty, contains a separator, or is `.`/`..`.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Underlying I/O failure.
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for HandleError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => HandleError::NotFound,
            std::io::ErrorKind::PermissionDenied => HandleError::NotAllowed,
            _ => HandleError::Io(e.to_string()),
        }
    }
}

/// Result type for handle operations.
pub type HandleResult<T> = std::result::Result<T, HandleError>;

/// Kind of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// File handle
    File,
    /// Directory handle
    Directory,
}

/// Access mode asked about in a permission query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionMode {
    /// Read only
    Read,
    /// Read and write
    ReadWrite,
}

/// Answer to a permission query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    /// Access granted
    Granted,
    /// Access refused
    Denied,
    /// The user would have to be asked
    Prompt,
}

/// Either kind of handle.
#[derive(Clone)]
pub enum Handle {
    /// A file
    File(Arc<dyn FileHandle>),
    /// A directory
    Directory(Arc<dyn DirectoryHandle>),
}

impl Handle {
    /// Entry name.
    pub fn name(&self) -> &str {
        match self {
            Handle::File(file) => file.name(),
            Handle::Directory(dir) => dir.name(),
        }
    }

    /// Entry kind.
    pub fn kind(&self) -> HandleKind {
        match self {
            Handle::File(_) => HandleKind::File,
            Handle::Directory(_) => HandleKind::Directory,
        }
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .finish()
    }
}

/// A directory in the handle API.
#[async_trait]
pub trait DirectoryHandle: Send + Sync {
    /// Directory name.
    fn name(&self) -> &str;

    /// Child directory `name`, created when missing and `create` is set.
    ///
    /// Fails with [`HandleError::TypeMismatch`] if `name` is a file.
    async fn get_directory_handle(
        &self,
        name: &str,
        create: bool,
    ) -> HandleResult<Arc<dyn DirectoryHandle>>;

    /// Child file `name`, created empty when missing and `create` is set.
    ///
    /// Fails with [`HandleError::TypeMismatch`] if `name` is a directory.
    async fn get_file_handle(&self, name: &str, create: bool) -> HandleResult<Arc<dyn FileHandle>>;

    /// All children, in no particular order.
    async fn entries(&self) -> HandleResult<Vec<Handle>>;

    /// Remove child `name`. A non-empty directory requires `recursive`.
    async fn remove_entry(&self, name: &str, recursive: bool) -> HandleResult<()>;

    /// Ask whether `mode` access is granted.
    ///
    /// `None` means the implementation cannot answer permission queries.
    async fn query_permission(&self, _mode: PermissionMode) -> Option<PermissionState> {
        None
    }
}

/// A file in the handle API.
#[async_trait]
pub trait FileHandle: Send + Sync {
    /// File name.
    fn name(&self) -> &str;

    /// The file's full content.
    async fn get_file(&self) -> HandleResult<Vec<u8>>;

    /// Open a stream that replaces the content when closed.
    async fn create_writable(&self) -> HandleResult<Box<dyn WritableFileStream>>;
}

/// Write stream over a file handle.
///
/// Data written is buffered and only becomes visible on [`close`](Self::close).
#[async_trait]
pub trait WritableFileStream: Send {
    /// Append `data` to the pending content.
    async fn write(&mut self, data: &[u8]) -> HandleResult<()>;

    /// Commit the pending content.
    async fn close(self: Box<Self>) -> HandleResult<()>;
}

/// Entry point to the handle API: hands out the staging-area root.
#[async_trait]
pub trait StorageManager: Send + Sync {
    /// Root directory of the staging area.
    async fn get_directory(&self) -> HandleResult<Arc<dyn DirectoryHandle>>;
}

/// Check an entry name for use inside a single directory.
pub(crate) fn validate_name(name: &str) -> HandleResult<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
        return Err(HandleError::InvalidName(name.to_string()));
    }
    Ok(())
}
