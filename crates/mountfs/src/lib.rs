//! Mountfs - URI-addressed virtual filesystems with an overlay router
//!
//! Part of the Everruns ecosystem.
//!
//! Every store implements the async [`FileSystem`] trait over `file:///...`
//! addresses and fails with one of six POSIX-style [`ErrorCode`]s. A
//! [`MountFs`] composes stores into one namespace; the first binding whose
//! prefix covers an address serves it.
//!
//! | Store          | Backing                                 | Mutable |
//! |----------------|-----------------------------------------|---------|
//! | [`InMemoryFs`] | tree in process memory                  | yes     |
//! | [`StaticFs`]   | bundled snapshot of base64 leaves       | no      |
//! | [`FlatFs`]     | flat map persisted to a [`StorageArea`] | yes     |
//! | [`HandleFs`]   | directory-handle API ([`fs::handle`])   | yes     |
//!
//! # Example
//!
//! ```rust
//! use mountfs::{FileSystem, InMemoryFs, MountFs};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let fs = MountFs::new();
//!     fs.mount("file:///root/", Arc::new(InMemoryFs::new()));
//!
//!     fs.mkdir("file:///root/data", false).await?;
//!     fs.write_file("file:///root/data/a.txt", b"hello").await?;
//!     assert_eq!(fs.read_file("file:///root/data/a.txt").await?, b"hello");
//!
//!     let err = fs.read_file("file:///elsewhere").await.unwrap_err();
//!     assert_eq!(err.to_string(), "EACCES: file:///elsewhere");
//!     Ok(())
//! }
//! ```
//!
//! # Logging
//!
//! With the `logging` feature, routing and store activity is reported through
//! `tracing`. See [`LogConfig`].

#[cfg(not(target_arch = "wasm32"))]
mod config;
mod error;
pub mod fs;
mod layout;
mod logging;

pub use async_trait::async_trait;

#[cfg(not(target_arch = "wasm32"))]
pub use config::{MountConfig, MountTableConfig, StoreConfig};
pub use error::{Error, ErrorCode, Result, SetupError};
pub use fs::handle::{
    DirectoryHandle, FileHandle, Handle, HandleKind, MemoryDirectoryHandle, MemoryStorageManager,
    PermissionMode, PermissionState, StorageManager, WritableFileStream,
};
#[cfg(not(target_arch = "wasm32"))]
pub use fs::handle::{HostDirectoryHandle, HostStorageManager};
#[cfg(not(target_arch = "wasm32"))]
pub use fs::DiskStorageArea;
pub use fs::{
    Address, DirEntry, FileSystem, FileType, FlatFs, FsWatcher, HandleError, HandleFs,
    InMemoryFs, MemoryStorageArea, Metadata, MountFs, MountInfo, NoopWatcher, SnapshotNode,
    StaticFs, StorageArea, StorageError, Support, SupportCache, WatchEvent, WatchListener,
    noop_watcher,
};
pub use layout::{BundledDependency, CACHE_URI, ProjectLayout, ROOT_URI, SnapshotDependency};
pub use logging::{LogConfig, format_content_for_log, sanitize_for_log};
