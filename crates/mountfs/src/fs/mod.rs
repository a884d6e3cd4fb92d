//! Virtual filesystem layer for Mountfs
//!
//! Provides the async [`FileSystem`] trait and its backing stores:
//! - `InMemoryFs`: mutable tree held in process memory
//! - `StaticFs`: read-only view of a bundled snapshot
//! - `FlatFs`: flat address map persisted to a [`StorageArea`]
//! - `HandleFs`: adapter over the directory-handle API in [`handle`]
//! - `MountFs`: first-match router composing the others

mod address;
mod flat;
pub mod handle;
mod handle_fs;
mod memory;
mod mountable;
mod snapshot;
mod storage;
mod traits;
mod watch;

pub use address::{Address, DEFAULT_BASE, ensure_trailing_slash};
pub use flat::{DEFAULT_KEY_PREFIX, FlatFs, FlatRecord};
pub use handle::HandleError;
pub use handle_fs::{HANDLE_DIR_PREFIX, HandleFs, Support, SupportCache};
pub use memory::{Entry, InMemoryFs};
pub use mountable::{MountFs, MountInfo};
pub use snapshot::{SnapshotNode, StaticFs};
#[cfg(not(target_arch = "wasm32"))]
pub use storage::DiskStorageArea;
pub use storage::{MemoryStorageArea, StorageArea, StorageError};
pub use traits::{DirEntry, FileSystem, FileType, Metadata};
pub use watch::{FsWatcher, NoopWatcher, WatchEvent, WatchListener, noop_watcher};
