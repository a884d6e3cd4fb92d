//! Overlay router.
//!
//! [`MountFs`] composes several backing stores into one address space.
//! Each mount binding maps a router-side `source` prefix onto a store-side
//! `target` prefix.

// RwLock.read()/write().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use super::address::{DEFAULT_BASE, ensure_trailing_slash};
use super::traits::{DirEntry, FileSystem, Metadata};
use super::watch::{FsWatcher, noop_watcher};
use crate::error::{Error, Result};
use crate::logging::{LogConfig, fs_debug, fs_trace};

/// A binding as reported by [`MountFs::mounts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountInfo {
    /// Router-side prefix, always ending in `/`.
    pub source: String,
    /// Store-side prefix, always ending in `/`.
    pub target: String,
}

struct MountBinding {
    source: String,
    target: String,
    fs: Arc<dyn FileSystem>,
}

impl MountBinding {
    /// Rewrite `address` into the store's namespace, if this binding covers it.
    fn map(&self, address: &str) -> Option<String> {
        if format!("{address}/") == self.source {
            return Some(self.target.clone());
        }
        address
            .strip_prefix(&self.source)
            .map(|rest| format!("{}{rest}", self.target))
    }
}

/// Router over mounted stores.
///
/// # Resolution
///
/// Bindings are tried in registration order and the **first** one whose
/// source covers the address wins; there is no longest-prefix matching. A
/// binding covers an address that starts with its source, and also the
/// source itself written without the trailing slash. An address no binding
/// covers fails with `EACCES`.
///
/// A later, more specific mount is therefore shadowed by an earlier, more
/// general one. Mount specific prefixes first.
///
/// # Example
///
/// ```rust
/// use mountfs::{FileSystem, InMemoryFs, MountFs, StaticFs};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let lib = StaticFs::from_json(r#"{"a.txt": "aGk="}"#)?;
///
/// let router = MountFs::new();
/// router
///     .mount("file:///root/lib/", Arc::new(lib))
///     .mount("file:///root/", Arc::new(InMemoryFs::new()));
///
/// assert_eq!(router.read_file("file:///root/lib/a.txt").await?, b"hi");
/// router.write_file("file:///root/new.txt", b"ok").await?;
/// assert!(router.read_file("file:///elsewhere").await.is_err());
/// # Ok(())
/// # }
/// ```
pub struct MountFs {
    bindings: RwLock<Vec<MountBinding>>,
    log_config: LogConfig,
}

impl Default for MountFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MountFs {
    /// Create a router with no bindings.
    pub fn new() -> Self {
        Self {
            bindings: RwLock::new(Vec::new()),
            log_config: LogConfig::default(),
        }
    }

    /// Use `config` when formatting log output.
    pub fn with_log_config(mut self, config: LogConfig) -> Self {
        self.log_config = config;
        self
    }

    /// Mount `fs` at `source`, mapping onto the store's `file:///`.
    pub fn mount(&self, source: &str, fs: Arc<dyn FileSystem>) -> &Self {
        self.mount_at(source, fs, DEFAULT_BASE)
    }

    /// Mount `fs` at `source`, mapping onto the store's `target` prefix.
    pub fn mount_at(&self, source: &str, fs: Arc<dyn FileSystem>, target: &str) -> &Self {
        let binding = MountBinding {
            source: ensure_trailing_slash(source),
            target: ensure_trailing_slash(target),
            fs,
        };
        fs_debug!(source = %binding.source, target = %binding.target, "mount");
        self.bindings.write().unwrap().push(binding);
        self
    }

    /// Remove every binding whose source is `source`.
    ///
    /// Returns how many bindings were removed; an unknown prefix removes none.
    pub fn unmount(&self, source: &str) -> usize {
        let source = ensure_trailing_slash(source);
        let mut bindings = self.bindings.write().unwrap();
        let before = bindings.len();
        bindings.retain(|b| b.source != source);
        let removed = before - bindings.len();
        fs_debug!(source = %source, removed, "unmount");
        removed
    }

    /// Current bindings in resolution order.
    pub fn mounts(&self) -> Vec<MountInfo> {
        self.bindings
            .read()
            .unwrap()
            .iter()
            .map(|b| MountInfo {
                source: b.source.clone(),
                target: b.target.clone(),
            })
            .collect()
    }

    /// Store and rewritten address serving `address`.
    pub fn resolve(&self, address: &str) -> Result<(Arc<dyn FileSystem>, String)> {
        let bindings = self.bindings.read().unwrap();
        for binding in bindings.iter() {
            if let Some(mapped) = binding.map(address) {
                fs_debug!(
                    address = %self.log_config.format_address(address),
                    source = %binding.source,
                    mapped = %self.log_config.format_address(&mapped),
                    "route"
                );
                return Ok((binding.fs.clone(), mapped));
            }
        }
        fs_debug!(address = %self.log_config.format_address(address), "no mount");
        Err(Error::AccessDenied(address.to_string()))
    }

    /// Index of the first binding covering `address`, with the mapped address.
    fn route_index(bindings: &[MountBinding], address: &str) -> Option<(usize, String)> {
        bindings
            .iter()
            .enumerate()
            .find_map(|(i, b)| b.map(address).map(|mapped| (i, mapped)))
    }
}

#[async_trait]
impl FileSystem for MountFs {
    async fn mkdir(&self, address: &str, recursive: bool) -> Result<()> {
        let (fs, mapped) = self.resolve(address)?;
        fs.mkdir(&mapped, recursive).await
    }

    async fn read_dir(&self, address: &str) -> Result<Vec<DirEntry>> {
        let (fs, mapped) = self.resolve(address)?;
        fs.read_dir(&mapped).await
    }

    async fn read_file(&self, address: &str) -> Result<Vec<u8>> {
        let (fs, mapped) = self.resolve(address)?;
        fs.read_file(&mapped).await
    }

    async fn write_file(&self, address: &str, content: &[u8]) -> Result<()> {
        let (fs, mapped) = self.resolve(address)?;
        fs_trace!(
            address = %mapped,
            content = %crate::logging::format_content_for_log(content, &self.log_config),
            "write"
        );
        fs.write_file(&mapped, content).await
    }

    async fn stat(&self, address: &str) -> Result<Metadata> {
        let (fs, mapped) = self.resolve(address)?;
        fs.stat(&mapped).await
    }

    async fn remove(&self, address: &str) -> Result<()> {
        let (fs, mapped) = self.resolve(address)?;
        fs.remove(&mapped).await
    }

    /// Forwarded only when every address routes through the same binding;
    /// otherwise the shared no-op watcher.
    fn watch(&self, addresses: &[String]) -> Arc<dyn FsWatcher> {
        let bindings = self.bindings.read().unwrap();
        let mut index = None;
        let mut mapped = Vec::with_capacity(addresses.len());
        for address in addresses {
            let Some((i, rewritten)) = Self::route_index(&bindings, address) else {
                return noop_watcher();
            };
            if index.is_some_and(|first| first != i) {
                return noop_watcher();
            }
            index = Some(i);
            mapped.push(rewritten);
        }
        match index {
            Some(i) => bindings[i].fs.watch(&mapped),
            None => noop_watcher(),
        }
    }

    async fn chmod(&self, address: &str, mode: u32) -> Result<()> {
        let (fs, mapped) = self.resolve(address)?;
        fs.chmod(&mapped, mode).await
    }
}
