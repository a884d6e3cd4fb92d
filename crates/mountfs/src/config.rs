//! Mount table configuration.
//!
//! A mount table is a JSON document listing bindings in resolution order:
//!
//! ```json
//! {
//!   "mounts": [
//!     { "source": "file:///root/lib/", "store": { "kind": "snapshot", "path": "lib.json" } },
//!     { "source": "file:///cache/",    "store": { "kind": "flat", "id": "cache", "dir": "state" } },
//!     { "source": "file:///root/",     "store": { "kind": "host", "staging": "work", "identifier": "proj" } },
//!     { "source": "file:///tmp/",      "store": { "kind": "memory" } }
//!   ]
//! }
//! ```
//!
//! `target` defaults to `file:///`. Relative paths are resolved against the
//! directory of the file the table was loaded from.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::SetupError;
use crate::fs::handle::HostStorageManager;
use crate::fs::{
    DEFAULT_BASE, DiskStorageArea, FileSystem, FlatFs, HandleFs, InMemoryFs, MountFs, StaticFs,
};

fn default_target() -> String {
    DEFAULT_BASE.to_string()
}

/// Store backing one mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    /// Fresh [`InMemoryFs`].
    Memory,
    /// [`StaticFs`] loaded from a JSON snapshot file.
    Snapshot { path: PathBuf },
    /// [`FlatFs`] persisted through a [`DiskStorageArea`] in `dir`.
    Flat {
        id: String,
        dir: PathBuf,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
    },
    /// [`HandleFs`] over host directories staged under `staging`.
    Host {
        staging: PathBuf,
        identifier: String,
    },
}

impl StoreConfig {
    fn resolve_paths(&mut self, base_dir: &Path) {
        let path = match self {
            StoreConfig::Memory => return,
            StoreConfig::Snapshot { path } => path,
            StoreConfig::Flat { dir, .. } => dir,
            StoreConfig::Host { staging, .. } => staging,
        };
        if path.is_relative() {
            *path = base_dir.join(&*path);
        }
    }

    /// Construct the store.
    pub async fn open(&self) -> Result<Arc<dyn FileSystem>, SetupError> {
        Ok(match self {
            StoreConfig::Memory => Arc::new(InMemoryFs::new()),
            StoreConfig::Snapshot { path } => {
                let text = tokio::fs::read_to_string(path).await?;
                Arc::new(StaticFs::from_json(&text)?)
            }
            StoreConfig::Flat { id, dir, prefix } => {
                let storage = Arc::new(DiskStorageArea::new(dir));
                let fs = match prefix {
                    Some(prefix) => FlatFs::open_with_prefix(prefix, id, storage).await?,
                    None => FlatFs::open(id, storage).await?,
                };
                Arc::new(fs)
            }
            StoreConfig::Host {
                staging,
                identifier,
            } => {
                let manager = HostStorageManager::new(staging);
                Arc::new(HandleFs::create(&manager, identifier).await?)
            }
        })
    }
}

/// One binding of the mount table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    /// Router-side prefix.
    pub source: String,
    /// Store-side prefix.
    #[serde(default = "default_target")]
    pub target: String,
    /// Store serving the binding.
    pub store: StoreConfig,
}

/// Ordered list of mounts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountTableConfig {
    #[serde(default)]
    pub mounts: Vec<MountConfig>,
}

impl MountTableConfig {
    /// Parse a mount table from JSON text. Paths are kept as written.
    pub fn from_json(text: &str) -> Result<Self, SetupError> {
        serde_json::from_str(text).map_err(|e| SetupError::InvalidConfig(e.to_string()))
    }

    /// Read a mount table file, resolving relative paths against its directory.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SetupError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;
        let mut config = Self::from_json(&text)?;
        if let Some(dir) = path.parent() {
            for mount in &mut config.mounts {
                mount.store.resolve_paths(dir);
            }
        }
        Ok(config)
    }

    /// Open every store and mount them in table order.
    pub async fn build(&self) -> Result<MountFs, SetupError> {
        let router = MountFs::new();
        for mount in &self.mounts {
            let fs = mount.store.open().await?;
            router.mount_at(&mount.source, fs, &mount.target);
        }
        Ok(router)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_defaults() {
        let config = MountTableConfig::from_json(
            r#"{"mounts": [
                {"source": "file:///a/", "store": {"kind": "memory"}},
                {"source": "file:///b/", "target": "file:///x/",
                 "store": {"kind": "flat", "id": "b", "dir": "state"}}
            ]}"#,
        )
        .unwrap();

        assert_eq!(config.mounts[0].target, "file:///");
        assert_eq!(config.mounts[0].store, StoreConfig::Memory);
        assert_eq!(
            config.mounts[1].store,
            StoreConfig::Flat {
                id: "b".to_string(),
                dir: PathBuf::from("state"),
                prefix: None,
            }
        );
        assert_eq!(MountTableConfig::from_json("{}").unwrap().mounts.len(), 0);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let err = MountTableConfig::from_json(
            r#"{"mounts": [{"source": "file:///", "store": {"kind": "ftp"}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, SetupError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_load_and_build() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("lib.json"), r#"{"a.txt": "aGk="}"#).unwrap();
        std::fs::write(
            tmp.path().join("mounts.json"),
            r#"{"mounts": [
                {"source": "file:///root/lib/", "store": {"kind": "snapshot", "path": "lib.json"}},
                {"source": "file:///root/", "store": {"kind": "host", "staging": "work", "identifier": "p"}},
                {"source": "file:///cache/", "store": {"kind": "flat", "id": "c", "dir": "state"}},
                {"source": "file:///tmp/", "store": {"kind": "memory"}}
            ]}"#,
        )
        .unwrap();

        let config = MountTableConfig::load(tmp.path().join("mounts.json"))
            .await
            .unwrap();
        let fs = config.build().await.unwrap();
        assert_eq!(fs.mounts().len(), 4);

        assert_eq!(fs.read_file("file:///root/lib/a.txt").await.unwrap(), b"hi");
        fs.write_file("file:///root/main.txt", b"host").await.unwrap();
        assert_eq!(
            std::fs::read(tmp.path().join("work/mountfs_p/main.txt")).unwrap(),
            b"host"
        );

        fs.write_file("file:///cache/k", b"v").await.unwrap();
        assert!(tmp.path().join("state/mountfs-flat-c.json").exists());

        fs.write_file("file:///tmp/t", b"t").await.unwrap();
        assert_eq!(
            fs.read_file("file:///nowhere").await.unwrap_err().code(),
            ErrorCode::AccessDenied
        );
    }

    #[tokio::test]
    async fn test_missing_snapshot_file() {
        let config = MountTableConfig {
            mounts: vec![MountConfig {
                source: "file:///".to_string(),
                target: default_target(),
                store: StoreConfig::Snapshot {
                    path: PathBuf::from("/definitely/not/here.json"),
                },
            }],
        };
        assert!(matches!(config.build().await, Err(SetupError::Io(_))));
    }
}
