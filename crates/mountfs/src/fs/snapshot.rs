//! Read-only filesystem over a bundled snapshot.
//!
//! [`StaticFs`] serves a nested object graph loaded once at construction:
//! string leaves are base64-encoded files, objects are directories. Every
//! mutating operation fails with `EPERM`.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::address::{Address, DEFAULT_BASE, ensure_trailing_slash};
use super::traits::{DirEntry, FileSystem, FileType, Metadata};
use crate::error::{Error, Result, SetupError};

/// A node of the snapshot: a base64 leaf or a named mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotNode {
    /// File content, base64-encoded.
    File(String),
    /// Directory children keyed by name.
    Directory(BTreeMap<String, SnapshotNode>),
}

impl SnapshotNode {
    /// Build a file leaf from raw bytes.
    pub fn file(content: impl AsRef<[u8]>) -> Self {
        SnapshotNode::File(STANDARD.encode(content))
    }

    /// Build a directory from `(name, node)` pairs.
    pub fn dir<I, S>(children: I) -> Self
    where
        I: IntoIterator<Item = (S, SnapshotNode)>,
        S: Into<String>,
    {
        SnapshotNode::Directory(
            children
                .into_iter()
                .map(|(name, node)| (name.into(), node))
                .collect(),
        )
    }

    fn file_type(&self) -> FileType {
        match self {
            SnapshotNode::File(_) => FileType::File,
            SnapshotNode::Directory(_) => FileType::Directory,
        }
    }

    /// Check every leaf decodes as base64.
    fn validate(&self, path: &mut Vec<String>) -> std::result::Result<(), SetupError> {
        match self {
            SnapshotNode::File(encoded) => STANDARD.decode(encoded).map(|_| ()).map_err(|e| {
                SetupError::InvalidSnapshot(format!("/{}: {e}", path.join("/")))
            }),
            SnapshotNode::Directory(children) => {
                for (name, child) in children {
                    path.push(name.clone());
                    child.validate(path)?;
                    path.pop();
                }
                Ok(())
            }
        }
    }
}

/// Read-only filesystem over a [`SnapshotNode`] tree.
///
/// # Example
///
/// ```rust
/// use mountfs::{FileSystem, StaticFs};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // "aGk=" is base64 for "hi"
/// let fs = StaticFs::from_json(r#"{"docs": {"a.txt": "aGk="}}"#)?;
/// assert_eq!(fs.read_file("file:///docs/a.txt").await?, b"hi");
/// assert!(fs.write_file("file:///docs/a.txt", b"x").await.is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct StaticFs {
    base: String,
    root: SnapshotNode,
}

impl StaticFs {
    /// Wrap an already built tree. The root must be a directory.
    pub fn new(root: SnapshotNode) -> std::result::Result<Self, SetupError> {
        if !matches!(root, SnapshotNode::Directory(_)) {
            return Err(SetupError::InvalidSnapshot(
                "snapshot root must be a mapping".to_string(),
            ));
        }
        root.validate(&mut Vec::new())?;
        Ok(Self {
            base: DEFAULT_BASE.to_string(),
            root,
        })
    }

    /// Build from a JSON object graph.
    pub fn from_value(value: serde_json::Value) -> std::result::Result<Self, SetupError> {
        let root: SnapshotNode = serde_json::from_value(value)
            .map_err(|e| SetupError::InvalidSnapshot(e.to_string()))?;
        Self::new(root)
    }

    /// Build from JSON text.
    pub fn from_json(text: &str) -> std::result::Result<Self, SetupError> {
        let root: SnapshotNode =
            serde_json::from_str(text).map_err(|e| SetupError::InvalidSnapshot(e.to_string()))?;
        Self::new(root)
    }

    /// Accept addresses under `base` instead of `file:///`.
    pub fn with_base(mut self, base: &str) -> Self {
        self.base = ensure_trailing_slash(base);
        self
    }

    /// The base prefix this store accepts.
    pub fn base(&self) -> &str {
        &self.base
    }

    fn find(&self, address: &str) -> Result<(&SnapshotNode, Address)> {
        let addr = Address::parse(address, &self.base)?;
        let mut current = &self.root;
        for segment in addr.segments() {
            current = match current {
                SnapshotNode::Directory(children) => children
                    .get(segment)
                    .ok_or_else(|| Error::NotFound(addr.to_string()))?,
                SnapshotNode::File(_) => return Err(Error::NotADirectory(addr.to_string())),
            };
        }
        Ok((current, addr))
    }
}

#[async_trait]
impl FileSystem for StaticFs {
    async fn mkdir(&self, address: &str, _recursive: bool) -> Result<()> {
        Err(Error::PermissionDenied(address.to_string()))
    }

    async fn read_dir(&self, address: &str) -> Result<Vec<DirEntry>> {
        match self.find(address)? {
            (SnapshotNode::Directory(children), _) => Ok(children
                .iter()
                .map(|(name, node)| DirEntry::new(name.clone(), node.file_type()))
                .collect()),
            (SnapshotNode::File(_), addr) => Err(Error::NotADirectory(addr.to_string())),
        }
    }

    async fn read_file(&self, address: &str) -> Result<Vec<u8>> {
        match self.find(address)? {
            (SnapshotNode::File(encoded), addr) => {
                STANDARD.decode(encoded).map_err(|e| Error::medium(&addr, e))
            }
            (SnapshotNode::Directory(_), addr) => Err(Error::IsADirectory(addr.to_string())),
        }
    }

    async fn write_file(&self, address: &str, _content: &[u8]) -> Result<()> {
        Err(Error::PermissionDenied(address.to_string()))
    }

    async fn stat(&self, address: &str) -> Result<Metadata> {
        let (node, _) = self.find(address)?;
        Ok(Metadata {
            file_type: node.file_type(),
        })
    }

    async fn remove(&self, address: &str) -> Result<()> {
        Err(Error::PermissionDenied(address.to_string()))
    }
}
