//! In-memory filesystem implementation

// RwLock.read()/write().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::address::{Address, DEFAULT_BASE, ensure_trailing_slash};
use super::traits::{DirEntry, FileSystem, FileType, Metadata};
use crate::error::{Error, Result};
use crate::logging::fs_trace;

/// A node of the in-memory tree.
///
/// Ownership is a strict tree: every non-root entry lives in exactly one
/// parent directory's `children` map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    /// File content, replaced wholesale on write.
    File { content: Vec<u8> },
    /// Directory children keyed by name.
    Directory { children: HashMap<String, Entry> },
}

impl Entry {
    /// An empty directory.
    pub fn empty_dir() -> Self {
        Entry::Directory {
            children: HashMap::new(),
        }
    }

    /// A file holding `content`.
    pub fn file(content: impl Into<Vec<u8>>) -> Self {
        Entry::File {
            content: content.into(),
        }
    }

    /// Entry type.
    pub fn file_type(&self) -> FileType {
        match self {
            Entry::File { .. } => FileType::File,
            Entry::Directory { .. } => FileType::Directory,
        }
    }

    fn child(&self, name: &str) -> Option<&Entry> {
        match self {
            Entry::Directory { children } => children.get(name),
            Entry::File { .. } => None,
        }
    }
}

/// In-memory filesystem.
///
/// Stores a hierarchical tree of [`Entry`] values under a single root
/// directory. All five CRUD operations resolve addresses by walking the tree
/// segment by segment.
///
/// # Example
///
/// ```rust
/// use mountfs::{FileSystem, InMemoryFs};
///
/// # #[tokio::main]
/// # async fn main() -> mountfs::Result<()> {
/// let fs = InMemoryFs::new();
/// fs.mkdir("file:///src/data", true).await?;
/// fs.write_file("file:///src/data/hello.txt", b"hello").await?;
///
/// assert_eq!(fs.read_file("file:///src/data/hello.txt").await?, b"hello");
/// assert!(fs.stat("file:///src/data/").await?.is_dir());
/// # Ok(())
/// # }
/// ```
pub struct InMemoryFs {
    base: String,
    root: RwLock<Entry>,
}

impl Default for InMemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryFs {
    /// Create an empty filesystem accepting `file:///` addresses.
    pub fn new() -> Self {
        Self::with_base(DEFAULT_BASE)
    }

    /// Create an empty filesystem accepting addresses under `base`.
    pub fn with_base(base: &str) -> Self {
        Self {
            base: ensure_trailing_slash(base),
            root: RwLock::new(Entry::empty_dir()),
        }
    }

    /// The base prefix this store accepts.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Clone of the whole tree, rooted at the base directory.
    pub fn snapshot(&self) -> Entry {
        self.root.read().unwrap().clone()
    }

    fn parse(&self, address: &str) -> Result<Address> {
        Address::parse(address, &self.base)
    }

    /// Walk `segments` from `root`, requiring every step to be a directory
    /// holding the named child.
    fn walk<'a>(root: &'a Entry, segments: &[String], addr: &Address) -> Result<&'a Entry> {
        let mut current = root;
        for segment in segments {
            if !matches!(current, Entry::Directory { .. }) {
                return Err(Error::NotADirectory(addr.to_string()));
            }
            current = current
                .child(segment)
                .ok_or_else(|| Error::NotFound(addr.to_string()))?;
        }
        Ok(current)
    }

    /// Mutable variant of [`walk`](Self::walk).
    fn walk_mut<'a>(
        root: &'a mut Entry,
        segments: &[String],
        addr: &Address,
    ) -> Result<&'a mut Entry> {
        let mut current = root;
        for segment in segments {
            current = match current {
                Entry::Directory { children } => children
                    .get_mut(segment)
                    .ok_or_else(|| Error::NotFound(addr.to_string()))?,
                Entry::File { .. } => return Err(Error::NotADirectory(addr.to_string())),
            };
        }
        Ok(current)
    }

    /// Resolve the directory that owns the terminal segment of `addr`.
    fn parent_children_mut<'a>(
        root: &'a mut Entry,
        parents: &[String],
        addr: &Address,
    ) -> Result<&'a mut HashMap<String, Entry>> {
        match Self::walk_mut(root, parents, addr)? {
            Entry::Directory { children } => Ok(children),
            Entry::File { .. } => Err(Error::NotADirectory(addr.to_string())),
        }
    }

    fn mkdir_recursive(root: &mut Entry, addr: &Address) -> Result<()> {
        let Some((parents, name)) = addr.split_last() else {
            return Ok(());
        };

        let mut current = root;
        for segment in parents {
            let Entry::Directory { children } = current else {
                return Err(Error::NotADirectory(addr.to_string()));
            };
            current = children
                .entry(segment.clone())
                .or_insert_with(Entry::empty_dir);
        }

        let Entry::Directory { children } = current else {
            return Err(Error::NotADirectory(addr.to_string()));
        };
        match children.get(name) {
            Some(Entry::Directory { .. }) => Ok(()),
            Some(Entry::File { .. }) => Err(Error::AlreadyExists(addr.to_string())),
            None => {
                children.insert(name.to_string(), Entry::empty_dir());
                Ok(())
            }
        }
    }
}

#[async_trait]
impl FileSystem for InMemoryFs {
    async fn mkdir(&self, address: &str, recursive: bool) -> Result<()> {
        let addr = self.parse(address)?;
        fs_trace!(address = %addr, recursive, "memory mkdir");
        let mut root = self.root.write().unwrap();

        if recursive {
            return Self::mkdir_recursive(&mut root, &addr);
        }

        let Some((parents, name)) = addr.split_last() else {
            return Err(Error::AlreadyExists(addr.to_string()));
        };
        let children = Self::parent_children_mut(&mut root, parents, &addr)?;
        if children.contains_key(name) {
            return Err(Error::AlreadyExists(addr.to_string()));
        }
        children.insert(name.to_string(), Entry::empty_dir());
        Ok(())
    }

    async fn read_dir(&self, address: &str) -> Result<Vec<DirEntry>> {
        let addr = self.parse(address)?;
        let root = self.root.read().unwrap();

        match Self::walk(&root, addr.segments(), &addr)? {
            Entry::Directory { children } => Ok(children
                .iter()
                .map(|(name, entry)| DirEntry::new(name.clone(), entry.file_type()))
                .collect()),
            Entry::File { .. } => Err(Error::NotADirectory(addr.to_string())),
        }
    }

    async fn read_file(&self, address: &str) -> Result<Vec<u8>> {
        let addr = self.parse(address)?;
        let root = self.root.read().unwrap();

        match Self::walk(&root, addr.segments(), &addr)? {
            Entry::File { content } => Ok(content.clone()),
            Entry::Directory { .. } => Err(Error::IsADirectory(addr.to_string())),
        }
    }

    async fn write_file(&self, address: &str, content: &[u8]) -> Result<()> {
        let addr = self.parse(address)?;
        fs_trace!(address = %addr, bytes = content.len(), "memory write");
        let mut root = self.root.write().unwrap();

        let Some((parents, name)) = addr.split_last() else {
            return Err(Error::IsADirectory(addr.to_string()));
        };
        // A missing or non-directory parent is reported as ENOENT/ENOTDIR
        // by the walk itself.
        let children = Self::parent_children_mut(&mut root, parents, &addr)?;
        if let Some(Entry::Directory { .. }) = children.get(name) {
            return Err(Error::IsADirectory(addr.to_string()));
        }
        children.insert(name.to_string(), Entry::file(content));
        Ok(())
    }

    async fn stat(&self, address: &str) -> Result<Metadata> {
        let addr = self.parse(address)?;
        let root = self.root.read().unwrap();

        let entry = Self::walk(&root, addr.segments(), &addr)?;
        Ok(Metadata {
            file_type: entry.file_type(),
        })
    }

    async fn remove(&self, address: &str) -> Result<()> {
        let addr = self.parse(address)?;
        fs_trace!(address = %addr, "memory remove");
        let mut root = self.root.write().unwrap();

        let Some((parents, name)) = addr.split_last() else {
            return Err(Error::PermissionDenied(addr.to_string()));
        };
        let children = match Self::walk_mut(&mut root, parents, &addr)? {
            Entry::Directory { children } => children,
            Entry::File { .. } => return Err(Error::NotFound(addr.to_string())),
        };
        children
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(addr.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use pretty_assertions::assert_eq;

    fn sorted_names(entries: Vec<DirEntry>) -> Vec<String> {
        let mut names: Vec<String> = entries.into_iter().map(|e| e.name).collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_write_and_read_file() {
        let fs = InMemoryFs::new();

        fs.write_file("file:///test.txt", b"hello world")
            .await
            .unwrap();

        let content = fs.read_file("file:///test.txt").await.unwrap();
        assert_eq!(content, b"hello world");
    }

    #[tokio::test]
    async fn test_write_replaces_content() {
        let fs = InMemoryFs::new();
        fs.write_file("file:///a", b"first").await.unwrap();
        fs.write_file("file:///a", b"second").await.unwrap();
        assert_eq!(fs.read_file("file:///a").await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_mkdir_and_read_dir() {
        let fs = InMemoryFs::new();

        fs.mkdir("file:///mydir", false).await.unwrap();
        fs.mkdir("file:///mydir/sub", false).await.unwrap();
        fs.write_file("file:///mydir/file.txt", b"test")
            .await
            .unwrap();

        let entries = fs.read_dir("file:///mydir/").await.unwrap();
        assert_eq!(entries.len(), 2);
        let file = entries.iter().find(|e| e.name == "file.txt").unwrap();
        assert!(file.is_file());
        let sub = entries.iter().find(|e| e.name == "sub").unwrap();
        assert!(sub.is_dir());
        assert!(!sub.is_symlink());
    }

    #[tokio::test]
    async fn test_mkdir_existing_fails() {
        let fs = InMemoryFs::new();
        fs.mkdir("file:///d", false).await.unwrap();
        let err = fs.mkdir("file:///d", false).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyExists);

        let err = fs.mkdir("file:///", false).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyExists);
    }

    #[tokio::test]
    async fn test_mkdir_missing_parent() {
        let fs = InMemoryFs::new();
        let err = fs.mkdir("file:///a/b", false).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_mkdir_through_file_is_enotdir() {
        let fs = InMemoryFs::new();
        fs.write_file("file:///f", b"x").await.unwrap();

        let err = fs.mkdir("file:///f/sub", false).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotADirectory);

        let err = fs.mkdir("file:///f/sub/deeper", true).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotADirectory);
    }

    #[tokio::test]
    async fn test_mkdir_recursive_is_idempotent() {
        let fs = InMemoryFs::new();
        fs.mkdir("file:///a/b/c", true).await.unwrap();
        let before = fs.snapshot();
        fs.mkdir("file:///a/b/c", true).await.unwrap();
        assert_eq!(fs.snapshot(), before);
        assert!(fs.stat("file:///a/b").await.unwrap().is_dir());
        fs.mkdir("file:///", true).await.unwrap();
    }

    #[tokio::test]
    async fn test_mkdir_recursive_over_file_is_eexist() {
        let fs = InMemoryFs::new();
        fs.write_file("file:///f", b"x").await.unwrap();
        let err = fs.mkdir("file:///f", true).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AlreadyExists);
    }

    #[tokio::test]
    async fn test_kind_conflicts() {
        let fs = InMemoryFs::new();
        fs.mkdir("file:///dir", false).await.unwrap();
        fs.write_file("file:///file", b"x").await.unwrap();

        let err = fs.write_file("file:///dir", b"x").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::IsADirectory);

        let err = fs.read_file("file:///dir").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::IsADirectory);

        let err = fs.read_dir("file:///file").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotADirectory);

        let err = fs.read_file("file:///file/inner").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotADirectory);
    }

    #[tokio::test]
    async fn test_write_requires_parent() {
        let fs = InMemoryFs::new();
        let err = fs.write_file("file:///nope/a.txt", b"x").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        fs.write_file("file:///f", b"x").await.unwrap();
        let err = fs.write_file("file:///f/a.txt", b"x").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotADirectory);
    }

    #[tokio::test]
    async fn test_remove_drops_subtree() {
        let fs = InMemoryFs::new();
        fs.mkdir("file:///a/b", true).await.unwrap();
        fs.write_file("file:///a/b/c.txt", b"x").await.unwrap();

        fs.remove("file:///a").await.unwrap();
        assert_eq!(
            fs.stat("file:///a/b/c.txt").await.unwrap_err().code(),
            ErrorCode::NotFound
        );
        assert!(fs.read_dir("file:///").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_missing() {
        let fs = InMemoryFs::new();
        let err = fs.remove("file:///ghost").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.to_string(), "ENOENT: file:///ghost");

        let err = fs.remove("file:///").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::PermissionDenied);
    }

    #[tokio::test]
    async fn test_outside_base() {
        let fs = InMemoryFs::with_base("file:///project");
        let err = fs.read_file("file:///other/a").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::AccessDenied);

        fs.write_file("file:///project/a", b"x").await.unwrap();
        assert_eq!(
            sorted_names(fs.read_dir("file:///project").await.unwrap()),
            vec!["a".to_string()]
        );
    }

    #[tokio::test]
    async fn test_chmod_and_watch_are_accepted() {
        let fs = InMemoryFs::new();
        fs.chmod("file:///anything", 0o644).await.unwrap();
        let watcher = fs.watch(&["file:///".to_string()]);
        watcher.close();
    }
}
