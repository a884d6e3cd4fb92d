//! In-process implementation of the handle API.

// RwLock.read()/write().unwrap() only panics on lock poisoning (prior panic
// while holding lock). This is intentional - corrupted state should not propagate.
#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{
    DirectoryHandle, FileHandle, Handle, HandleError, HandleResult, PermissionMode,
    PermissionState, StorageManager, WritableFileStream, validate_name,
};

#[derive(Debug, Clone, Copy, Default)]
struct Options {
    permission: Option<PermissionState>,
    read_only: bool,
}

#[derive(Clone)]
enum Node {
    File(Arc<MemoryFileHandle>),
    Directory(Arc<MemoryDirectoryHandle>),
}

impl Node {
    fn to_handle(&self) -> Handle {
        match self {
            Node::File(file) => Handle::File(file.clone()),
            Node::Directory(dir) => Handle::Directory(dir.clone()),
        }
    }
}

/// Directory handle backed by process memory.
///
/// Children inherit the permission answer and read-only flag of the handle
/// they were created from.
pub struct MemoryDirectoryHandle {
    name: String,
    options: Options,
    children: RwLock<HashMap<String, Node>>,
}

impl MemoryDirectoryHandle {
    /// Create an empty directory handle.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Options::default(),
            children: RwLock::new(HashMap::new()),
        }
    }

    /// Answer permission queries with `permission` (`None`: unsupported).
    pub fn with_permission(mut self, permission: Option<PermissionState>) -> Self {
        self.options.permission = permission;
        self
    }

    /// Refuse every creation, removal and write with `NotAllowed`.
    pub fn read_only(mut self) -> Self {
        self.options.read_only = true;
        self
    }

    fn child_dir(&self, name: &str) -> MemoryDirectoryHandle {
        MemoryDirectoryHandle {
            name: name.to_string(),
            options: self.options,
            children: RwLock::new(HashMap::new()),
        }
    }

    fn is_empty(&self) -> bool {
        self.children.read().unwrap().is_empty()
    }

    fn check_writable(&self) -> HandleResult<()> {
        if self.options.read_only {
            return Err(HandleError::NotAllowed);
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryHandle for MemoryDirectoryHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_directory_handle(
        &self,
        name: &str,
        create: bool,
    ) -> HandleResult<Arc<dyn DirectoryHandle>> {
        validate_name(name)?;
        if let Some(node) = self.children.read().unwrap().get(name) {
            return match node {
                Node::Directory(dir) => Ok(dir.clone()),
                Node::File(_) => Err(HandleError::TypeMismatch),
            };
        }
        if !create {
            return Err(HandleError::NotFound);
        }
        self.check_writable()?;

        let mut children = self.children.write().unwrap();
        let node = children
            .entry(name.to_string())
            .or_insert_with(|| Node::Directory(Arc::new(self.child_dir(name))));
        match node {
            Node::Directory(dir) => Ok(dir.clone()),
            Node::File(_) => Err(HandleError::TypeMismatch),
        }
    }

    async fn get_file_handle(&self, name: &str, create: bool) -> HandleResult<Arc<dyn FileHandle>> {
        validate_name(name)?;
        if let Some(node) = self.children.read().unwrap().get(name) {
            return match node {
                Node::File(file) => Ok(file.clone()),
                Node::Directory(_) => Err(HandleError::TypeMismatch),
            };
        }
        if !create {
            return Err(HandleError::NotFound);
        }
        self.check_writable()?;

        let mut children = self.children.write().unwrap();
        let node = children.entry(name.to_string()).or_insert_with(|| {
            Node::File(Arc::new(MemoryFileHandle::with_options(
                name,
                Vec::new(),
                self.options.read_only,
            )))
        });
        match node {
            Node::File(file) => Ok(file.clone()),
            Node::Directory(_) => Err(HandleError::TypeMismatch),
        }
    }

    async fn entries(&self) -> HandleResult<Vec<Handle>> {
        let children = self.children.read().unwrap();
        Ok(children.values().map(Node::to_handle).collect())
    }

    async fn remove_entry(&self, name: &str, recursive: bool) -> HandleResult<()> {
        validate_name(name)?;
        self.check_writable()?;

        let mut children = self.children.write().unwrap();
        let removable = match children.get(name) {
            None => return Err(HandleError::NotFound),
            Some(Node::Directory(dir)) => recursive || dir.is_empty(),
            Some(Node::File(_)) => true,
        };
        if !removable {
            return Err(HandleError::InvalidModification);
        }
        children.remove(name);
        Ok(())
    }

    async fn query_permission(&self, _mode: PermissionMode) -> Option<PermissionState> {
        self.options.permission
    }
}

/// File handle backed by process memory.
pub struct MemoryFileHandle {
    name: String,
    read_only: bool,
    content: Arc<RwLock<Vec<u8>>>,
}

impl MemoryFileHandle {
    fn with_options(name: impl Into<String>, content: Vec<u8>, read_only: bool) -> Self {
        Self {
            name: name.into(),
            read_only,
            content: Arc::new(RwLock::new(content)),
        }
    }
}

#[async_trait]
impl FileHandle for MemoryFileHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_file(&self) -> HandleResult<Vec<u8>> {
        Ok(self.content.read().unwrap().clone())
    }

    async fn create_writable(&self) -> HandleResult<Box<dyn WritableFileStream>> {
        if self.read_only {
            return Err(HandleError::NotAllowed);
        }
        Ok(Box::new(MemoryWritable {
            target: self.content.clone(),
            pending: Vec::new(),
        }))
    }
}

struct MemoryWritable {
    target: Arc<RwLock<Vec<u8>>>,
    pending: Vec<u8>,
}

#[async_trait]
impl WritableFileStream for MemoryWritable {
    async fn write(&mut self, data: &[u8]) -> HandleResult<()> {
        self.pending.extend_from_slice(data);
        Ok(())
    }

    async fn close(self: Box<Self>) -> HandleResult<()> {
        *self.target.write().unwrap() = self.pending;
        Ok(())
    }
}

/// Storage manager over a [`MemoryDirectoryHandle`] staging root.
pub struct MemoryStorageManager {
    root: Option<Arc<MemoryDirectoryHandle>>,
}

impl MemoryStorageManager {
    /// Serve `root` as the staging area.
    pub fn new(root: MemoryDirectoryHandle) -> Self {
        Self {
            root: Some(Arc::new(root)),
        }
    }

    /// A manager whose staging area cannot be obtained.
    pub fn unavailable() -> Self {
        Self { root: None }
    }
}

impl Default for MemoryStorageManager {
    fn default() -> Self {
        Self::new(MemoryDirectoryHandle::new(""))
    }
}

#[async_trait]
impl StorageManager for MemoryStorageManager {
    async fn get_directory(&self) -> HandleResult<Arc<dyn DirectoryHandle>> {
        match &self.root {
            Some(root) => Ok(root.clone()),
            None => Err(HandleError::NotAllowed),
        }
    }
}
