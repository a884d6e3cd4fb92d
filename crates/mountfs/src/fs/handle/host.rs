//! Handle API over host directories.
//!
//! Each handle wraps a host path; all I/O goes through `tokio::fs`. Entry
//! names are validated before they are joined onto a path, and symbolic links
//! are never followed: lookups through a link fail `NotAllowed` and listings
//! skip links. A handle stays inside the directory it was derived from.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::{
    DirectoryHandle, FileHandle, Handle, HandleError, HandleResult, PermissionMode,
    PermissionState, StorageManager, WritableFileStream, validate_name,
};

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Directory handle for a host directory.
#[derive(Debug, Clone)]
pub struct HostDirectoryHandle {
    name: String,
    path: PathBuf,
}

impl HostDirectoryHandle {
    /// Wrap an existing host directory.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: file_name(&path),
            path,
        }
    }

    /// Host path of this directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DirectoryHandle for HostDirectoryHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_directory_handle(
        &self,
        name: &str,
        create: bool,
    ) -> HandleResult<Arc<dyn DirectoryHandle>> {
        validate_name(name)?;
        let path = self.path.join(name);
        match tokio::fs::symlink_metadata(&path).await {
            Ok(meta) if meta.file_type().is_symlink() => return Err(HandleError::NotAllowed),
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(HandleError::TypeMismatch),
            Err(e) if e.kind() == ErrorKind::NotFound && create => {
                tokio::fs::create_dir(&path).await?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(Arc::new(HostDirectoryHandle {
            name: name.to_string(),
            path,
        }))
    }

    async fn get_file_handle(&self, name: &str, create: bool) -> HandleResult<Arc<dyn FileHandle>> {
        validate_name(name)?;
        let path = self.path.join(name);
        match tokio::fs::symlink_metadata(&path).await {
            Ok(meta) if meta.file_type().is_symlink() => return Err(HandleError::NotAllowed),
            Ok(meta) if meta.is_dir() => return Err(HandleError::TypeMismatch),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound && create => {
                tokio::fs::write(&path, b"").await?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(Arc::new(HostFileHandle {
            name: name.to_string(),
            path,
        }))
    }

    async fn entries(&self) -> HandleResult<Vec<Handle>> {
        let mut dir = tokio::fs::read_dir(&self.path).await?;
        let mut out = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            // DirEntry::file_type does not follow links
            let file_type = entry.file_type().await?;
            if file_type.is_symlink() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            out.push(if file_type.is_dir() {
                Handle::Directory(Arc::new(HostDirectoryHandle { name, path }))
            } else {
                Handle::File(Arc::new(HostFileHandle { name, path }))
            });
        }
        Ok(out)
    }

    async fn remove_entry(&self, name: &str, recursive: bool) -> HandleResult<()> {
        validate_name(name)?;
        let path = self.path.join(name);
        let meta = tokio::fs::symlink_metadata(&path).await?;
        let result = if !meta.is_dir() {
            tokio::fs::remove_file(&path).await
        } else if recursive {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_dir(&path).await
        };
        result.map_err(|e| match e.kind() {
            ErrorKind::DirectoryNotEmpty => HandleError::InvalidModification,
            _ => e.into(),
        })
    }

    async fn query_permission(&self, _mode: PermissionMode) -> Option<PermissionState> {
        let meta = tokio::fs::metadata(&self.path).await.ok()?;
        if meta.permissions().readonly() {
            Some(PermissionState::Denied)
        } else {
            Some(PermissionState::Granted)
        }
    }
}

/// File handle for a host file.
#[derive(Debug, Clone)]
pub struct HostFileHandle {
    name: String,
    path: PathBuf,
}

impl HostFileHandle {
    /// Host path of this file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FileHandle for HostFileHandle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_file(&self) -> HandleResult<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }

    async fn create_writable(&self) -> HandleResult<Box<dyn WritableFileStream>> {
        Ok(Box::new(HostWritable {
            path: self.path.clone(),
            pending: Vec::new(),
        }))
    }
}

struct HostWritable {
    path: PathBuf,
    pending: Vec<u8>,
}

#[async_trait]
impl WritableFileStream for HostWritable {
    async fn write(&mut self, data: &[u8]) -> HandleResult<()> {
        self.pending.extend_from_slice(data);
        Ok(())
    }

    async fn close(self: Box<Self>) -> HandleResult<()> {
        tokio::fs::write(&self.path, &self.pending).await?;
        Ok(())
    }
}

/// Storage manager whose staging area is a host directory.
#[derive(Debug, Clone)]
pub struct HostStorageManager {
    staging: PathBuf,
}

impl HostStorageManager {
    /// Use `staging` as the staging root. It is created on first use.
    pub fn new(staging: impl Into<PathBuf>) -> Self {
        Self {
            staging: staging.into(),
        }
    }
}

#[async_trait]
impl StorageManager for HostStorageManager {
    async fn get_directory(&self) -> HandleResult<Arc<dyn DirectoryHandle>> {
        tokio::fs::create_dir_all(&self.staging).await?;
        Ok(Arc::new(HostDirectoryHandle::new(self.staging.clone())))
    }
}
