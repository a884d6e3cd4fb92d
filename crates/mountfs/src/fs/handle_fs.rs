//! Filesystem adapter over the directory-handle API.
//!
//! [`HandleFs`] maps addresses onto a tree of [`DirectoryHandle`]s rooted at a
//! per-identifier directory inside a storage manager's staging area. Handle
//! failures are translated into the crate's error kinds:
//!
//! | Handle error                   | Error     |
//! |--------------------------------|-----------|
//! | `NotFound`                     | `ENOENT`  |
//! | `TypeMismatch` (walking)       | `ENOTDIR` |
//! | `TypeMismatch` (file on write) | `EISDIR`  |
//! | `TypeMismatch` (mkdir target)  | `EEXIST`  |
//! | `NotAllowed`, `Io`, `InvalidModification` | `EPERM` |
//! | `InvalidName`                  | `EACCES`  |
//!
//! Whether the handle API is usable at all is decided by a capability probe
//! whose answer is cached for the whole process, see [`HandleFs::detect_support`].

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use super::address::{Address, DEFAULT_BASE, ensure_trailing_slash};
use super::handle::{
    DirectoryHandle, Handle, HandleError, HandleKind, HandleResult, PermissionMode,
    PermissionState, StorageManager,
};
use super::traits::{DirEntry, FileSystem, FileType, Metadata};
use crate::error::{Error, ErrorCode, Result, SetupError};
use crate::logging::{fs_debug, fs_trace};

/// Prefix of the per-identifier directory in the staging area.
pub const HANDLE_DIR_PREFIX: &str = "mountfs_";

/// Answer of the capability probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Support {
    /// Not probed yet.
    Unknown,
    /// The handle API works in this environment.
    Supported,
    /// The handle API is missing or refused access.
    Unsupported,
}

impl Support {
    fn to_u8(self) -> u8 {
        match self {
            Support::Unknown => 0,
            Support::Supported => 1,
            Support::Unsupported => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Support::Supported,
            2 => Support::Unsupported,
            _ => Support::Unknown,
        }
    }
}

/// Write-once cell holding a [`Support`] answer.
///
/// The process-wide instance behind [`HandleFs::support`] is one of these;
/// separate instances are useful where a fresh probe is wanted.
#[derive(Debug)]
pub struct SupportCache(AtomicU8);

impl SupportCache {
    /// A cache in the [`Support::Unknown`] state.
    pub const fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    /// Cached answer. Never probes.
    pub fn get(&self) -> Support {
        Support::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Probe through `manager` unless an answer is already cached.
    pub async fn detect(&self, manager: &dyn StorageManager) -> Support {
        match self.get() {
            Support::Unknown => {
                let support = HandleFs::probe_support(manager).await;
                self.0.store(support.to_u8(), Ordering::Release);
                support
            }
            known => known,
        }
    }

    /// Forget the cached answer.
    pub fn reset(&self) {
        self.0.store(Support::Unknown.to_u8(), Ordering::Release);
    }
}

impl Default for SupportCache {
    fn default() -> Self {
        Self::new()
    }
}

static SUPPORT: SupportCache = SupportCache::new();

/// Unique-enough token for probe file names.
fn probe_token() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}{:x}{count:x}", nanos, std::process::id())
}

fn translate(err: HandleError, addr: &Address, mismatch: ErrorCode) -> Error {
    match err {
        HandleError::NotFound => Error::NotFound(addr.to_string()),
        HandleError::TypeMismatch => Error::new(mismatch, addr.to_string()),
        HandleError::InvalidName(_) => Error::AccessDenied(addr.to_string()),
        HandleError::NotAllowed | HandleError::InvalidModification | HandleError::Io(_) => {
            Error::medium(addr, err)
        }
    }
}

/// Filesystem over a [`DirectoryHandle`] tree.
///
/// # Example
///
/// ```rust
/// use mountfs::{FileSystem, HandleFs, MemoryStorageManager};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = MemoryStorageManager::default();
/// let fs = HandleFs::create(&manager, "my/project").await?;
///
/// fs.mkdir("file:///src", false).await?;
/// fs.write_file("file:///src/main.mcfunction", b"say hi").await?;
/// assert_eq!(fs.read_file("file:///src/main.mcfunction").await?, b"say hi");
/// # Ok(())
/// # }
/// ```
pub struct HandleFs {
    base: String,
    root: Arc<dyn DirectoryHandle>,
}

impl HandleFs {
    /// Serve `root` under `file:///`.
    pub fn new(root: Arc<dyn DirectoryHandle>) -> Self {
        Self {
            base: DEFAULT_BASE.to_string(),
            root,
        }
    }

    /// Open the store for `identifier` in `manager`'s staging area.
    ///
    /// The store lives in the directory `mountfs_<identifier>`, with every
    /// `/` in the identifier replaced by `_`. It is created when missing.
    pub async fn create(
        manager: &dyn StorageManager,
        identifier: &str,
    ) -> std::result::Result<Self, SetupError> {
        let staging = manager.get_directory().await?;
        let dir_name = format!("{HANDLE_DIR_PREFIX}{}", identifier.replace('/', "_"));
        let root = staging.get_directory_handle(&dir_name, true).await?;
        fs_debug!(directory = %dir_name, "handle store opened");
        Ok(Self::new(root))
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

    /// Cached process-wide probe answer. Never probes.
    pub fn support() -> Support {
        SUPPORT.get()
    }

    /// Process-wide probe answer, probing through `manager` the first time.
    pub async fn detect_support(manager: &dyn StorageManager) -> Support {
        SUPPORT.detect(manager).await
    }

    /// Run the capability probe unconditionally.
    ///
    /// A granted read-write permission query settles it. Otherwise a
    /// throwaway `test-<random>.txt` is created in the staging root, checked
    /// for name and kind, and removed again. Any failure means unsupported.
    pub async fn probe_support(manager: &dyn StorageManager) -> Support {
        match Self::probe(manager).await {
            Ok(true) => Support::Supported,
            Ok(false) => Support::Unsupported,
            Err(_e) => {
                fs_debug!(error = %_e, "handle api probe failed");
                Support::Unsupported
            }
        }
    }

    async fn probe(manager: &dyn StorageManager) -> HandleResult<bool> {
        let root = manager.get_directory().await?;
        if root.query_permission(PermissionMode::ReadWrite).await == Some(PermissionState::Granted)
        {
            return Ok(true);
        }

        let name = format!("test-{}.txt", probe_token());
        let file = root.get_file_handle(&name, true).await?;
        let listed = root.entries().await.map(|entries| {
            entries
                .iter()
                .any(|h| h.name() == name && h.kind() == HandleKind::File)
        });
        // Clean up even when listing failed
        let removed = root.remove_entry(&name, false).await;
        let ok = file.name() == name && listed?;
        removed?;
        Ok(ok)
    }

    fn parse(&self, address: &str) -> Result<Address> {
        Address::parse(address, &self.base)
    }

    /// Walk directory handles along `segments`, creating them if asked.
    async fn walk(
        &self,
        segments: &[String],
        addr: &Address,
        create: bool,
    ) -> Result<Arc<dyn DirectoryHandle>> {
        let mut current = self.root.clone();
        for segment in segments {
            current = current
                .get_directory_handle(segment, create)
                .await
                .map_err(|e| translate(e, addr, ErrorCode::NotADirectory))?;
        }
        Ok(current)
    }

    /// Handle for the entry at `addr`, found by listing its parent.
    async fn resolve(&self, addr: &Address) -> Result<Handle> {
        let Some((parents, name)) = addr.split_last() else {
            return Ok(Handle::Directory(self.root.clone()));
        };
        let parent = self.walk(parents, addr, false).await?;
        parent
            .entries()
            .await
            .map_err(|e| translate(e, addr, ErrorCode::NotADirectory))?
            .into_iter()
            .find(|h| h.name() == name)
            .ok_or_else(|| Error::NotFound(addr.to_string()))
    }
}

#[async_trait]
impl FileSystem for HandleFs {
    async fn mkdir(&self, address: &str, recursive: bool) -> Result<()> {
        let addr = self.parse(address)?;
        fs_trace!(address = %addr, recursive, "handle mkdir");

        let Some((parents, name)) = addr.split_last() else {
            return if recursive {
                Ok(())
            } else {
                Err(Error::AlreadyExists(addr.to_string()))
            };
        };

        let parent = self.walk(parents, &addr, recursive).await?;
        if !recursive {
            let existing = parent
                .entries()
                .await
                .map_err(|e| translate(e, &addr, ErrorCode::NotADirectory))?;
            if existing.iter().any(|h| h.name() == name) {
                return Err(Error::AlreadyExists(addr.to_string()));
            }
        }
        parent
            .get_directory_handle(name, true)
            .await
            .map(|_| ())
            .map_err(|e| translate(e, &addr, ErrorCode::AlreadyExists))
    }

    async fn read_dir(&self, address: &str) -> Result<Vec<DirEntry>> {
        let addr = self.parse(address)?;
        match self.resolve(&addr).await? {
            Handle::Directory(dir) => Ok(dir
                .entries()
                .await
                .map_err(|e| translate(e, &addr, ErrorCode::NotADirectory))?
                .iter()
                .map(|h| {
                    let file_type = match h.kind() {
                        HandleKind::File => FileType::File,
                        HandleKind::Directory => FileType::Directory,
                    };
                    DirEntry::new(h.name(), file_type)
                })
                .collect()),
            Handle::File(_) => Err(Error::NotADirectory(addr.to_string())),
        }
    }

    async fn read_file(&self, address: &str) -> Result<Vec<u8>> {
        let addr = self.parse(address)?;
        match self.resolve(&addr).await? {
            Handle::File(file) => file
                .get_file()
                .await
                .map_err(|e| translate(e, &addr, ErrorCode::IsADirectory)),
            Handle::Directory(_) => Err(Error::IsADirectory(addr.to_string())),
        }
    }

    async fn write_file(&self, address: &str, content: &[u8]) -> Result<()> {
        let addr = self.parse(address)?;
        fs_trace!(address = %addr, bytes = content.len(), "handle write");

        let Some((parents, name)) = addr.split_last() else {
            return Err(Error::IsADirectory(addr.to_string()));
        };
        let parent = self.walk(parents, &addr, false).await?;
        let file = parent
            .get_file_handle(name, true)
            .await
            .map_err(|e| translate(e, &addr, ErrorCode::IsADirectory))?;

        let mut stream = file
            .create_writable()
            .await
            .map_err(|e| Error::medium(&addr, e))?;
        stream
            .write(content)
            .await
            .map_err(|e| Error::medium(&addr, e))?;
        stream.close().await.map_err(|e| Error::medium(&addr, e))
    }

    async fn stat(&self, address: &str) -> Result<Metadata> {
        let addr = self.parse(address)?;
        Ok(match self.resolve(&addr).await? {
            Handle::File(_) => Metadata::file(),
            Handle::Directory(_) => Metadata::directory(),
        })
    }

    async fn remove(&self, address: &str) -> Result<()> {
        let addr = self.parse(address)?;
        fs_trace!(address = %addr, "handle remove");

        let Some((parents, name)) = addr.split_last() else {
            return Err(Error::PermissionDenied(addr.to_string()));
        };
        let parent = self.walk(parents, &addr, false).await?;
        parent.remove_entry(name, true).await.map_err(|_e| {
            fs_trace!(address = %addr, error = %_e, "handle remove failed");
            Error::NotFound(addr.to_string())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fs::handle::{MemoryDirectoryHandle, MemoryStorageManager};
    use pretty_assertions::assert_eq;

    async fn fresh() -> (MemoryStorageManager, HandleFs) {
        let manager = MemoryStorageManager::default();
        let fs = HandleFs::create(&manager, "test").await.unwrap();
        (manager, fs)
    }

    fn sorted_names(entries: Vec<DirEntry>) -> Vec<String> {
        let mut names: Vec<String> = entries.into_iter().map(|e| e.name).collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_create_uses_prefixed_directory() {
        let manager = MemoryStorageManager::default();
        HandleFs::create(&manager, "team/pack").await.unwrap();
        let staging = manager.get_directory().await.unwrap();
        let names: Vec<String> = staging
            .entries()
            .await
            .unwrap()
            .iter()
            .map(|h| h.name().to_string())
            .collect();
        assert_eq!(names, vec!["mountfs_team_pack".to_string()]);
    }

    #[tokio::test]
    async fn test_write_read_round_trip() {
        let (_m, fs) = fresh().await;
        fs.mkdir("file:///data", false).await.unwrap();
        fs.write_file("file:///data/a.json", b"{}").await.unwrap();
        fs.write_file("file:///data/a.json", b"[1]").await.unwrap();

        assert_eq!(fs.read_file("file:///data/a.json").await.unwrap(), b"[1]");
        assert!(fs.stat("file:///data/a.json").await.unwrap().is_file());
        assert!(fs.stat("file:///data/").await.unwrap().is_dir());
        assert_eq!(
            sorted_names(fs.read_dir("file:///data").await.unwrap()),
            vec!["a.json"]
        );
    }

    #[tokio::test]
    async fn test_mkdir_semantics() {
        let (_m, fs) = fresh().await;
        assert_eq!(
            fs.mkdir("file:///a/b", false).await.unwrap_err().code(),
            ErrorCode::NotFound
        );

        fs.mkdir("file:///a/b/c", true).await.unwrap();
        fs.mkdir("file:///a/b/c", true).await.unwrap();
        assert_eq!(
            fs.mkdir("file:///a/b/c", false).await.unwrap_err().code(),
            ErrorCode::AlreadyExists
        );

        fs.write_file("file:///a/f", b"").await.unwrap();
        assert_eq!(
            fs.mkdir("file:///a/f", true).await.unwrap_err().code(),
            ErrorCode::AlreadyExists
        );
        assert_eq!(
            fs.mkdir("file:///a/f/g", true).await.unwrap_err().code(),
            ErrorCode::NotADirectory
        );

        fs.mkdir("file:///", true).await.unwrap();
        assert_eq!(
            fs.mkdir("file:///", false).await.unwrap_err().code(),
            ErrorCode::AlreadyExists
        );
    }

    #[tokio::test]
    async fn test_kind_conflicts() {
        let (_m, fs) = fresh().await;
        fs.mkdir("file:///d", false).await.unwrap();
        fs.write_file("file:///f", b"x").await.unwrap();

        assert_eq!(
            fs.write_file("file:///d", b"x").await.unwrap_err().code(),
            ErrorCode::IsADirectory
        );
        assert_eq!(
            fs.read_file("file:///d").await.unwrap_err().code(),
            ErrorCode::IsADirectory
        );
        assert_eq!(
            fs.read_dir("file:///f").await.unwrap_err().code(),
            ErrorCode::NotADirectory
        );
        assert_eq!(
            fs.write_file("file:///f/x", b"x").await.unwrap_err().code(),
            ErrorCode::NotADirectory
        );
        assert_eq!(
            fs.write_file("file:///", b"x").await.unwrap_err().code(),
            ErrorCode::IsADirectory
        );
    }

    #[tokio::test]
    async fn test_remove() {
        let (_m, fs) = fresh().await;
        fs.mkdir("file:///d/e", true).await.unwrap();
        fs.write_file("file:///d/e/f", b"x").await.unwrap();

        fs.remove("file:///d").await.unwrap();
        assert_eq!(
            fs.stat("file:///d").await.unwrap_err().code(),
            ErrorCode::NotFound
        );
        assert_eq!(
            fs.remove("file:///d").await.unwrap_err().code(),
            ErrorCode::NotFound
        );
        assert_eq!(
            fs.remove("file:///").await.unwrap_err().code(),
            ErrorCode::PermissionDenied
        );
    }

    #[tokio::test]
    async fn test_refused_writes_are_eperm() {
        let root = MemoryDirectoryHandle::new("ro").read_only();
        let fs = HandleFs::new(Arc::new(root));
        assert_eq!(
            fs.write_file("file:///a", b"x").await.unwrap_err().code(),
            ErrorCode::PermissionDenied
        );
        assert_eq!(
            fs.mkdir("file:///a", false).await.unwrap_err().code(),
            ErrorCode::PermissionDenied
        );
    }

    #[tokio::test]
    async fn test_outside_base() {
        let (_m, fs) = fresh().await;
        let fs = fs.with_base("file:///pack");
        assert_eq!(fs.base(), "file:///pack/");
        fs.write_file("file:///pack/a", b"x").await.unwrap();
        assert_eq!(
            fs.read_file("file:///a").await.unwrap_err().code(),
            ErrorCode::AccessDenied
        );
    }

    #[tokio::test]
    async fn test_probe_leaves_no_trace() {
        let manager = MemoryStorageManager::default();
        assert_eq!(HandleFs::probe_support(&manager).await, Support::Supported);
        let staging = manager.get_directory().await.unwrap();
        assert!(staging.entries().await.unwrap().is_empty());
    }

    /// Staging root whose listing always fails.
    struct UnlistableDir(Arc<MemoryDirectoryHandle>);

    #[async_trait]
    impl DirectoryHandle for UnlistableDir {
        fn name(&self) -> &str {
            self.0.name()
        }

        async fn get_directory_handle(
            &self,
            name: &str,
            create: bool,
        ) -> HandleResult<Arc<dyn DirectoryHandle>> {
            self.0.get_directory_handle(name, create).await
        }

        async fn get_file_handle(
            &self,
            name: &str,
            create: bool,
        ) -> HandleResult<Arc<dyn crate::fs::handle::FileHandle>> {
            self.0.get_file_handle(name, create).await
        }

        async fn entries(&self) -> HandleResult<Vec<Handle>> {
            Err(HandleError::NotAllowed)
        }

        async fn remove_entry(&self, name: &str, recursive: bool) -> HandleResult<()> {
            self.0.remove_entry(name, recursive).await
        }
    }

    struct UnlistableManager(Arc<MemoryDirectoryHandle>);

    #[async_trait]
    impl StorageManager for UnlistableManager {
        async fn get_directory(&self) -> HandleResult<Arc<dyn DirectoryHandle>> {
            Ok(Arc::new(UnlistableDir(self.0.clone())))
        }
    }

    #[tokio::test]
    async fn test_failed_listing_still_removes_test_file() {
        let staging = Arc::new(MemoryDirectoryHandle::new(""));
        let manager = UnlistableManager(staging.clone());

        assert_eq!(
            HandleFs::probe_support(&manager).await,
            Support::Unsupported
        );
        assert!(staging.entries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_probe_outcomes() {
        let granted = MemoryStorageManager::new(
            MemoryDirectoryHandle::new("").with_permission(Some(PermissionState::Granted)),
        );
        assert_eq!(HandleFs::probe_support(&granted).await, Support::Supported);

        let read_only = MemoryStorageManager::new(MemoryDirectoryHandle::new("").read_only());
        assert_eq!(
            HandleFs::probe_support(&read_only).await,
            Support::Unsupported
        );

        let missing = MemoryStorageManager::unavailable();
        assert_eq!(HandleFs::probe_support(&missing).await, Support::Unsupported);
    }

    #[tokio::test]
    async fn test_support_cache_probes_once() {
        let cache = SupportCache::new();
        assert_eq!(cache.get(), Support::Unknown);

        let missing = MemoryStorageManager::unavailable();
        assert_eq!(cache.detect(&missing).await, Support::Unsupported);

        // Cached answer wins over a now-working manager
        let working = MemoryStorageManager::default();
        assert_eq!(cache.detect(&working).await, Support::Unsupported);

        cache.reset();
        assert_eq!(cache.detect(&working).await, Support::Supported);
        assert_eq!(cache.get(), Support::Supported);
    }

    #[tokio::test]
    async fn test_probe_tokens_differ() {
        assert_ne!(probe_token(), probe_token());
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[tokio::test]
    async fn test_host_backed_store() {
        use crate::fs::handle::HostStorageManager;

        let tmp = tempfile::tempdir().unwrap();
        let manager = HostStorageManager::new(tmp.path());
        assert_eq!(HandleFs::probe_support(&manager).await, Support::Supported);

        let fs = HandleFs::create(&manager, "a/b").await.unwrap();
        fs.mkdir("file:///x/y", true).await.unwrap();
        fs.write_file("file:///x/y/z.txt", b"host").await.unwrap();

        let on_disk = tmp.path().join("mountfs_a_b/x/y/z.txt");
        assert_eq!(std::fs::read(on_disk).unwrap(), b"host");
        assert_eq!(fs.read_file("file:///x/y/z.txt").await.unwrap(), b"host");
    }
}
