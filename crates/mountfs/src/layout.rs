//! Standard project namespace.
//!
//! A project sees three kinds of stores through one router:
//!
//! | Prefix            | Store                         |
//! |-------------------|-------------------------------|
//! | `file:///cache/`  | cache store                   |
//! | `file:///root/`   | project root store            |
//! | `file:///<id>/`   | each bundled dependency       |
//!
//! Bindings are registered in that order, so with first-match resolution a
//! dependency named `cache` or `root` is unreachable.

use std::sync::Arc;

use crate::error::SetupError;
use crate::fs::{DEFAULT_BASE, FileSystem, MountFs, StaticFs};
use crate::logging::LogConfig;

/// Prefix the cache store is mounted at.
pub const CACHE_URI: &str = "file:///cache/";

/// Prefix the project root store is mounted at.
pub const ROOT_URI: &str = "file:///root/";

/// A read-mostly store shipped alongside a project.
pub trait BundledDependency: Send + Sync {
    /// Short identifier, e.g. `vanilla-mcdoc`.
    fn identifier(&self) -> &str;

    /// Store serving the dependency's files.
    fn filesystem(&self) -> Arc<dyn FileSystem>;

    /// Store-side prefix the mount point maps onto.
    fn base_uri(&self) -> String {
        DEFAULT_BASE.to_string()
    }

    /// Router-side prefix.
    fn mount_point(&self) -> String {
        format!("file:///{}/", self.identifier())
    }

    /// Name other tooling refers to the dependency by.
    fn dependency_name(&self) -> String {
        format!("@{}", self.identifier())
    }
}

/// Dependency served from a bundled snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotDependency {
    identifier: String,
    fs: Arc<StaticFs>,
}

impl SnapshotDependency {
    pub fn new(identifier: impl Into<String>, fs: StaticFs) -> Self {
        Self {
            identifier: identifier.into(),
            fs: Arc::new(fs),
        }
    }

    /// Load the snapshot from JSON text.
    pub fn from_json(identifier: impl Into<String>, text: &str) -> Result<Self, SetupError> {
        Ok(Self::new(identifier, StaticFs::from_json(text)?))
    }
}

impl BundledDependency for SnapshotDependency {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn filesystem(&self) -> Arc<dyn FileSystem> {
        self.fs.clone()
    }
}

/// Builder for the standard project router.
///
/// # Example
///
/// ```rust
/// use mountfs::{FileSystem, InMemoryFs, ProjectLayout, SnapshotDependency};
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let layout = ProjectLayout::new(Arc::new(InMemoryFs::new()), Arc::new(InMemoryFs::new()))
///     .dependency(SnapshotDependency::from_json("std", r#"{"a.txt": "aGk="}"#)?);
///
/// let fs = layout.build();
/// assert_eq!(fs.read_file("file:///std/a.txt").await?, b"hi");
/// assert_eq!(layout.dependency_names(), vec!["@std".to_string()]);
/// # Ok(())
/// # }
/// ```
pub struct ProjectLayout {
    root: Arc<dyn FileSystem>,
    cache: Arc<dyn FileSystem>,
    dependencies: Vec<Arc<dyn BundledDependency>>,
    log_config: LogConfig,
}

impl ProjectLayout {
    /// Layout with the given project root and cache stores.
    pub fn new(root: Arc<dyn FileSystem>, cache: Arc<dyn FileSystem>) -> Self {
        Self {
            root,
            cache,
            dependencies: Vec::new(),
            log_config: LogConfig::default(),
        }
    }

    /// Add a bundled dependency. Dependencies mount in the order added.
    pub fn dependency(mut self, dependency: impl BundledDependency + 'static) -> Self {
        self.dependencies.push(Arc::new(dependency));
        self
    }

    /// Log configuration handed to the built router.
    pub fn with_log_config(mut self, config: LogConfig) -> Self {
        self.log_config = config;
        self
    }

    /// `@<identifier>` for every dependency, in mount order.
    pub fn dependency_names(&self) -> Vec<String> {
        self.dependencies
            .iter()
            .map(|d| d.dependency_name())
            .collect()
    }

    /// Router with cache, root, then each dependency mounted.
    pub fn build(&self) -> MountFs {
        let router = MountFs::new().with_log_config(self.log_config.clone());
        router
            .mount(CACHE_URI, self.cache.clone())
            .mount(ROOT_URI, self.root.clone());
        for dependency in &self.dependencies {
            router.mount_at(
                &dependency.mount_point(),
                dependency.filesystem(),
                &dependency.base_uri(),
            );
        }
        router
    }
}
