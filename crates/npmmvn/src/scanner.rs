//! Dependency tree scanning with publish-if-missing
//!
//! Walks `node_modules` depth-first. For every package directory the scanner
//! reads its version, publishes its artifact unless the repository already
//! has it, and scans its own `node_modules`, all concurrently. A package's
//! [`Node`] is complete only once its publish step and its whole subtree
//! have finished; the first failure anywhere fails the scan.

use crate::archive::{self, is_nested_dependency_dir, ArchiveError, NESTED_DEPENDENCY_DIR};
use crate::cache::ExistenceCache;
use crate::config::{ConfigError, ExistingArtifactPolicy};
use crate::manifest::{ManifestError, Node};
use crate::package::{DescriptorError, PackageDescriptor, PACKAGE_DESCRIPTOR};
use crate::remote::{artifact_url, ArtifactStore, RemoteError};
use futures::future::{try_join_all, BoxFuture, FutureExt};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

/// Unexpected filesystem failures while discovering the tree
///
/// A missing `node_modules` is not an error; it is an empty level.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Listing a directory failed
    #[error("Failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Entry name is not valid UTF-8
    #[error("Directory entry name is not valid UTF-8: {0}")]
    InvalidName(PathBuf),

    /// A package's package.json is missing, unreadable or has no version
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

/// Errors that can fail a deploy run
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The repository holds different contents under the same version
    #[error("{name}@{version} already exists at {url} with different contents")]
    VersionDrift {
        name: String,
        version: String,
        url: String,
    },

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The project's own package.json could not be read
    #[error("Project descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),
}

/// Counters collected during a scan
#[derive(Debug, Default)]
pub struct ScanStats {
    scanned: AtomicUsize,
    uploaded: AtomicUsize,
    existing: AtomicUsize,
}

impl ScanStats {
    /// Packages discovered
    pub fn scanned(&self) -> usize {
        self.scanned.load(Ordering::Relaxed)
    }

    /// Artifacts uploaded by this run
    pub fn uploaded(&self) -> usize {
        self.uploaded.load(Ordering::Relaxed)
    }

    /// Artifacts found already present in the repository
    pub fn existing(&self) -> usize {
        self.existing.load(Ordering::Relaxed)
    }
}

/// Entries starting with a dot (`.bin`, `.cache`, ...) are never packages
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Scans a dependency tree and publishes every package missing remotely
pub struct Scanner<'a, S> {
    store: &'a S,
    cache: &'a ExistenceCache,
    repository: &'a Url,
    policy: ExistingArtifactPolicy,
    stats: ScanStats,
}

impl<'a, S: ArtifactStore> Scanner<'a, S> {
    /// Create a scanner publishing to `repository` through `store`
    pub fn new(store: &'a S, cache: &'a ExistenceCache, repository: &'a Url) -> Self {
        Self {
            store,
            cache,
            repository,
            policy: ExistingArtifactPolicy::default(),
            stats: ScanStats::default(),
        }
    }

    /// Set the policy for artifacts that already exist remotely
    pub fn with_policy(mut self, policy: ExistingArtifactPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    /// Scan the packages installed in `dir` (usually `<project>/node_modules`)
    pub async fn scan(&self, dir: &Path) -> Result<Vec<Node>, DeployError> {
        self.scan_dir(dir.to_path_buf()).await
    }

    fn scan_dir(&self, dir: PathBuf) -> BoxFuture<'_, Result<Vec<Node>, DeployError>> {
        async move {
            let Some(names) = list_packages(&dir).await? else {
                return Ok(Vec::new());
            };
            try_join_all(names.into_iter().map(|name| self.scan_package(&dir, name))).await
        }
        .boxed()
    }

    async fn scan_package(&self, parent: &Path, name: String) -> Result<Node, DeployError> {
        let package_dir = parent.join(&name);

        let publish = async {
            let descriptor_path = package_dir.join(PACKAGE_DESCRIPTOR);
            let descriptor = PackageDescriptor::read(&descriptor_path)
                .await
                .map_err(ScanError::from)?;
            let version = descriptor
                .require_version(&descriptor_path)
                .map_err(ScanError::from)?
                .to_string();

            self.maybe_deploy(&package_dir, &name, &version).await?;
            Ok::<_, DeployError>(version)
        };
        let children = self.scan_dir(package_dir.join(NESTED_DEPENDENCY_DIR));

        let (version, dependencies) = tokio::try_join!(publish, children)?;
        self.stats.scanned.fetch_add(1, Ordering::Relaxed);

        Ok(Node {
            name,
            version,
            dependencies,
        })
    }

    /// Publish `package_dir` as `name@version` unless the repository has it
    ///
    /// Uploads at most once per URL per run: the existence cache short-cuts
    /// repeated probes and hands the upload to a single task. A failed or
    /// cancelled upload releases its claim.
    pub async fn maybe_deploy(
        &self,
        package_dir: &Path,
        name: &str,
        version: &str,
    ) -> Result<(), DeployError> {
        let url = artifact_url(self.repository, name, version)?;

        if self.cache.is_known(&url) {
            debug!(%url, "Known");
            return Ok(());
        }

        if self.store.exists(&url).await? {
            info!(%url, "Exists");
            // Artifacts this run uploaded, or is uploading, are trusted
            let own_upload = self.cache.is_own_upload(&url);
            self.cache.mark_known(&url);
            self.stats.existing.fetch_add(1, Ordering::Relaxed);
            if self.policy == ExistingArtifactPolicy::Verify && !own_upload {
                self.verify_existing(package_dir, name, version, &url).await?;
            }
            return Ok(());
        }

        let Some(claim) = self.cache.begin_upload(&url) else {
            debug!(%url, "Upload already claimed");
            return Ok(());
        };

        debug!(name, version, "Tar");
        let archive = archive::pack(package_dir, is_nested_dependency_dir).await?;
        self.store.put(&archive, &url).await?;
        claim.finish();
        self.stats.uploaded.fetch_add(1, Ordering::Relaxed);
        info!(%url, "Complete");

        Ok(())
    }

    async fn verify_existing(
        &self,
        package_dir: &Path,
        name: &str,
        version: &str,
        url: &Url,
    ) -> Result<(), DeployError> {
        let remote = self.store.get(url).await?;
        let (remote_digest, local_digest) = tokio::try_join!(
            archive::archive_digest(&remote),
            archive::tree_digest(package_dir, is_nested_dependency_dir),
        )?;

        if remote_digest != local_digest {
            return Err(DeployError::VersionDrift {
                name: name.to_string(),
                version: version.to_string(),
                url: url.to_string(),
            });
        }

        debug!(%url, "Verified");
        Ok(())
    }
}

/// Names of the package directories directly inside `dir`, sorted
///
/// `None` when `dir` does not exist. Hidden entries and anything that is not
/// a real directory (files, symlinks) are skipped.
async fn list_packages(dir: &Path) -> Result<Option<Vec<String>>, ScanError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ScanError::ReadDir {
                path: dir.to_path_buf(),
                source,
            })
        }
    };
    let read_error = |source| ScanError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_error)? {
        if !entry.file_type().await.map_err(read_error)?.is_dir() {
            continue;
        }
        let name = entry
            .file_name()
            .into_string()
            .map_err(|_| ScanError::InvalidName(entry.path()))?;
        if is_hidden(&name) {
            continue;
        }
        names.push(name);
    }

    names.sort();
    Ok(Some(names))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_is_hidden() {
        assert!(is_hidden(".bin"));
        assert!(is_hidden(".package-lock.json"));
        assert!(!is_hidden("lodash"));
        assert!(!is_hidden("a.b"));
    }

    #[tokio::test]
    async fn test_list_packages_missing_dir() {
        let temp = TempDir::new().unwrap();
        let listed = list_packages(&temp.path().join("node_modules")).await.unwrap();
        assert_eq!(listed, None);
    }

    #[tokio::test]
    async fn test_list_packages_filters_and_sorts() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("zeta")).unwrap();
        fs::create_dir_all(root.join("alpha")).unwrap();
        fs::create_dir_all(root.join(".bin")).unwrap();
        fs::write(root.join("README.md"), "not a package").unwrap();

        let listed = list_packages(root).await.unwrap().unwrap();
        assert_eq!(listed, vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_packages_skips_symlinks() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("real")).unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("linked")).unwrap();

        let listed = list_packages(root).await.unwrap().unwrap();
        assert_eq!(listed, vec!["real".to_string()]);
    }

    #[tokio::test]
    async fn test_list_packages_on_file_is_error() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("node_modules");
        fs::write(&file, "oops").unwrap();

        let result = list_packages(&file).await;
        assert!(matches!(result, Err(ScanError::ReadDir { .. })));
    }
}
