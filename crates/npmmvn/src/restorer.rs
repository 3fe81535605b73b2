//! Manifest-driven restore
//!
//! Re-materializes a dependency tree from the repository. A package is
//! fetched only when its package.json is absent locally; a present package is
//! left untouched, and its own dependencies are still visited. Version
//! differences between the manifest and a present package are not detected.

use crate::archive::{self, ArchiveError, NESTED_DEPENDENCY_DIR};
use crate::config::ConfigError;
use crate::manifest::{ManifestError, Node};
use crate::package::{DescriptorError, PACKAGE_DESCRIPTOR};
use crate::rebuild::RebuildError;
use crate::remote::{artifact_url, ArtifactStore, RemoteError};
use futures::future::{try_join_all, BoxFuture, FutureExt};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Errors that can fail a restore run
#[derive(Debug, Error)]
pub enum RestoreError {
    /// Checking or creating local directories failed
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The project's own package.json could not be read
    #[error("Project descriptor error: {0}")]
    Descriptor(#[from] DescriptorError),

    #[error("Rebuild failed: {0}")]
    Rebuild(#[from] RebuildError),
}

/// Whether any package in a restore result was fetched
pub fn any_fetched(results: &[bool]) -> bool {
    results.iter().any(|fetched| *fetched)
}

/// Restores manifest trees from the repository
pub struct Restorer<'a, S> {
    store: &'a S,
    repository: &'a Url,
}

impl<'a, S: ArtifactStore> Restorer<'a, S> {
    pub fn new(store: &'a S, repository: &'a Url) -> Self {
        Self { store, repository }
    }

    /// Restore `nodes` into `target` (usually `<project>/node_modules`)
    ///
    /// Returns one flag per node in pre-order (a node, then its subtree):
    /// `true` when that node had to be fetched.
    pub async fn restore(&self, nodes: &[Node], target: &Path) -> Result<Vec<bool>, RestoreError> {
        self.restore_level(nodes, target.to_path_buf()).await
    }

    fn restore_level<'s>(
        &'s self,
        nodes: &'s [Node],
        target: PathBuf,
    ) -> BoxFuture<'s, Result<Vec<bool>, RestoreError>> {
        async move {
            let results =
                try_join_all(nodes.iter().map(|node| self.restore_node(node, &target))).await?;
            Ok(results.into_iter().flatten().collect())
        }
        .boxed()
    }

    async fn restore_node(&self, node: &Node, target: &Path) -> Result<Vec<bool>, RestoreError> {
        let package_dir = target.join(&node.name);

        // Descendant paths do not depend on whether this package is fetched
        let fetch = self.fetch_if_missing(node, target, &package_dir);
        let children = self.restore_level(&node.dependencies, package_dir.join(NESTED_DEPENDENCY_DIR));

        let (fetched, descendants) = tokio::try_join!(fetch, children)?;

        let mut results = Vec::with_capacity(1 + descendants.len());
        results.push(fetched);
        results.extend(descendants);
        Ok(results)
    }

    async fn fetch_if_missing(
        &self,
        node: &Node,
        target: &Path,
        package_dir: &Path,
    ) -> Result<bool, RestoreError> {
        let descriptor = package_dir.join(PACKAGE_DESCRIPTOR);
        debug!(path = %package_dir.display(), "Check");

        match tokio::fs::metadata(&descriptor).await {
            Ok(_) => return Ok(false),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(RestoreError::Io {
                    path: descriptor,
                    source,
                })
            }
        }

        tokio::fs::create_dir_all(target)
            .await
            .map_err(|source| RestoreError::Io {
                path: target.to_path_buf(),
                source,
            })?;

        let url = artifact_url(self.repository, &node.name, &node.version)?;
        let downloaded = self.store.get(&url).await?;
        archive::unpack(&downloaded, package_dir).await?;

        Ok(true)
    }
}
