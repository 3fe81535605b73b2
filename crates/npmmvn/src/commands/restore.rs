//! Restore run
//!
//! Reads .npmmvn.json, fetches every package missing from node_modules and
//! runs the rebuild step if anything was fetched.

use crate::archive::NESTED_DEPENDENCY_DIR;
use crate::config::Config;
use crate::manifest::{Manifest, MANIFEST_FILE};
use crate::package::{PackageDescriptor, PACKAGE_DESCRIPTOR};
use crate::rebuild::Rebuild;
use crate::remote::ArtifactStore;
use crate::restorer::{any_fetched, RestoreError, Restorer};
use std::path::PathBuf;
use tracing::info;

/// Restore options
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Project root (contains package.json and .npmmvn.json)
    pub project_dir: PathBuf,

    /// Repository URL overriding every other source
    pub repository: Option<String>,

    /// Run the rebuild step when something was fetched
    pub rebuild: bool,
}

impl RestoreOptions {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            repository: None,
            rebuild: true,
        }
    }
}

/// How a successful restore ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Every package was already present
    NothingToDo,

    /// Packages were fetched
    Done {
        /// Number of packages fetched
        fetched: usize,
        /// Whether the rebuild step ran
        rebuilt: bool,
    },
}

/// Restore a project's dependency tree from its manifest
pub async fn restore_project<S: ArtifactStore, R: Rebuild>(
    store: &S,
    rebuilder: &R,
    config: &Config,
    options: &RestoreOptions,
) -> Result<RestoreOutcome, RestoreError> {
    let project_dir = &options.project_dir;
    let descriptor = PackageDescriptor::read(&project_dir.join(PACKAGE_DESCRIPTOR)).await?;
    let repository = config.repository_for(options.repository.as_deref(), &descriptor)?;
    let manifest = Manifest::load(&project_dir.join(MANIFEST_FILE)).await?;

    info!(
        %repository,
        packages = manifest.package_count(),
        "Restoring dependencies"
    );

    let restorer = Restorer::new(store, &repository);
    let results = restorer
        .restore(&manifest.nodes, &project_dir.join(NESTED_DEPENDENCY_DIR))
        .await?;

    if !any_fetched(&results) {
        return Ok(RestoreOutcome::NothingToDo);
    }

    let fetched = results.iter().filter(|fetched| **fetched).count();
    if options.rebuild {
        rebuilder.rebuild(project_dir).await?;
    }

    Ok(RestoreOutcome::Done {
        fetched,
        rebuilt: options.rebuild,
    })
}
