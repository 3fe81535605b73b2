//! Deploy run
//!
//! Scans the project's node_modules, publishes every missing package and
//! writes .npmmvn.json.

use crate::archive::NESTED_DEPENDENCY_DIR;
use crate::cache::ExistenceCache;
use crate::config::{Config, ExistingArtifactPolicy};
use crate::manifest::{Manifest, MANIFEST_FILE};
use crate::package::{PackageDescriptor, PACKAGE_DESCRIPTOR};
use crate::remote::ArtifactStore;
use crate::scanner::{DeployError, Scanner};
use std::path::PathBuf;
use tracing::info;
use url::Url;

/// Deploy options
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Project root (contains package.json and node_modules)
    pub project_dir: PathBuf,

    /// Repository URL overriding every other source
    pub repository: Option<String>,

    /// Policy overriding the configured one
    pub existing: Option<ExistingArtifactPolicy>,
}

impl DeployOptions {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            repository: None,
            existing: None,
        }
    }
}

/// Deploy result
#[derive(Debug)]
pub struct DeployResult {
    /// Repository the run published to
    pub repository: Url,

    /// The manifest that was written
    pub manifest: Manifest,

    /// Where it was written
    pub manifest_path: PathBuf,

    /// Number of packages in the tree
    pub scanned: usize,

    /// Number of artifacts uploaded
    pub uploaded: usize,

    /// Number of artifacts that already existed
    pub existing: usize,
}

/// Deploy a project's dependency tree
///
/// The manifest is only written once every package has been scanned and
/// published; on failure the previous manifest, if any, is left as it was.
pub async fn deploy_project<S: ArtifactStore>(
    store: &S,
    config: &Config,
    options: &DeployOptions,
) -> Result<DeployResult, DeployError> {
    let project_dir = &options.project_dir;
    let descriptor = PackageDescriptor::read(&project_dir.join(PACKAGE_DESCRIPTOR)).await?;
    let repository = config.repository_for(options.repository.as_deref(), &descriptor)?;
    let policy = options.existing.unwrap_or(config.deploy.existing);

    info!(
        project = descriptor.name.as_deref().unwrap_or("<unnamed>"),
        %repository,
        ?policy,
        "Deploying dependencies"
    );

    let cache = ExistenceCache::new();
    let scanner = Scanner::new(store, &cache, &repository).with_policy(policy);
    let nodes = scanner.scan(&project_dir.join(NESTED_DEPENDENCY_DIR)).await?;

    let manifest = Manifest::new(nodes);
    let manifest_path = project_dir.join(MANIFEST_FILE);
    manifest.save(&manifest_path).await?;

    let stats = scanner.stats();
    Ok(DeployResult {
        scanned: stats.scanned(),
        uploaded: stats.uploaded(),
        existing: stats.existing(),
        repository: repository.clone(),
        manifest,
        manifest_path,
    })
}
