//! npmmvn Library
//!
//! Mirrors a locally installed `node_modules` tree into a Maven-style artifact
//! repository and rebuilds that tree elsewhere. This crate provides:
//! - Package descriptor reading (package.json)
//! - Run-scoped existence caching of remote artifacts
//! - Per-package tar.gz packing and unpacking
//! - The remote artifact store contract and its HTTP implementation
//! - Recursive tree scanning with publish-if-missing
//! - The dependency manifest (.npmmvn.json)
//! - Manifest-driven restore
//! - The deploy and restore runs

pub mod archive;
pub mod cache;
pub mod commands;
pub mod config;
pub mod manifest;
pub mod package;
pub mod rebuild;
pub mod remote;
pub mod restorer;
pub mod scanner;

pub use archive::{is_nested_dependency_dir, ArchiveError, NESTED_DEPENDENCY_DIR};
pub use cache::{ExistenceCache, UploadClaim};
pub use commands::{
    deploy_project, restore_project, DeployOptions, DeployResult, RestoreOptions, RestoreOutcome,
};
pub use config::{Config, ConfigError, ExistingArtifactPolicy, HttpSettings};
pub use manifest::{Manifest, ManifestError, Node, MANIFEST_FILE};
pub use package::{DescriptorError, PackageDescriptor, PACKAGE_DESCRIPTOR};
pub use rebuild::{CommandRebuild, Rebuild, RebuildError};
pub use remote::{artifact_url, ArtifactStore, HttpStore, RemoteError};
pub use restorer::{any_fetched, RestoreError, Restorer};
pub use scanner::{DeployError, ScanError, ScanStats, Scanner};
