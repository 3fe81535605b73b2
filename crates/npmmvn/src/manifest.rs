//! Dependency manifest (.npmmvn.json)
//!
//! Records the shape of the scanned `node_modules` tree. It is the only state
//! a deploy run hands to a later restore run, possibly on another machine.
//!
//! ```json
//! [
//!     {
//!         "name": "A",
//!         "version": "1.0.0",
//!         "dependencies": [
//!             {
//!                 "name": "B",
//!                 "version": "2.0.0",
//!                 "dependencies": []
//!             }
//!         ]
//!     }
//! ]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the manifest in the project root
pub const MANIFEST_FILE: &str = ".npmmvn.json";

/// Errors that can occur during manifest operations
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Failed to read or write the manifest
    #[error("Manifest IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse or serialize JSON
    #[error("Failed to parse manifest: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Validation error
    #[error("Invalid manifest: {0}")]
    ValidationError(String),
}

/// One installed package and the packages nested inside it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Node {
    /// Directory name inside the parent's node_modules
    pub name: String,

    /// Exact version from the package's package.json
    pub version: String,

    /// Packages installed in this package's own node_modules
    #[serde(default)]
    pub dependencies: Vec<Node>,
}

impl Node {
    /// Create a node
    pub fn new(name: impl Into<String>, version: impl Into<String>, dependencies: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            dependencies,
        }
    }

    /// Number of nodes in this subtree, including this one
    pub fn count(&self) -> usize {
        1 + self.dependencies.iter().map(Node::count).sum::<usize>()
    }
}

/// The persisted tree: root-level packages in order
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Manifest {
    pub nodes: Vec<Node>,
}

impl Manifest {
    /// Create a manifest from root-level nodes
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// Parse a manifest from a string
    pub fn from_str(content: &str) -> Result<Self, ManifestError> {
        let manifest: Manifest = serde_json::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read a manifest file
    pub async fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ManifestError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_str(&content)
    }

    /// Serialize as JSON with a four-space indent
    pub fn to_json_pretty(&self) -> Result<String, ManifestError> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)?;
        // serde_json only ever emits UTF-8
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Write the manifest atomically
    ///
    /// The content goes to a sibling temporary file first and is renamed over
    /// `path`, so readers never see a partial manifest.
    pub async fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let content = self.to_json_pretty()?;
        let tmp_path = temp_path_for(path);

        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(|source| ManifestError::Io {
                path: tmp_path.clone(),
                source,
            })?;

        if let Err(source) = tokio::fs::rename(&tmp_path, path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(ManifestError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
        Ok(())
    }

    /// Check names and versions of every node
    ///
    /// Names become directory names on restore, so they must be single
    /// path segments and unique among siblings.
    pub fn validate(&self) -> Result<(), ManifestError> {
        validate_level(&self.nodes, "")
    }

    /// Total number of packages in the tree
    pub fn package_count(&self) -> usize {
        self.nodes.iter().map(Node::count).sum()
    }
}

fn validate_level(nodes: &[Node], parent: &str) -> Result<(), ManifestError> {
    let mut seen = HashSet::new();

    for node in nodes {
        let location = if parent.is_empty() {
            node.name.clone()
        } else {
            format!("{}/{}", parent, node.name)
        };

        if node.name.is_empty() || node.name == "." || node.name == ".." {
            return Err(ManifestError::ValidationError(format!(
                "Invalid package name {:?} under {:?}",
                node.name, parent
            )));
        }

        if node.name.contains('/') || node.name.contains('\\') {
            return Err(ManifestError::ValidationError(format!(
                "Package name '{}' must be a single path segment",
                location
            )));
        }

        if node.version.is_empty() {
            return Err(ManifestError::ValidationError(format!(
                "Package '{}' has empty version",
                location
            )));
        }

        if !seen.insert(node.name.as_str()) {
            return Err(ManifestError::ValidationError(format!(
                "Duplicate package '{}'",
                location
            )));
        }

        validate_level(&node.dependencies, &location)?;
    }

    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| MANIFEST_FILE.into());
    name.push(".tmp");
    path.with_file_name(name)
}
