//! Package descriptor reading (package.json)
//!
//! The descriptor is owned by npm; npmmvn only reads the handful of fields it
//! needs and ignores everything else.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// File name of the package descriptor inside a package directory
pub const PACKAGE_DESCRIPTOR: &str = "package.json";

/// Errors that can occur while reading a package descriptor
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// Failed to read the descriptor file
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Descriptor is not valid JSON
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Missing required field
    #[error("{path} has no \"{field}\" field")]
    MissingField { path: PathBuf, field: &'static str },
}

/// The subset of package.json that npmmvn cares about
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct PackageDescriptor {
    /// Package name
    #[serde(default)]
    pub name: Option<String>,

    /// Exact installed version
    #[serde(default)]
    pub version: Option<String>,

    /// Base URL of the Maven repository used by deploy and restore
    #[serde(default, rename = "mavenRepository")]
    pub maven_repository: Option<String>,
}

impl PackageDescriptor {
    /// Read and parse a descriptor file
    pub async fn read(path: &Path) -> Result<Self, DescriptorError> {
        debug!(path = %path.display(), "Scan");
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| DescriptorError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&content, path)
    }

    /// Parse descriptor JSON; `path` is only used for error messages
    pub fn parse(content: &str, path: &Path) -> Result<Self, DescriptorError> {
        serde_json::from_str(content).map_err(|source| DescriptorError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The version, or an error naming the descriptor when it is absent
    pub fn require_version(&self, path: &Path) -> Result<&str, DescriptorError> {
        self.version
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| DescriptorError::MissingField {
                path: path.to_path_buf(),
                field: "version",
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reads_known_fields() {
        let json = r#"{
            "name": "my-app",
            "version": "1.4.2",
            "mavenRepository": "http://repo.example/npm/",
            "dependencies": { "left-pad": "^1.0.0" }
        }"#;

        let pkg = PackageDescriptor::parse(json, Path::new("package.json")).unwrap();
        assert_eq!(pkg.name.as_deref(), Some("my-app"));
        assert_eq!(pkg.version.as_deref(), Some("1.4.2"));
        assert_eq!(
            pkg.maven_repository.as_deref(),
            Some("http://repo.example/npm/")
        );
    }

    #[test]
    fn test_missing_version_is_reported() {
        let pkg = PackageDescriptor::parse(r#"{"name": "x"}"#, Path::new("x/package.json")).unwrap();
        let err = pkg.require_version(Path::new("x/package.json")).unwrap_err();
        assert!(matches!(
            err,
            DescriptorError::MissingField { field: "version", .. }
        ));
    }

    #[test]
    fn test_empty_version_is_missing() {
        let pkg = PackageDescriptor::parse(r#"{"version": ""}"#, Path::new("package.json")).unwrap();
        assert!(pkg.require_version(Path::new("package.json")).is_err());
    }

    #[test]
    fn test_invalid_json() {
        let result = PackageDescriptor::parse("{ not json", Path::new("package.json"));
        assert!(matches!(result, Err(DescriptorError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let result = PackageDescriptor::read(&temp.path().join(PACKAGE_DESCRIPTOR)).await;
        match result {
            Err(DescriptorError::Io { source, .. }) => {
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound)
            }
            other => panic!("expected Io error, got {:?}", other),
        }
    }
}
