//! Global configuration (~/.npmmvn/config.toml)
//!
//! Everything is optional; a missing file means defaults. The repository
//! base URL is resolved from, in order: the `--repository` flag, the
//! `NPMMVN_REPOSITORY` environment variable, `mavenRepository` in the
//! project's package.json, and finally this file.

use crate::package::PackageDescriptor;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Environment variable overriding the repository base URL
pub const REPOSITORY_ENV: &str = "NPMMVN_REPOSITORY";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// No repository configured anywhere
    #[error(
        "No repository configured. Set \"mavenRepository\" in package.json, \
         pass --repository or set NPMMVN_REPOSITORY."
    )]
    NoRepository,

    /// Repository URL does not parse
    #[error("Invalid repository URL {url:?}: {source}")]
    InvalidRepository {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// What to do when an artifact for `(name, version)` already exists remotely
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingArtifactPolicy {
    /// Treat versions as immutable: an existing artifact satisfies the package
    #[default]
    Trust,
    /// Download the existing artifact and fail if its contents differ
    Verify,
}

/// npmmvn configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Fallback repository base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,

    /// HTTP client settings
    pub http: HttpSettings,

    /// Deploy settings
    pub deploy: DeploySettings,

    /// Restore settings
    pub restore: RestoreSettings,
}

/// HTTP client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Overall per-request timeout; unbounded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// TCP connect timeout
    pub connect_timeout_secs: u64,
}

/// Deploy settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploySettings {
    /// Policy for artifacts that already exist remotely
    pub existing: ExistingArtifactPolicy,
}

/// Restore settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreSettings {
    /// Command run in the project root after anything was fetched
    pub rebuild_command: Vec<String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            connect_timeout_secs: 10,
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for RestoreSettings {
    fn default() -> Self {
        Self {
            rebuild_command: vec!["npm".to_string(), "rebuild".to_string()],
        }
    }
}

impl Config {
    /// Load the global configuration, or defaults if there is none
    pub fn load() -> Result<Self, ConfigError> {
        match global_config_path() {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from `path`; a missing file yields defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_str(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Parse configuration from TOML
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Resolve the repository base URL for a project
    ///
    /// Reads `NPMMVN_REPOSITORY` from the environment.
    pub fn repository_for(
        &self,
        flag: Option<&str>,
        descriptor: &PackageDescriptor,
    ) -> Result<Url, ConfigError> {
        let env = std::env::var(REPOSITORY_ENV).ok();
        pick_repository(
            flag,
            env.as_deref(),
            descriptor.maven_repository.as_deref(),
            self.repository.as_deref(),
        )
    }
}

/// First non-empty candidate wins: flag, environment, package.json, config
pub fn pick_repository(
    flag: Option<&str>,
    env: Option<&str>,
    descriptor: Option<&str>,
    config: Option<&str>,
) -> Result<Url, ConfigError> {
    let raw = [flag, env, descriptor, config]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .ok_or(ConfigError::NoRepository)?;

    Url::parse(raw).map_err(|source| ConfigError::InvalidRepository {
        url: raw.to_string(),
        source,
    })
}

/// Path of the global configuration file
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".npmmvn").join("config.toml"))
}
