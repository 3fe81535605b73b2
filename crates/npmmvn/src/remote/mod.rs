//! Remote artifact store
//!
//! Key/value access to a Maven-style repository over HTTP, keyed by the
//! artifact URL of a package version.
//!
//! ## Artifact layout
//!
//! ```text
//! <repository>/node_modules/<name>/<version>/<name>-<version>.tar.gz
//! ```
//!
//! Deploy and restore compute this URL independently; [`artifact_url`] is the
//! only place it is defined.
//!
//! ## HTTP contract
//!
//! | Operation | Success            | Anything else       |
//! |-----------|--------------------|---------------------|
//! | HEAD      | 200 true, 404 false| `UnexpectedStatus`  |
//! | PUT       | 201                | `UnexpectedStatus`  |
//! | GET       | 200                | `UnexpectedStatus`  |

mod http;

pub use http::HttpStore;

use reqwest::{Method, StatusCode};
use std::future::Future;
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use thiserror::Error;
use url::Url;

use crate::archive::NESTED_DEPENDENCY_DIR;

/// Errors that can occur while talking to the artifact repository
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The server answered with a status outside the contract
    #[error("Got code {status} for {method} {url}")]
    UnexpectedStatus {
        method: Method,
        status: u16,
        url: String,
    },

    /// Connection, timeout or protocol failure
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Local file IO around an upload or download
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Artifact URL could not be built from the repository base
    #[error("Invalid artifact URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Contract of the remote artifact repository
///
/// Implementations must not deduplicate: callers are responsible for never
/// uploading to a URL already proven to exist.
pub trait ArtifactStore: Send + Sync {
    /// Probe for an artifact. 200 is `true`, 404 is `false`.
    fn exists(&self, url: &Url) -> impl Future<Output = Result<bool, RemoteError>> + Send;

    /// Upload `file` to `url`. Succeeds on exactly 201.
    fn put(&self, file: &Path, url: &Url) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Download `url` into a private temporary file owned by the caller.
    /// Succeeds on exactly 200.
    fn get(&self, url: &Url) -> impl Future<Output = Result<TempPath, RemoteError>> + Send;
}

/// Artifact URL of `name@version` under `repository`
///
/// Resolved with standard URL reference resolution, so a base without a
/// trailing slash loses its last path segment.
pub fn artifact_url(repository: &Url, name: &str, version: &str) -> Result<Url, RemoteError> {
    let relative = format!(
        "{}/{}/{}/{}",
        NESTED_DEPENDENCY_DIR,
        name,
        version,
        artifact_file_name(name, version)
    );
    Ok(repository.join(&relative)?)
}

/// File name of the artifact for `name@version`
pub fn artifact_file_name(name: &str, version: &str) -> String {
    format!("{}-{}.tar.gz", name, version)
}

/// Interpret a HEAD response status
pub fn head_outcome(status: StatusCode, url: &Url) -> Result<bool, RemoteError> {
    match status {
        StatusCode::OK => Ok(true),
        StatusCode::NOT_FOUND => Ok(false),
        other => Err(unexpected(Method::HEAD, other, url)),
    }
}

/// Require exactly `expected` as the response status
pub fn expect_status(
    method: Method,
    expected: StatusCode,
    status: StatusCode,
    url: &Url,
) -> Result<(), RemoteError> {
    if status == expected {
        Ok(())
    } else {
        Err(unexpected(method, status, url))
    }
}

fn unexpected(method: Method, status: StatusCode, url: &Url) -> RemoteError {
    RemoteError::UnexpectedStatus {
        method,
        status: status.as_u16(),
        url: url.to_string(),
    }
}
