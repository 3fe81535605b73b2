//! Shared helpers for npmmvn integration tests

#![allow(dead_code)]

use npmmvn::remote::{expect_status, head_outcome};
use npmmvn::{ArtifactStore, Rebuild, RebuildError, RemoteError};
use parking_lot::Mutex;
use reqwest::{Method, StatusCode};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempPath;
use url::Url;

pub const REPOSITORY: &str = "http://repo.example/repository/npm/";

pub fn repository() -> Url {
    Url::parse(REPOSITORY).unwrap()
}

/// In-memory repository that follows the HTTP contract
///
/// Statuses can be overridden per method to simulate a misbehaving server.
#[derive(Default)]
pub struct MemoryStore {
    artifacts: Mutex<HashMap<String, Vec<u8>>>,
    uploads: Mutex<Vec<String>>,
    head_status: Mutex<Option<StatusCode>>,
    put_status: Mutex<Option<StatusCode>>,
    get_status: Mutex<Option<StatusCode>>,
    heads: AtomicUsize,
    puts: AtomicUsize,
    gets: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_head(&self, status: StatusCode) {
        *self.head_status.lock() = Some(status);
    }

    pub fn fail_put(&self, status: StatusCode) {
        *self.put_status.lock() = Some(status);
    }

    pub fn fail_get(&self, status: StatusCode) {
        *self.get_status.lock() = Some(status);
    }

    pub fn insert(&self, url: &Url, bytes: Vec<u8>) {
        self.artifacts.lock().insert(url.to_string(), bytes);
    }

    pub fn contains(&self, url: &Url) -> bool {
        self.artifacts.lock().contains_key(url.as_str())
    }

    pub fn len(&self) -> usize {
        self.artifacts.lock().len()
    }

    /// URLs in upload order
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().clone()
    }

    pub fn head_count(&self) -> usize {
        self.heads.load(Ordering::SeqCst)
    }

    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn reset_counts(&self) {
        self.heads.store(0, Ordering::SeqCst);
        self.puts.store(0, Ordering::SeqCst);
        self.gets.store(0, Ordering::SeqCst);
        self.uploads.lock().clear();
    }
}

impl ArtifactStore for MemoryStore {
    async fn exists(&self, url: &Url) -> Result<bool, RemoteError> {
        self.heads.fetch_add(1, Ordering::SeqCst);
        let status = match *self.head_status.lock() {
            Some(status) => status,
            None if self.contains(url) => StatusCode::OK,
            None => StatusCode::NOT_FOUND,
        };
        head_outcome(status, url)
    }

    async fn put(&self, file: &Path, url: &Url) -> Result<(), RemoteError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let bytes = tokio::fs::read(file).await.map_err(|source| RemoteError::Io {
            path: file.to_path_buf(),
            source,
        })?;
        let status = (*self.put_status.lock()).unwrap_or(StatusCode::CREATED);
        expect_status(Method::PUT, StatusCode::CREATED, status, url)?;

        self.uploads.lock().push(url.to_string());
        self.insert(url, bytes);
        Ok(())
    }

    async fn get(&self, url: &Url) -> Result<TempPath, RemoteError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        let stored = self.artifacts.lock().get(url.as_str()).cloned();
        let status = match (*self.get_status.lock(), &stored) {
            (Some(status), _) => status,
            (None, Some(_)) => StatusCode::OK,
            (None, None) => StatusCode::NOT_FOUND,
        };
        expect_status(Method::GET, StatusCode::OK, status, url)?;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&stored.unwrap_or_default()).unwrap();
        Ok(file.into_temp_path())
    }
}

/// Rebuild double that only counts invocations
#[derive(Default)]
pub struct CountingRebuild {
    calls: AtomicUsize,
}

impl CountingRebuild {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Rebuild for CountingRebuild {
    async fn rebuild(&self, _project_root: &Path) -> Result<(), RebuildError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Create an installed package with a package.json and one source file
pub fn write_package(dir: &Path, name: &str, version: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(
        dir.join("package.json"),
        format!(r#"{{"name": "{}", "version": "{}"}}"#, name, version),
    )
    .unwrap();
    fs::write(
        dir.join("index.js"),
        format!("module.exports = '{}@{}';\n", name, version),
    )
    .unwrap();
}

/// Create the project root package.json pointing at the test repository
pub fn write_project(root: &Path) {
    fs::create_dir_all(root).unwrap();
    fs::write(
        root.join("package.json"),
        format!(
            r#"{{"name": "app", "version": "0.0.1", "mavenRepository": "{}"}}"#,
            REPOSITORY
        ),
    )
    .unwrap();
}

/// Project with node_modules/A@1.0.0 which itself depends on B@2.0.0
pub fn write_a_b_project(root: &Path) {
    write_project(root);
    let a = root.join("node_modules").join("A");
    write_package(&a, "A", "1.0.0");
    write_package(&a.join("node_modules").join("B"), "B", "2.0.0");
}
