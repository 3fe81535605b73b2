//! Package archives
//!
//! Every published artifact is a gzip-compressed tar of one package
//! directory, with entries relative to that directory. The nested
//! `node_modules` directory never goes into an artifact: each artifact holds
//! exactly one package at exactly one version.
//!
//! tar and gzip are blocking, so all work runs on the blocking thread pool.
//! Each operation uses its own temporary file, which makes concurrent calls
//! on distinct paths safe.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tempfile::TempPath;
use thiserror::Error;
use walkdir::WalkDir;

/// Directory inside a package that holds its own dependencies
pub const NESTED_DEPENDENCY_DIR: &str = "node_modules";

/// Prefix for every temporary file npmmvn creates
pub(crate) const TEMP_PREFIX: &str = "npmmvn";

/// Errors that can occur while packing or unpacking archives
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Reading the package directory or compressing it failed
    #[error("Failed to pack {path}: {source}")]
    Pack {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The archive is corrupt or the target could not be written
    #[error("Failed to unpack into {path}: {source}")]
    Unpack {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Computing a content digest failed
    #[error("Failed to digest {path}: {source}")]
    Digest {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The blocking task panicked or was cancelled
    #[error("Archive task failed: {0}")]
    Task(String),
}

/// Exclusion predicate for nested dependency directories
///
/// Matches on the entry's file name, so a `node_modules` directory is
/// excluded at any depth inside the package.
pub fn is_nested_dependency_dir(relative: &Path) -> bool {
    relative.file_name() == Some(OsStr::new(NESTED_DEPENDENCY_DIR))
}

/// Pack the contents of `source_dir` into a temporary `.tar.gz`
///
/// Entries for which `exclude` returns true (given the path relative to
/// `source_dir`) are skipped together with everything beneath them. The
/// archive is deleted when the returned handle is dropped.
pub async fn pack<F>(source_dir: &Path, exclude: F) -> Result<TempPath, ArchiveError>
where
    F: Fn(&Path) -> bool + Send + 'static,
{
    let dir = source_dir.to_path_buf();
    run_blocking(move || {
        pack_blocking(&dir, &exclude).map_err(|source| ArchiveError::Pack {
            path: dir.clone(),
            source,
        })
    })
    .await
}

/// Unpack `archive` into `target_dir`, creating it and its parents
pub async fn unpack(archive: &Path, target_dir: &Path) -> Result<(), ArchiveError> {
    let archive = archive.to_path_buf();
    let target = target_dir.to_path_buf();
    run_blocking(move || {
        unpack_blocking(&archive, &target).map_err(|source| ArchiveError::Unpack {
            path: target.clone(),
            source,
        })
    })
    .await
}

/// Content digest of a package directory
///
/// Covers regular files and symlinks (by target), keyed by relative path.
/// Equal to [`archive_digest`] of `pack(dir, exclude)`.
pub async fn tree_digest<F>(dir: &Path, exclude: F) -> Result<String, ArchiveError>
where
    F: Fn(&Path) -> bool + Send + 'static,
{
    let dir = dir.to_path_buf();
    run_blocking(move || {
        tree_digest_blocking(&dir, &exclude).map_err(|source| ArchiveError::Digest {
            path: dir.clone(),
            source,
        })
    })
    .await
}

/// Content digest of a `.tar.gz` archive, comparable with [`tree_digest`]
pub async fn archive_digest(archive: &Path) -> Result<String, ArchiveError> {
    let archive = archive.to_path_buf();
    run_blocking(move || {
        archive_digest_blocking(&archive).map_err(|source| ArchiveError::Digest {
            path: archive.clone(),
            source,
        })
    })
    .await
}

async fn run_blocking<T, F>(work: F) -> Result<T, ArchiveError>
where
    F: FnOnce() -> Result<T, ArchiveError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ArchiveError::Task(e.to_string()))?
}

fn pack_blocking(dir: &Path, exclude: &dyn Fn(&Path) -> bool) -> io::Result<TempPath> {
    let file = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .suffix(".tar.gz")
        .tempfile()?;

    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    for entry in walk(dir, exclude) {
        let entry = entry?;
        builder.append_path_with_name(entry.path(), relative_to(dir, entry.path()))?;
    }

    let file = builder.into_inner()?.finish()?;
    Ok(file.into_temp_path())
}

fn unpack_blocking(archive: &Path, target: &Path) -> io::Result<()> {
    std::fs::create_dir_all(target)?;
    let decoder = GzDecoder::new(File::open(archive)?);
    let mut archive = tar::Archive::new(decoder);
    archive.set_preserve_permissions(true);
    archive.unpack(target)
}

fn tree_digest_blocking(dir: &Path, exclude: &dyn Fn(&Path) -> bool) -> io::Result<String> {
    let mut files = BTreeMap::new();

    for entry in walk(dir, exclude) {
        let entry = entry?;
        let key = portable_path(relative_to(dir, entry.path()));
        let file_type = entry.file_type();

        if file_type.is_file() {
            files.insert(key, hash_reader(File::open(entry.path())?)?);
        } else if file_type.is_symlink() {
            let target = std::fs::read_link(entry.path())?;
            files.insert(key, hash_reader(portable_path(&target).as_bytes())?);
        }
    }

    Ok(finish_digest(&files))
}

fn archive_digest_blocking(archive: &Path) -> io::Result<String> {
    let decoder = GzDecoder::new(File::open(archive)?);
    let mut archive = tar::Archive::new(decoder);
    let mut files = BTreeMap::new();

    for entry in archive.entries()? {
        let mut entry = entry?;
        let key = portable_path(&entry.path()?);
        let kind = entry.header().entry_type();

        if kind.is_file() {
            files.insert(key, hash_reader(&mut entry)?);
        } else if kind.is_symlink() {
            if let Some(target) = entry.link_name()? {
                let target = portable_path(&target);
                files.insert(key, hash_reader(target.as_bytes())?);
            }
        }
    }

    Ok(finish_digest(&files))
}

/// Depth-first walk below `dir`, sorted by name, pruning excluded entries
fn walk<'a>(
    dir: &'a Path,
    exclude: &'a dyn Fn(&Path) -> bool,
) -> impl Iterator<Item = walkdir::Result<walkdir::DirEntry>> + 'a {
    WalkDir::new(dir)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| !exclude(relative_to(dir, entry.path())))
}

fn relative_to<'a>(base: &Path, path: &'a Path) -> &'a Path {
    path.strip_prefix(base).unwrap_or(path)
}

/// `/`-separated form of the normal components of `path`
fn portable_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn hash_reader<R: Read>(mut reader: R) -> io::Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize().into())
}

fn finish_digest(files: &BTreeMap<String, [u8; 32]>) -> String {
    let mut hasher = Sha256::new();
    for (path, hash) in files {
        hasher.update(path.as_bytes());
        hasher.update([0u8]);
        hasher.update(hex::encode(hash).as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
