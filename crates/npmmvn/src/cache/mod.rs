//! Run-scoped existence cache
//!
//! Remembers which artifact URLs are known to exist in the remote repository,
//! either because a HEAD probe returned 200 or because this run uploaded them.
//! Absence is never cached: it can change between the check and the upload.

use parking_lot::Mutex;
use std::collections::HashSet;
use url::Url;

/// Existence cache shared by every node of one deploy run
///
/// Sibling packages publish concurrently, so the state sits behind a mutex.
/// A fresh process always starts empty and re-checks the remote.
#[derive(Debug, Default)]
pub struct ExistenceCache {
    state: Mutex<CacheState>,
}

#[derive(Debug, Default)]
struct CacheState {
    /// URLs proven to exist
    known: HashSet<String>,
    /// URLs some task is currently uploading
    uploading: HashSet<String>,
    /// URLs uploaded through this cache
    uploaded: HashSet<String>,
}

/// Exclusive right to upload one URL
///
/// Dropping the claim without [`UploadClaim::finish`] releases it, so a
/// failed or cancelled upload can be retried by a later scan.
#[derive(Debug)]
#[must_use = "dropping the claim releases it"]
pub struct UploadClaim<'a> {
    cache: &'a ExistenceCache,
    url: String,
    finished: bool,
}

impl UploadClaim<'_> {
    /// The upload succeeded; the URL becomes known
    pub fn finish(mut self) {
        let mut state = self.cache.state.lock();
        state.uploading.remove(&self.url);
        state.uploaded.insert(self.url.clone());
        state.known.insert(self.url.clone());
        self.finished = true;
    }
}

impl Drop for UploadClaim<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.cache.state.lock().uploading.remove(&self.url);
        }
    }
}

impl ExistenceCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether `url` is known to exist
    pub fn is_known(&self, url: &Url) -> bool {
        self.state.lock().known.contains(url.as_str())
    }

    /// Record that `url` exists
    pub fn mark_known(&self, url: &Url) {
        self.state.lock().known.insert(url.as_str().to_string());
    }

    /// Whether `url` was uploaded, or is being uploaded, through this cache
    pub fn is_own_upload(&self, url: &Url) -> bool {
        let state = self.state.lock();
        state.uploaded.contains(url.as_str()) || state.uploading.contains(url.as_str())
    }

    /// Claim the upload of `url` for the calling task
    ///
    /// Returns `None` when the URL is already known or another task holds the
    /// claim; the caller must then skip the upload.
    pub fn begin_upload(&self, url: &Url) -> Option<UploadClaim<'_>> {
        let mut state = self.state.lock();
        if state.known.contains(url.as_str()) || !state.uploading.insert(url.as_str().to_string())
        {
            return None;
        }
        Some(UploadClaim {
            cache: self,
            url: url.as_str().to_string(),
            finished: false,
        })
    }

    /// Release a claim on `url` without marking it known
    pub fn abandon_upload(&self, url: &Url) {
        self.state.lock().uploading.remove(url.as_str());
    }

    /// Number of URLs known to exist
    pub fn len(&self) -> usize {
        self.state.lock().known.len()
    }

    /// Whether no URL is known yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
