//! HTTP artifact store
//!
//! Some repository managers (and proxies in front of them) mishandle
//! pipelined or reused connections, so every request carries
//! `Connection: close` and the client keeps no idle connections.

use super::{expect_status, head_outcome, ArtifactStore, RemoteError};
use crate::archive::TEMP_PREFIX;
use crate::config::HttpSettings;
use futures::stream::{self, Stream};
use reqwest::header::{CONNECTION, CONTENT_LENGTH};
use reqwest::{Body, Client, Method, StatusCode};
use std::path::Path;
use tempfile::TempPath;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};
use url::Url;

/// Artifact store backed by a Maven repository reachable over HTTP
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
}

impl HttpStore {
    /// Create a store with the given connection settings
    pub fn new(settings: &HttpSettings) -> Result<Self, RemoteError> {
        let mut builder = Client::builder()
            .pool_max_idle_per_host(0)
            .connect_timeout(settings.connect_timeout())
            .user_agent(format!("npmmvn/{}", env!("CARGO_PKG_VERSION")));

        if let Some(timeout) = settings.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

impl ArtifactStore for HttpStore {
    async fn exists(&self, url: &Url) -> Result<bool, RemoteError> {
        let response = self
            .client
            .head(url.clone())
            .header(CONNECTION, "close")
            .send()
            .await?;

        debug!(%url, status = response.status().as_u16(), "HEAD");
        head_outcome(response.status(), url)
    }

    async fn put(&self, file: &Path, url: &Url) -> Result<(), RemoteError> {
        let io_error = |source| RemoteError::Io {
            path: file.to_path_buf(),
            source,
        };
        let reader = tokio::fs::File::open(file).await.map_err(io_error)?;
        let len = reader.metadata().await.map_err(io_error)?.len();

        info!(%url, bytes = len, "Upload");
        let response = self
            .client
            .put(url.clone())
            .header(CONNECTION, "close")
            .header(CONTENT_LENGTH, len)
            .body(Body::wrap_stream(file_chunks(reader)))
            .send()
            .await?;

        expect_status(Method::PUT, StatusCode::CREATED, response.status(), url)
    }

    async fn get(&self, url: &Url) -> Result<TempPath, RemoteError> {
        info!(%url, "Download");
        let mut response = self
            .client
            .get(url.clone())
            .header(CONNECTION, "close")
            .send()
            .await?;

        expect_status(Method::GET, StatusCode::OK, response.status(), url)?;

        let temp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(".tar.gz")
            .tempfile()
            .map_err(|source| RemoteError::Io {
                path: std::env::temp_dir(),
                source,
            })?;
        let (file, path) = temp.into_parts();
        let io_error = |source| RemoteError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut file = tokio::fs::File::from_std(file);
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await.map_err(io_error)?;
        }
        file.flush().await.map_err(io_error)?;

        Ok(path)
    }
}

/// Size of each chunk read while streaming an upload
const UPLOAD_CHUNK: usize = 64 * 1024;

/// Read `file` as a stream of chunks, ending at EOF
fn file_chunks(
    file: tokio::fs::File,
) -> impl Stream<Item = std::io::Result<Vec<u8>>> + Send + 'static {
    stream::try_unfold(file, |mut file| async move {
        let mut chunk = vec![0; UPLOAD_CHUNK];
        let read = file.read(&mut chunk).await?;
        if read == 0 {
            return Ok::<_, std::io::Error>(None);
        }
        chunk.truncate(read);
        Ok(Some((chunk, file)))
    })
}
