//! Ranged byte access to the compressed data file and its block index.
//!
//! The pager never downloads a whole data file. Everything it needs is read
//! through [`Storage::read_bytes`] with an explicit [`ByteRange`], plus one
//! [`Storage::content_length`] call to anchor the last block.
//!
//! # Implementations
//!
//! - [`LocalStorage`] - Local filesystem storage
//! - [`HttpStorage`] - HTTP/HTTPS with `Range` requests (feature `http`)
//! - [`S3Storage`] - S3 and S3-compatible object stores (feature `s3`)
//!
//! # Example
//!
//! ```no_run
//! use bgzpage::storage::{LocalStorage, RemoteFile};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let storage = Arc::new(LocalStorage::new(PathBuf::from("./data")));
//! let data = RemoteFile::new(storage.clone(), "table.tsv.gz");
//! let index = RemoteFile::new(storage, "table.tsv.gz.gzi");
//! ```

mod local;

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "s3")]
mod s3;

pub use local::LocalStorage;

#[cfg(feature = "http")]
pub use http::HttpStorage;

#[cfg(feature = "s3")]
pub use s3::S3Storage;

use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Byte range within a file. `end` is inclusive, as in `Range: bytes=start-end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// Range covering `len` bytes from `start`. `len` must be non-zero.
    pub fn with_len(start: u64, len: u64) -> Self {
        Self::new(start, start + len.saturating_sub(1))
    }

    /// Value for an HTTP `Range` header.
    pub fn header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

/// Storage backend trait for ranged access to stored objects
#[async_trait]
pub trait Storage: Send + Sync {
    /// Total size of an object in bytes
    async fn content_length(&self, key: &str) -> Result<u64>;

    /// Read bytes, optionally limited to a range. Ranges past the end are truncated.
    async fn read_bytes(&self, key: &str, range: Option<ByteRange>) -> Result<Bytes>;
}

/// A single object in a storage backend
#[derive(Clone)]
pub struct RemoteFile {
    storage: Arc<dyn Storage>,
    key: String,
}

impl RemoteFile {
    pub fn new(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn len(&self) -> Result<u64> {
        self.storage.content_length(&self.key).await
    }

    pub async fn read_all(&self) -> Result<Bytes> {
        self.storage.read_bytes(&self.key, None).await
    }

    pub async fn read_range(&self, range: ByteRange) -> Result<Bytes> {
        tracing::debug!(key = %self.key, range = %range.header_value(), "range fetch");
        self.storage.read_bytes(&self.key, Some(range)).await
    }
}

impl std::fmt::Debug for RemoteFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFile").field("key", &self.key).finish()
    }
}

/// Backend settings used by [`open`]
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    pub http_timeout: Option<Duration>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
}

/// Open the backend that serves `location` and return a handle to it.
///
/// `location` may be an `http(s)://` URL, an `s3://bucket/key` URL, a
/// `file://` URL or a plain filesystem path.
pub async fn open(location: &str, options: &StorageOptions) -> Result<RemoteFile> {
    let url = match Url::parse(location) {
        Ok(url) if url.scheme().len() > 1 => url,
        // Plain paths, including Windows drive letters
        _ => return open_local(Path::new(location)),
    };

    match url.scheme() {
        "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| Error::InvalidInput(format!("invalid file URL: {}", location)))?;
            open_local(&path)
        }
        "http" | "https" => open_http(&url, options),
        "s3" => open_s3(&url, options).await,
        other => Err(Error::InvalidInput(format!(
            "unsupported location scheme: {}",
            other
        ))),
    }
}

fn open_local(path: &Path) -> Result<RemoteFile> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidInput(format!("not a file path: {}", path.display())))?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok(RemoteFile::new(Arc::new(LocalStorage::new(dir)), name))
}

#[cfg(feature = "http")]
fn open_http(url: &Url, options: &StorageOptions) -> Result<RemoteFile> {
    let base = url
        .join("./")
        .map_err(|e| Error::InvalidInput(format!("invalid URL {}: {}", url, e)))?;
    let storage = HttpStorage::new(base.to_string(), options.http_timeout)?;
    // Absolute key keeps any query string (e.g. signed URLs)
    Ok(RemoteFile::new(Arc::new(storage), url.as_str()))
}

#[cfg(not(feature = "http"))]
fn open_http(url: &Url, _options: &StorageOptions) -> Result<RemoteFile> {
    Err(Error::InvalidInput(format!(
        "HTTP storage not enabled, cannot open {}",
        url
    )))
}

#[cfg(feature = "s3")]
async fn open_s3(url: &Url, options: &StorageOptions) -> Result<RemoteFile> {
    let bucket = url
        .host_str()
        .ok_or_else(|| Error::InvalidInput(format!("missing bucket in {}", url)))?;
    let key = url.path().trim_start_matches('/');
    if key.is_empty() {
        return Err(Error::InvalidInput(format!("missing object key in {}", url)));
    }
    let storage = S3Storage::new(
        bucket.to_string(),
        options.s3_region.clone(),
        options.s3_endpoint.clone(),
    )
    .await?;
    Ok(RemoteFile::new(Arc::new(storage), key))
}

#[cfg(not(feature = "s3"))]
async fn open_s3(url: &Url, _options: &StorageOptions) -> Result<RemoteFile> {
    Err(Error::InvalidInput(format!(
        "S3 storage not enabled, cannot open {}",
        url
    )))
}
