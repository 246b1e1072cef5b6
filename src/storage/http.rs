//! HTTP/HTTPS storage backend.
//!
//! Reads use `Range` requests, so only the bytes the pager asks for cross
//! the wire. Sizes come from a `HEAD` request's `Content-Length`.

use super::{ByteRange, Storage};
use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use url::Url;

/// HTTP/HTTPS storage backend.
pub struct HttpStorage {
    client: Client,
    base_url: Url,
}

impl HttpStorage {
    /// Create a new HttpStorage instance.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL that relative keys are resolved against
    /// * `timeout` - Optional per-request timeout
    pub fn new(base_url: String, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::Internal(format!("failed to create HTTP client: {}", e)))?;

        // Without a trailing slash, Url::join would drop the last path segment
        let base = if base_url.ends_with('/') {
            base_url
        } else {
            format!("{}/", base_url)
        };
        let base_url = Url::parse(&base)
            .map_err(|e| Error::InvalidInput(format!("invalid base URL {}: {}", base, e)))?;

        Ok(Self { client, base_url })
    }

    /// Resolve a key to a full URL. Absolute URLs are used as-is.
    fn file_url(&self, key: &str) -> Result<Url> {
        if let Ok(url) = Url::parse(key) {
            return Ok(url);
        }
        self.base_url
            .join(key)
            .map_err(|e| Error::InvalidInput(format!("invalid key {}: {}", key, e)))
    }

    /// Get the content length of a URL via HEAD request.
    async fn get_content_length(&self, url: Url) -> Result<u64> {
        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(|e| Error::Internal(format!("HTTP HEAD request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::NotFound(url.to_string()));
        }

        response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| Error::Internal("missing Content-Length header".to_string()))
    }

    /// Download a byte range from a URL.
    async fn download_range(&self, url: Url, range: Option<&ByteRange>) -> Result<Bytes> {
        let mut request = self.client.get(url.clone());

        if let Some(r) = range {
            request = request.header(reqwest::header::RANGE, r.header_value());
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Internal(format!("HTTP GET request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            let range = range.map(|r| r.header_value()).unwrap_or_default();
            return Err(Error::InvalidRange(format!("{} for {}", range, url)));
        }
        if !status.is_success() {
            return Err(Error::NotFound(url.to_string()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Internal(format!("failed to read HTTP response: {}", e)))?;

        // A plain 200 means the server ignored the Range header
        match range {
            Some(r) if status == StatusCode::OK => Ok(slice_range(body, r)),
            _ => Ok(body),
        }
    }
}

fn slice_range(body: Bytes, range: &ByteRange) -> Bytes {
    let len = body.len() as u64;
    let start = range.start.min(len);
    let end = range.end.map(|e| (e + 1).min(len)).unwrap_or(len).max(start);
    body.slice(start as usize..end as usize)
}

#[async_trait]
impl Storage for HttpStorage {
    async fn content_length(&self, key: &str) -> Result<u64> {
        let url = self.file_url(key)?;
        self.get_content_length(url).await
    }

    async fn read_bytes(&self, key: &str, range: Option<ByteRange>) -> Result<Bytes> {
        let url = self.file_url(key)?;
        self.download_range(url, range.as_ref()).await
    }
}
