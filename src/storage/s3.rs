//! S3 backend. Keys are object keys within one bucket.
//!
//! A custom endpoint switches to path-style addressing for MinIO, LocalStack
//! and other S3-compatible stores.

use super::{ByteRange, Storage};
use crate::{Error, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use bytes::Bytes;

pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    /// Client for `bucket`, using SDK credentials and region unless `region` is given.
    pub async fn new(bucket: String, region: Option<String>, endpoint: Option<String>) -> Result<Self> {
        let mut loader = aws_config::from_env();
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        tracing::debug!(bucket = %bucket, "S3 client ready");
        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket,
        })
    }

    async fn head(&self, key: &str) -> Result<HeadObjectOutput> {
        self.client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::NotFound(format!("s3://{}/{}: {}", self.bucket, key, e)))
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn content_length(&self, key: &str) -> Result<u64> {
        self.head(key)
            .await?
            .content_length()
            .and_then(|len| u64::try_from(len).ok())
            .ok_or_else(|| Error::Internal(format!("no content length for s3://{}/{}", self.bucket, key)))
    }

    async fn read_bytes(&self, key: &str, range: Option<ByteRange>) -> Result<Bytes> {
        let request = self.client.get_object().bucket(&self.bucket).key(key);
        let request = match range {
            Some(r) => request.range(r.header_value()),
            None => request,
        };

        let output = request
            .send()
            .await
            .map_err(|e| Error::NotFound(format!("s3://{}/{}: {}", self.bucket, key, e)))?;
        let body = output
            .body
            .collect()
            .await
            .map_err(|e| Error::Internal(format!("S3 body read failed: {}", e)))?;
        Ok(body.into_bytes())
    }
}
