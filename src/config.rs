use crate::pager::PagerOptions;
use crate::storage::StorageOptions;
use clap::Parser;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "bgzpage")]
#[command(about = "Serve pages of a block-gzip TSV file over HTTP")]
pub struct Config {
    /// Host address to bind to
    #[arg(long, env = "BGZPAGE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "BGZPAGE_PORT", default_value = "8080")]
    pub port: u16,

    /// Data file location (path, file://, http(s):// or s3:// URL)
    #[arg(long, env = "BGZPAGE_DATA")]
    pub data: String,

    /// Block index location (defaults to the data location plus ".gzi")
    #[arg(long, env = "BGZPAGE_INDEX")]
    pub index: Option<String>,

    /// Assumed average size of one decompressed record in bytes
    #[arg(long, env = "BGZPAGE_AVG_BYTES_PER_RECORD", default_value = "200")]
    pub avg_bytes_per_record: u64,

    /// Default number of records per page
    #[arg(long, env = "BGZPAGE_PAGE_SIZE", default_value = "50")]
    pub page_size: u64,

    /// Decompressed blocks kept in memory (0 disables the cache)
    #[arg(long, env = "BGZPAGE_CACHE_BLOCKS", default_value = "256")]
    pub cache_blocks: u64,

    /// Maximum bytes fetched for a single block
    #[arg(long, env = "BGZPAGE_MAX_BLOCK_BYTES", default_value = "4194304")]
    pub max_block_bytes: u64,

    /// Timeout for each HTTP range request, in seconds
    #[arg(long, env = "BGZPAGE_HTTP_TIMEOUT_SECS")]
    pub http_timeout_secs: Option<u64>,

    /// AWS region for s3:// locations
    #[arg(long, env = "BGZPAGE_S3_REGION")]
    pub s3_region: Option<String>,

    /// Custom S3 endpoint (MinIO, LocalStack, etc.)
    #[arg(long, env = "BGZPAGE_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// Read column names from the first line of the file
    #[arg(long, env = "BGZPAGE_HAS_HEADER", default_value = "true")]
    pub has_header: bool,

    /// Enable CORS for all origins
    #[arg(long, env = "BGZPAGE_CORS", default_value = "true")]
    pub cors: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn index_location(&self) -> String {
        self.index
            .clone()
            .unwrap_or_else(|| format!("{}.gzi", self.data))
    }

    pub fn pager_options(&self) -> PagerOptions {
        PagerOptions {
            avg_bytes_per_record: self.avg_bytes_per_record,
            max_block_bytes: self.max_block_bytes,
            cache_blocks: self.cache_blocks,
            ..PagerOptions::default()
        }
    }

    pub fn storage_options(&self) -> StorageOptions {
        StorageOptions {
            http_timeout: self.http_timeout_secs.map(Duration::from_secs),
            s3_region: self.s3_region.clone(),
            s3_endpoint: self.s3_endpoint.clone(),
        }
    }
}
