//! Page-level access to a block-gzip data file.
//!
//! [`Pager`] owns one reconciled index for one (data, index) pair. The index
//! is built on first use and only read afterwards. Each page request maps
//! to a run of blocks that are fetched concurrently; blocks that fail are
//! left out and reported, and the rest of the page is still returned.
//!
//! ```text
//! Uninitialized -> Initializing -> Ready
//!                               -> Failed
//! dispose(): any state -> Uninitialized
//! ```
//!
//! Dropping a `get_page` future cancels its in-flight range requests.

use crate::bgzf::{
    BlockFetcher, Index, Reconciliation, ScanLimits, blocks_for_page, index, reconcile,
};
use crate::storage::RemoteFile;
use crate::types::{FileStats, Page};
use crate::{Error, Result};
use bytes::Bytes;
use futures::future::join_all;
use moka::future::Cache;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock};

/// Callback for errors that are reported rather than returned.
pub type ErrorCallback = Arc<dyn Fn(&Error) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct PagerOptions {
    /// Assumed average size of one decompressed record
    pub avg_bytes_per_record: u64,
    /// Upper bound on the bytes fetched for one block
    pub max_block_bytes: u64,
    /// Decompressed blocks kept in memory; 0 disables the cache
    pub cache_blocks: u64,
    pub scan_limits: ScanLimits,
}

impl Default for PagerOptions {
    fn default() -> Self {
        Self {
            avg_bytes_per_record: 200,
            max_block_bytes: 4 * 1024 * 1024,
            cache_blocks: 256,
            scan_limits: ScanLimits::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PagerState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

/// Concatenated decompressed text of the blocks selected for a page.
#[derive(Debug, Clone)]
pub struct PageText {
    pub text: String,
    pub page: u64,
    pub blocks: Vec<usize>,
    pub failed_blocks: Vec<usize>,
}

impl PageText {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

struct Loaded {
    /// Value of `Pager::generation` when this index was loaded
    generation: u64,
    index: Index,
    stats: FileStats,
    reconciliation: Reconciliation,
    fetcher: BlockFetcher,
}

enum Slot {
    Uninitialized,
    Initializing,
    Ready(Arc<Loaded>),
    Failed { irreconcilable: bool, message: String },
}

pub struct Pager {
    data: RemoteFile,
    index_file: RemoteFile,
    options: PagerOptions,
    slot: RwLock<Slot>,
    init_gate: Mutex<()>,
    /// Bumped by `dispose`; cache entries are keyed by it
    generation: AtomicU64,
    cache: Option<Cache<(u64, usize), Bytes>>,
    on_error: Option<ErrorCallback>,
}

impl Pager {
    pub fn new(data: RemoteFile, index_file: RemoteFile, options: PagerOptions) -> Self {
        let cache = (options.cache_blocks > 0)
            .then(|| Cache::builder().max_capacity(options.cache_blocks).build());
        Self {
            data,
            index_file,
            options,
            slot: RwLock::new(Slot::Uninitialized),
            init_gate: Mutex::new(()),
            generation: AtomicU64::new(0),
            cache,
            on_error: None,
        }
    }

    pub fn with_error_callback(mut self, callback: ErrorCallback) -> Self {
        self.on_error = Some(callback);
        self
    }

    pub async fn state(&self) -> PagerState {
        match &*self.slot.read().await {
            Slot::Uninitialized => PagerState::Uninitialized,
            Slot::Initializing => PagerState::Initializing,
            Slot::Ready(_) => PagerState::Ready,
            Slot::Failed { .. } => PagerState::Failed,
        }
    }

    /// Load and reconcile the index.
    ///
    /// Repeat calls after success return `true` without doing any work.
    /// After a failure this returns `false` until [`Pager::dispose`] is called.
    /// Whichever call first hits a failure passes it to the error callback,
    /// so `get_page` and `try_initialize` report it too.
    pub async fn initialize(&self) -> bool {
        self.ensure_loaded().await.is_ok()
    }

    /// Like [`Pager::initialize`], but also returns the error.
    pub async fn try_initialize(&self) -> Result<()> {
        self.ensure_loaded().await.map(|_| ())
    }

    pub async fn file_stats(&self) -> Option<FileStats> {
        match &*self.slot.read().await {
            Slot::Ready(loaded) => Some(loaded.stats),
            _ => None,
        }
    }

    pub async fn total_pages(&self, page_size: u64) -> Option<u64> {
        self.file_stats()
            .await
            .map(|stats| stats.total_pages(page_size))
    }

    pub async fn reconciliation(&self) -> Option<Reconciliation> {
        match &*self.slot.read().await {
            Slot::Ready(loaded) => Some(loaded.reconciliation),
            _ => None,
        }
    }

    /// Drop the index and any cached blocks.
    ///
    /// Pages still in flight finish against the old index, but their blocks
    /// are cached under the old generation and never served again.
    pub async fn dispose(&self) {
        let _gate = self.init_gate.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.slot.write().await = Slot::Uninitialized;
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }

    /// Parse one page of records with `parse`.
    ///
    /// Initializes on first use. If the page yields no text and `page > 1`,
    /// page 1 is served instead. Rows past `page_size` are dropped.
    pub async fn get_page<T, F>(&self, page: u64, page_size: u64, parse: F) -> Result<Page<T>>
    where
        F: Fn(&str) -> Vec<T>,
    {
        validate(page, page_size)?;
        let loaded = self.ensure_loaded().await?;

        let mut text = self.assemble(&loaded, page, page_size).await;
        let fell_back = text.is_empty() && page > 1;
        if fell_back {
            tracing::warn!(page, "page yielded no data, falling back to page 1");
            text = self.assemble(&loaded, 1, page_size).await;
        }
        if text.is_empty() {
            let err = Error::EmptyPage { page };
            self.report(&err);
            return Err(err);
        }

        let mut rows = parse(&text.text);
        rows.truncate(usize::try_from(page_size).unwrap_or(usize::MAX));

        Ok(Page {
            rows,
            requested_page: page,
            page: text.page,
            page_size,
            degraded: !text.failed_blocks.is_empty(),
            blocks: text.blocks,
            failed_blocks: text.failed_blocks,
            fell_back,
        })
    }

    /// Raw text of the blocks selected for `page`, without fallback.
    pub async fn fetch_page_text(&self, page: u64, page_size: u64) -> Result<PageText> {
        validate(page, page_size)?;
        let loaded = self.ensure_loaded().await?;
        Ok(self.assemble(&loaded, page, page_size).await)
    }

    async fn ensure_loaded(&self) -> Result<Arc<Loaded>> {
        if let Slot::Ready(loaded) = &*self.slot.read().await {
            return Ok(loaded.clone());
        }

        let _gate = self.init_gate.lock().await;
        match &*self.slot.read().await {
            Slot::Ready(loaded) => return Ok(loaded.clone()),
            Slot::Failed {
                irreconcilable,
                message,
            } => {
                return Err(if *irreconcilable {
                    Error::IndexIrreconcilable(message.clone())
                } else {
                    Error::IndexUnavailable(message.clone())
                });
            }
            _ => {}
        }

        *self.slot.write().await = Slot::Initializing;
        match self.load().await {
            Ok(loaded) => {
                let loaded = Arc::new(loaded);
                *self.slot.write().await = Slot::Ready(loaded.clone());
                Ok(loaded)
            }
            Err(e) => {
                let (irreconcilable, message) = match &e {
                    Error::IndexIrreconcilable(m) => (true, m.clone()),
                    Error::IndexUnavailable(m) => (false, m.clone()),
                    other => (false, other.to_string()),
                };
                *self.slot.write().await = Slot::Failed {
                    irreconcilable,
                    message,
                };
                self.report(&e);
                Err(e)
            }
        }
    }

    async fn load(&self) -> Result<Loaded> {
        let index_key = self.index_file.key();
        let raw = self.index_file.read_all().await.map_err(|e| {
            Error::IndexUnavailable(format!("cannot fetch index {}: {}", index_key, e))
        })?;
        let blocks = index::decode(&raw);
        if blocks.is_empty() {
            return Err(Error::IndexUnavailable(format!(
                "index {} has no entries",
                index_key
            )));
        }

        let file_length = self.data.len().await.map_err(|e| {
            Error::IndexUnavailable(format!("cannot size {}: {}", self.data.key(), e))
        })?;

        let (index, reconciliation) = self
            .reconcile_live(blocks, file_length)
            .await
            .map_err(|e| {
                if e.is_fatal() {
                    e
                } else {
                    Error::IndexIrreconcilable(e.to_string())
                }
            })?;

        let stats = index.stats(self.options.avg_bytes_per_record);
        tracing::info!(
            blocks = stats.total_blocks,
            total_size = stats.total_size,
            total_records = stats.total_records,
            ?reconciliation,
            "index ready for {}",
            self.data.key()
        );

        Ok(Loaded {
            generation: self.generation.load(Ordering::SeqCst),
            index,
            stats,
            reconciliation,
            fetcher: BlockFetcher::new(self.data.clone(), file_length, self.options.max_block_bytes),
        })
    }

    async fn reconcile_live(
        &self,
        blocks: Vec<index::Block>,
        file_length: u64,
    ) -> Result<(Index, Reconciliation)> {
        let limits = &self.options.scan_limits;
        let live_first = reconcile::first_block_offset(&self.data, file_length, limits).await?;
        reconcile::reconcile(&self.data, blocks, live_first, file_length, limits).await
    }

    async fn assemble(&self, loaded: &Loaded, page: u64, page_size: u64) -> PageText {
        let blocks = blocks_for_page(
            &loaded.index,
            page,
            page_size,
            self.options.avg_bytes_per_record,
        );
        tracing::debug!(page, page_size, ?blocks, "blocks located");

        let results = join_all(blocks.iter().map(|&n| self.block_bytes(loaded, n))).await;

        let mut bytes = Vec::new();
        let mut failed_blocks = Vec::new();
        for (&n, result) in blocks.iter().zip(results) {
            match result {
                Ok(block) => bytes.extend_from_slice(&block),
                Err(e) => {
                    tracing::warn!("{}", e);
                    self.report(&e);
                    failed_blocks.push(n);
                }
            }
        }

        PageText {
            text: String::from_utf8_lossy(&bytes).into_owned(),
            page,
            blocks,
            failed_blocks,
        }
    }

    async fn block_bytes(&self, loaded: &Loaded, n: usize) -> Result<Bytes> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(&(loaded.generation, n)).await {
                return Ok(hit);
            }
        }

        let block = loaded.index.get(n).ok_or_else(|| Error::BlockUnrecoverable {
            block: n,
            reason: "no such block".to_string(),
        })?;
        let bytes = Bytes::from(loaded.fetcher.fetch(n, block).await?);

        if let Some(cache) = &self.cache {
            cache.insert((loaded.generation, n), bytes.clone()).await;
        }
        Ok(bytes)
    }

    fn report(&self, err: &Error) {
        if err.is_fatal() {
            tracing::error!("{}", err);
        }
        if let Some(callback) = &self.on_error {
            callback(err);
        }
    }
}

fn validate(page: u64, page_size: u64) -> Result<()> {
    if page == 0 {
        return Err(Error::InvalidInput("page numbers start at 1".to_string()));
    }
    if page_size == 0 {
        return Err(Error::InvalidInput("page size must be positive".to_string()));
    }
    Ok(())
}
