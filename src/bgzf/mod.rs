//! Block-gzip random access over ranged reads.
//!
//! A data file is a sequence of independently decompressible gzip members
//! ("blocks"). A companion index lists where each member starts, both in the
//! compressed file and in the decompressed stream. The index may have drifted
//! from the file it describes, so nothing here trusts it blindly.
//!
//! # Components
//!
//! - [`index`] - decode the index and derive block sizes and [`FileStats`](crate::types::FileStats)
//! - [`scan`] - find gzip member signatures and parse member headers
//! - [`reconcile`] - check the index against the live file; correct or rebuild it
//! - [`locate`] - map a logical page onto a run of blocks
//! - [`fetch`] - fetch and inflate one block, tolerating offset drift

pub mod fetch;
pub mod index;
pub mod locate;
pub mod reconcile;
pub mod scan;

pub use fetch::BlockFetcher;
pub use index::{Block, Index};
pub use locate::blocks_for_page;
pub use reconcile::{Reconciliation, ScanLimits};
