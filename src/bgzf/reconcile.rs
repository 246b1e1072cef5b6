//! Check a decoded index against the live data file.
//!
//! An index built for one copy of a file is often served next to a copy
//! that was re-wrapped, prefixed or re-compressed. Three outcomes are possible:
//!
//! 1. The offsets match the file: the index is accepted as-is.
//! 2. Every offset is off by the same amount: the shift is applied.
//! 3. Anything else: the index is thrown away and rebuilt by scanning a
//!    bounded prefix of the file for member signatures.

use super::index::{Block, Index};
use super::scan::{find_signatures, has_magic};
use crate::storage::{ByteRange, RemoteFile};
use crate::{Error, Result};

/// Probe sizes and scan bounds used while reconciling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanLimits {
    /// Bytes read from the start of the file to find the first member
    pub first_probe: u64,
    /// Bytes read at a corrected offset to confirm a signature
    pub verify_probe: u64,
    /// Window size of the rebuild scan
    pub window: u64,
    /// Maximum bytes scanned while rebuilding
    pub scan_budget: u64,
    /// Rebuild stops once this many members are found
    pub max_blocks: usize,
    /// Rebuild gives up if nothing turns up in this many bytes
    pub empty_scan_limit: u64,
    /// Assumed decompressed size of a rebuilt block
    pub estimated_block_size: u64,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            first_probe: 4 * 1024,
            verify_probe: 10,
            window: 1024 * 1024,
            scan_budget: 20 * 1024 * 1024,
            max_blocks: 100,
            empty_scan_limit: 5 * 1024 * 1024,
            estimated_block_size: 65536,
        }
    }
}

/// How the index was made to agree with the data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    Accepted,
    Corrected { shift: i64 },
    Rebuilt { blocks: usize },
}

/// Offset of the first gzip member in the live file, if the first probe has one.
pub async fn first_block_offset(
    data: &RemoteFile,
    file_length: u64,
    limits: &ScanLimits,
) -> Result<Option<u64>> {
    if file_length == 0 {
        return Err(Error::IndexIrreconcilable(format!(
            "data file {} is empty",
            data.key()
        )));
    }
    let probe = data
        .read_range(ByteRange::with_len(0, limits.first_probe.min(file_length)))
        .await?;
    Ok(find_signatures(&probe, 1).first().map(|&pos| pos as u64))
}

/// Make `blocks` agree with the data file.
///
/// `live_first` is the real offset of the first member, as found by
/// [`first_block_offset`]. A correction (including a zero one) is only
/// accepted if the first and last corrected offsets both start with a gzip
/// signature; otherwise the index is rebuilt.
pub async fn reconcile(
    data: &RemoteFile,
    blocks: Vec<Block>,
    live_first: Option<u64>,
    file_length: u64,
    limits: &ScanLimits,
) -> Result<(Index, Reconciliation)> {
    if let (Some(real), Some(first)) = (live_first, blocks.first()) {
        match offset_shift(real, first.compressed_offset) {
            Some(shift) => {
                if let Some(accepted) = try_shift(data, &blocks, shift, file_length, limits).await {
                    return Ok(accepted);
                }
            }
            None => tracing::warn!(
                indexed = first.compressed_offset,
                "indexed first offset is out of range, rebuilding"
            ),
        }
    }

    let offsets = scan_member_offsets(data, file_length, limits).await?;
    let blocks: Vec<Block> = offsets
        .iter()
        .enumerate()
        .map(|(i, &offset)| Block::new(offset, i as u64 * limits.estimated_block_size))
        .collect();
    let count = blocks.len();
    tracing::info!(blocks = count, "index rebuilt from {}", data.key());

    let index = Index::new(blocks, file_length)
        .map_err(|e| Error::IndexIrreconcilable(format!("rebuilt index invalid: {}", e)))?;
    Ok((index, Reconciliation::Rebuilt { blocks: count }))
}

/// `real - indexed` as a signed shift, if it fits in an `i64`.
fn offset_shift(real: u64, indexed: u64) -> Option<i64> {
    i64::try_from(real)
        .ok()?
        .checked_sub(i64::try_from(indexed).ok()?)
}

/// The shifted index if both verification probes find a signature.
async fn try_shift(
    data: &RemoteFile,
    blocks: &[Block],
    shift: i64,
    file_length: u64,
    limits: &ScanLimits,
) -> Option<(Index, Reconciliation)> {
    let verified = match shift_blocks(blocks, shift, file_length) {
        Some(shifted) => verify(data, &shifted, file_length, limits)
            .await
            .then_some(shifted),
        None => None,
    };

    match verified.map(|shifted| Index::new(shifted, file_length)) {
        Some(Ok(index)) if shift == 0 => Some((index, Reconciliation::Accepted)),
        Some(Ok(index)) => {
            tracing::info!(shift, "index offsets corrected");
            Some((index, Reconciliation::Corrected { shift }))
        }
        Some(Err(e)) => {
            tracing::warn!(shift, "corrected index is inconsistent: {}", e);
            None
        }
        None => {
            tracing::warn!(shift, "index offsets do not match {}, rebuilding", data.key());
            None
        }
    }
}

/// Apply `shift` to every compressed offset. `None` if any offset leaves the file.
fn shift_blocks(blocks: &[Block], shift: i64, file_length: u64) -> Option<Vec<Block>> {
    blocks
        .iter()
        .map(|block| {
            let offset = block.compressed_offset.checked_add_signed(shift)?;
            (offset < file_length).then_some(Block {
                compressed_offset: offset,
                ..*block
            })
        })
        .collect()
}

/// True if the first and last blocks both start with a gzip signature.
async fn verify(data: &RemoteFile, blocks: &[Block], file_length: u64, limits: &ScanLimits) -> bool {
    let mut probes = vec![blocks[0].compressed_offset];
    if let Some(last) = blocks.last().filter(|_| blocks.len() > 1) {
        probes.push(last.compressed_offset);
    }

    for offset in probes {
        let len = limits.verify_probe.min(file_length - offset);
        match data.read_range(ByteRange::with_len(offset, len)).await {
            Ok(bytes) if has_magic(&bytes) => continue,
            Ok(_) => return false,
            Err(e) => {
                tracing::warn!(offset, "verification probe failed: {}", e);
                return false;
            }
        }
    }
    true
}

/// Scan the start of the file window by window for member signatures.
async fn scan_member_offsets(
    data: &RemoteFile,
    file_length: u64,
    limits: &ScanLimits,
) -> Result<Vec<u64>> {
    let budget = limits.scan_budget.min(file_length);
    let window = limits.window.max(2);
    let mut offsets: Vec<u64> = Vec::new();
    let mut pos = 0;

    while pos < budget && offsets.len() < limits.max_blocks {
        let end = (pos + window).min(budget);
        let bytes = data.read_range(ByteRange::new(pos, end - 1)).await?;

        for rel in find_signatures(&bytes, limits.max_blocks) {
            let offset = pos + rel as u64;
            // Windows overlap by one byte
            if offsets.last().is_none_or(|&last| offset > last) {
                offsets.push(offset);
                if offsets.len() == limits.max_blocks {
                    break;
                }
            }
        }

        if offsets.is_empty() && end >= limits.empty_scan_limit {
            return Err(Error::IndexIrreconcilable(format!(
                "no gzip members in the first {} bytes of {}",
                end,
                data.key()
            )));
        }
        if end >= budget {
            break;
        }
        pos = end - 1;
    }

    if offsets.is_empty() {
        return Err(Error::IndexIrreconcilable(format!(
            "no gzip members found in {}",
            data.key()
        )));
    }
    Ok(offsets)
}
