use crate::types::FileStats;
use crate::{Error, Result};

/// Width of one index record: two little-endian u64 offsets.
pub const RECORD_LEN: usize = 16;

/// One gzip member in the compressed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub compressed_offset: u64,
    /// Decompressed bytes before this member
    pub uncompressed_offset: u64,
    /// Compressed length, set once the index is anchored to a file length
    pub size: Option<u64>,
}

impl Block {
    pub fn new(compressed_offset: u64, uncompressed_offset: u64) -> Self {
        Self {
            compressed_offset,
            uncompressed_offset,
            size: None,
        }
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

/// Decode raw index bytes into blocks.
///
/// The flat layout is a run of `(compressed, uncompressed)` pairs, read until
/// fewer than [`RECORD_LEN`] bytes remain. htslib `.gzi` files are also
/// accepted: they carry a leading entry count and leave out the implicit
/// first block at `(0, 0)`, which is put back here.
///
/// Malformed or empty input decodes to an empty list.
pub fn decode(bytes: &[u8]) -> Vec<Block> {
    if bytes.len() % RECORD_LEN == 8 {
        let count = read_u64(bytes);
        if count == ((bytes.len() - 8) / RECORD_LEN) as u64 {
            let mut blocks = vec![Block::new(0, 0)];
            blocks.extend(decode_pairs(&bytes[8..]).filter(|b| b.compressed_offset != 0));
            return blocks;
        }
    }
    decode_pairs(bytes).collect()
}

fn decode_pairs(bytes: &[u8]) -> impl Iterator<Item = Block> + '_ {
    bytes
        .chunks_exact(RECORD_LEN)
        .map(|record| Block::new(read_u64(&record[..8]), read_u64(&record[8..])))
}

/// Encode blocks in the flat pair layout.
pub fn encode(blocks: &[Block]) -> Vec<u8> {
    let mut out = Vec::with_capacity(blocks.len() * RECORD_LEN);
    for block in blocks {
        out.extend_from_slice(&block.compressed_offset.to_le_bytes());
        out.extend_from_slice(&block.uncompressed_offset.to_le_bytes());
    }
    out
}

/// Set every block's size from the next block's offset, and the last from `file_length`.
pub fn with_sizes(mut blocks: Vec<Block>, file_length: u64) -> Result<Vec<Block>> {
    let mut next_offset = file_length;
    for (i, block) in blocks.iter_mut().enumerate().rev() {
        if next_offset <= block.compressed_offset {
            return Err(Error::InvalidRange(format!(
                "block {} at offset {} does not end before {}",
                i, block.compressed_offset, next_offset
            )));
        }
        block.size = Some(next_offset - block.compressed_offset);
        next_offset = block.compressed_offset;
    }
    Ok(blocks)
}

/// A validated block index anchored to the data file it describes.
#[derive(Debug, Clone)]
pub struct Index {
    blocks: Vec<Block>,
    file_length: u64,
}

impl Index {
    /// Build an index, deriving block sizes. Fails on an empty list or on
    /// offsets that are not strictly increasing within the file.
    pub fn new(blocks: Vec<Block>, file_length: u64) -> Result<Self> {
        if blocks.is_empty() {
            return Err(Error::IndexUnavailable("index has no blocks".to_string()));
        }
        let blocks = with_sizes(blocks, file_length)?;
        Ok(Self {
            blocks,
            file_length,
        })
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn get(&self, i: usize) -> Option<&Block> {
        self.blocks.get(i)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Decompressed bytes before the last block.
    pub fn total_uncompressed(&self) -> u64 {
        self.blocks
            .last()
            .map(|b| b.uncompressed_offset)
            .unwrap_or(0)
    }

    pub fn stats(&self, avg_bytes_per_record: u64) -> FileStats {
        FileStats {
            total_size: self.file_length,
            total_blocks: self.blocks.len(),
            total_records: self
                .total_uncompressed()
                .checked_div(avg_bytes_per_record)
                .unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(entries: &[(u64, u64)]) -> Vec<u8> {
        let blocks: Vec<Block> = entries.iter().map(|&(c, u)| Block::new(c, u)).collect();
        encode(&blocks)
    }

    #[test]
    fn test_decode_flat_pairs() {
        let bytes = pairs(&[(0, 0), (120, 65280), (260, 130560)]);
        let blocks = decode(&bytes);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1].compressed_offset, 120);
        assert_eq!(blocks[2].uncompressed_offset, 130560);
        assert!(blocks.iter().all(|b| b.size.is_none()));
    }

    #[test]
    fn test_decode_ignores_trailing_partial_record() {
        let mut bytes = pairs(&[(0, 0), (50, 100)]);
        bytes.extend_from_slice(&[1, 2, 3, 4, 5]);
        assert_eq!(decode(&bytes).len(), 2);
    }

    #[test]
    fn test_decode_short_or_empty() {
        assert!(decode(&[]).is_empty());
        assert!(decode(&[0u8; 15]).is_empty());
    }

    #[test]
    fn test_decode_htslib_gzi() {
        // count = 2, then two entries; the implicit (0, 0) block is restored
        let mut bytes = 2u64.to_le_bytes().to_vec();
        bytes.extend(pairs(&[(300, 65280), (610, 130560)]));
        let blocks = decode(&bytes);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], Block::new(0, 0));
        assert_eq!(blocks[1].compressed_offset, 300);
        assert_eq!(blocks[2].compressed_offset, 610);
    }

    #[test]
    fn test_sizes_sum_to_file_span() {
        let blocks = decode(&pairs(&[(7, 0), (90, 400), (200, 800), (333, 1200)]));
        let index = Index::new(blocks, 1000).unwrap();
        let total: u64 = index.blocks().iter().filter_map(|b| b.size).sum();
        assert_eq!(total, 1000 - 7);
        assert_eq!(index.get(3).unwrap().size, Some(1000 - 333));
    }

    #[test]
    fn test_non_increasing_offsets_rejected() {
        let blocks = decode(&pairs(&[(0, 0), (90, 400), (90, 800)]));
        assert!(Index::new(blocks, 1000).is_err());

        let blocks = decode(&pairs(&[(0, 0), (1000, 400)]));
        assert!(Index::new(blocks, 1000).is_err());
    }

    #[test]
    fn test_stats() {
        let blocks = decode(&pairs(&[(0, 0), (100, 1000), (200, 2000)]));
        let stats = Index::new(blocks, 300).unwrap().stats(100);
        assert_eq!(stats.total_size, 300);
        assert_eq!(stats.total_blocks, 3);
        assert_eq!(stats.total_records, 20);
    }
}
