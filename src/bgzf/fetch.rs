//! Fetch and inflate a single block.
//!
//! Indexed offsets and sizes are treated as hints. The real header start is
//! found near the indexed offset, the payload is cut at the next member's
//! signature, and if a standard gzip decode still fails the header and
//! footer are stripped by hand and the deflate stream is inflated raw.

use super::index::Block;
use super::scan::{FOOTER_LEN, MIN_HEADER_LEN, find_signature_from, find_signatures, header_len};
use crate::storage::{ByteRange, RemoteFile};
use crate::{Error, Result};
use flate2::read::{DeflateDecoder, GzDecoder};
use std::io::{self, Read};

/// Bytes read at the indexed offset to locate the real header.
pub const HEADER_PROBE_BYTES: u64 = 1024;

/// Fetches blocks of one data file.
#[derive(Debug, Clone)]
pub struct BlockFetcher {
    data: RemoteFile,
    file_length: u64,
    max_block_bytes: u64,
}

impl BlockFetcher {
    pub fn new(data: RemoteFile, file_length: u64, max_block_bytes: u64) -> Self {
        Self {
            data,
            file_length,
            max_block_bytes: max_block_bytes.max(HEADER_PROBE_BYTES),
        }
    }

    /// Fetch block `n` and return its decompressed bytes.
    pub async fn fetch(&self, n: usize, block: &Block) -> Result<Vec<u8>> {
        let unrecoverable = |reason: String| Error::BlockUnrecoverable { block: n, reason };

        let offset = block.compressed_offset;
        if offset >= self.file_length {
            return Err(unrecoverable(format!(
                "offset {} is past end of file ({} bytes)",
                offset, self.file_length
            )));
        }

        let probe_len = HEADER_PROBE_BYTES.min(self.file_length - offset);
        let probe = self
            .data
            .read_range(ByteRange::with_len(offset, probe_len))
            .await
            .map_err(|e| unrecoverable(format!("header probe failed: {}", e)))?;
        let start = match find_signatures(&probe, 1).first() {
            Some(&pos) => offset + pos as u64,
            None => {
                return Err(unrecoverable(format!(
                    "no gzip header within {} bytes of offset {}",
                    probe_len, offset
                )));
            }
        };

        let declared_end = offset + block.size.unwrap_or(self.file_length - offset) - 1;
        let end = declared_end
            .max(start + (MIN_HEADER_LEN + FOOTER_LEN) as u64)
            .min(start + self.max_block_bytes - 1)
            .min(self.file_length - 1);

        let bytes = self
            .data
            .read_range(ByteRange::new(start, end))
            .await
            .map_err(|e| unrecoverable(format!("block fetch failed: {}", e)))?;

        inflate_block(member_payload(&bytes)).map_err(|e| unrecoverable(e.to_string()))
    }
}

/// The leading member of `bytes`, cut at the next signature after the fixed header.
pub fn member_payload(bytes: &[u8]) -> &[u8] {
    match find_signature_from(bytes, MIN_HEADER_LEN) {
        Some(next) => &bytes[..next],
        None => bytes,
    }
}

/// Inflate one member, falling back to a raw inflate of the deflate stream.
pub fn inflate_block(payload: &[u8]) -> io::Result<Vec<u8>> {
    match inflate_member(payload) {
        Ok(out) => Ok(out),
        Err(e) => {
            tracing::debug!("standard gzip decode failed ({}), retrying raw inflate", e);
            inflate_raw(payload)
        }
    }
}

fn inflate_member(payload: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(payload);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Skip the header by hand, drop the footer, and inflate what is left.
fn inflate_raw(payload: &[u8]) -> io::Result<Vec<u8>> {
    let header = header_len(payload)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unreadable gzip header"))?;
    if payload.len() < header + FOOTER_LEN {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "member shorter than its header and footer",
        ));
    }

    let deflate = &payload[header..payload.len() - FOOTER_LEN];
    let mut decoder = DeflateDecoder::new(deflate);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use flate2::write::GzEncoder;
    use flate2::{Compression, GzBuilder};
    use std::io::Write;
    use std::sync::Arc;

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::none());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    fn remote(bytes: &[u8]) -> (tempfile::TempDir, RemoteFile) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("data.gz"), bytes).unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path().to_path_buf()));
        (dir, RemoteFile::new(storage, "data.gz"))
    }

    fn sized(offset: u64, size: u64) -> Block {
        Block {
            compressed_offset: offset,
            uncompressed_offset: 0,
            size: Some(size),
        }
    }

    #[test]
    fn test_payload_cut_at_next_member() {
        let first = gzip("a\t1\nb\t2\n");
        let mut bytes = first.clone();
        bytes.extend(gzip("c\t3\nd\t4\n"));
        assert_eq!(member_payload(&bytes), &first[..]);
        assert_eq!(inflate_block(member_payload(&bytes)).unwrap(), b"a\t1\nb\t2\n");
    }

    #[test]
    fn test_trailing_garbage_is_tolerated() {
        let mut bytes = gzip("a\t1\nb\t2\n");
        bytes.extend_from_slice(&[0u8; 37]);
        assert_eq!(inflate_block(member_payload(&bytes)).unwrap(), b"a\t1\nb\t2\n");
    }

    #[test]
    fn test_raw_fallback_skips_optional_header_fields() {
        let mut encoder = GzBuilder::new()
            .filename("table.tsv")
            .comment("rows")
            .extra(vec![b'B', b'C', 2, 0, 0, 0])
            .write(Vec::new(), Compression::default());
        encoder.write_all(b"x\ty\n").unwrap();
        let mut bytes = encoder.finish().unwrap();

        // Break the CRC so the standard decoder rejects the member
        let crc_at = bytes.len() - FOOTER_LEN;
        bytes[crc_at] ^= 0xff;
        assert!(inflate_member(&bytes).is_err());
        assert_eq!(inflate_block(&bytes).unwrap(), b"x\ty\n");
    }

    #[test]
    fn test_garbage_is_unrecoverable() {
        assert!(inflate_block(&[0u8; 40]).is_err());
        assert!(inflate_block(&[0x1f, 0x8b, 0x08, 0x00]).is_err());
    }

    #[tokio::test]
    async fn test_fetch_with_oversized_declared_size() {
        let first = gzip("a\t1\nb\t2\n");
        let mut bytes = first.clone();
        bytes.extend(gzip("c\t3\nd\t4\n"));
        let (_dir, data) = remote(&bytes);

        let fetcher = BlockFetcher::new(data, bytes.len() as u64, 1 << 20);
        let text = fetcher.fetch(0, &sized(0, bytes.len() as u64)).await.unwrap();
        assert_eq!(text, b"a\t1\nb\t2\n");
    }

    #[tokio::test]
    async fn test_fetch_relocates_header_after_indexed_offset() {
        let mut bytes = vec![0u8; 6];
        let member = gzip("c\t3\nd\t4\n");
        bytes.extend(&member);
        let (_dir, data) = remote(&bytes);

        // Indexed 6 bytes early, declared size covers padding and member
        let fetcher = BlockFetcher::new(data, bytes.len() as u64, 1 << 20);
        let text = fetcher.fetch(0, &sized(0, bytes.len() as u64)).await.unwrap();
        assert_eq!(text, b"c\t3\nd\t4\n");
    }

    #[tokio::test]
    async fn test_fetch_without_header_is_unrecoverable() {
        let bytes = vec![0u8; 2048];
        let (_dir, data) = remote(&bytes);
        let fetcher = BlockFetcher::new(data, 2048, 1 << 20);
        let err = fetcher.fetch(4, &sized(0, 2048)).await.unwrap_err();
        assert!(matches!(err, Error::BlockUnrecoverable { block: 4, .. }));
    }
}
