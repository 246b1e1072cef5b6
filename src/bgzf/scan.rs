//! Gzip member signatures and headers.

/// ID1 and ID2 of every gzip member header.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Fixed part of a member header, before any optional fields.
pub const MIN_HEADER_LEN: usize = 10;

/// CRC32 plus ISIZE.
pub const FOOTER_LEN: usize = 8;

const FHCRC: u8 = 0x02;
const FEXTRA: u8 = 0x04;
const FNAME: u8 = 0x08;
const FCOMMENT: u8 = 0x10;

/// Positions of up to `limit` gzip signatures in `bytes`, in order.
pub fn find_signatures(bytes: &[u8], limit: usize) -> Vec<usize> {
    bytes
        .windows(GZIP_MAGIC.len())
        .enumerate()
        .filter(|(_, w)| **w == GZIP_MAGIC)
        .map(|(pos, _)| pos)
        .take(limit)
        .collect()
}

/// First signature at or after `from`.
pub fn find_signature_from(bytes: &[u8], from: usize) -> Option<usize> {
    let tail = bytes.get(from..)?;
    find_signatures(tail, 1).first().map(|pos| from + pos)
}

pub fn has_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

/// Length of the member header at the start of `bytes`, including the
/// optional extra, name, comment and header-CRC fields.
///
/// Returns `None` if `bytes` does not start with a signature or the header
/// runs past the end of the buffer.
pub fn header_len(bytes: &[u8]) -> Option<usize> {
    if bytes.len() < MIN_HEADER_LEN || !has_magic(bytes) {
        return None;
    }

    let flags = bytes[3];
    let mut offset = MIN_HEADER_LEN;

    if flags & FEXTRA != 0 {
        let xlen = bytes.get(offset..offset + 2)?;
        offset += 2 + u16::from_le_bytes([xlen[0], xlen[1]]) as usize;
    }

    if flags & FNAME != 0 {
        offset += skip_zero_terminated(bytes.get(offset..)?)?;
    }

    if flags & FCOMMENT != 0 {
        offset += skip_zero_terminated(bytes.get(offset..)?)?;
    }

    if flags & FHCRC != 0 {
        offset += 2;
    }

    (offset <= bytes.len()).then_some(offset)
}

fn skip_zero_terminated(bytes: &[u8]) -> Option<usize> {
    bytes.iter().position(|&b| b == 0).map(|nul| nul + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_signatures_in_order() {
        let bytes = [0x00, 0x1f, 0x8b, 0x08, 0x1f, 0x1f, 0x8b, 0x8b, 0x1f];
        assert_eq!(find_signatures(&bytes, 10), vec![1, 5]);
        assert_eq!(find_signatures(&bytes, 1), vec![1]);
        assert!(find_signatures(&bytes, 0).is_empty());
    }

    #[test]
    fn test_find_signatures_short_input() {
        assert!(find_signatures(&[], 5).is_empty());
        assert!(find_signatures(&[0x1f], 5).is_empty());
    }

    #[test]
    fn test_find_signature_from() {
        let bytes = [0x1f, 0x8b, 0, 0, 0, 0x1f, 0x8b];
        assert_eq!(find_signature_from(&bytes, 0), Some(0));
        assert_eq!(find_signature_from(&bytes, 1), Some(5));
        assert_eq!(find_signature_from(&bytes, 6), None);
        assert_eq!(find_signature_from(&bytes, 20), None);
    }

    #[test]
    fn test_header_len_minimal() {
        let header = [0x1f, 0x8b, 0x08, 0x00, 0, 0, 0, 0, 0x00, 0xff];
        assert_eq!(header_len(&header), Some(10));
    }

    #[test]
    fn test_header_len_bgzf_extra() {
        // BGZF: FEXTRA with a 6-byte BC subfield
        let header = [
            0x1f, 0x8b, 0x08, 0x04, 0, 0, 0, 0, 0x00, 0xff, 6, 0, b'B', b'C', 2, 0, 0x1b, 0x00,
        ];
        assert_eq!(header_len(&header), Some(18));
    }

    #[test]
    fn test_header_len_all_optional_fields() {
        let mut header = vec![0x1f, 0x8b, 0x08, FEXTRA | FNAME | FCOMMENT | FHCRC];
        header.extend_from_slice(&[0, 0, 0, 0, 0, 3]);
        header.extend_from_slice(&[2, 0, 0xaa, 0xbb]);
        header.extend_from_slice(b"table.tsv\0");
        header.extend_from_slice(b"note\0");
        header.extend_from_slice(&[0x12, 0x34]);
        assert_eq!(header_len(&header), Some(10 + 4 + 10 + 5 + 2));
    }

    #[test]
    fn test_header_len_rejects_truncated() {
        let mut header = vec![0x1f, 0x8b, 0x08, FNAME, 0, 0, 0, 0, 0, 3];
        header.extend_from_slice(b"no-terminator");
        assert_eq!(header_len(&header), None);
        assert_eq!(header_len(&[0x00, 0x8b, 0, 0, 0, 0, 0, 0, 0, 0]), None);
    }
}
