use super::index::Index;

/// Blocks likely to hold the records of `page` (1-based).
///
/// There is no record index, so this works from the average record size:
/// the decompressed bytes before the last block, spread evenly over the
/// blocks, give a records-per-block figure that page bounds are divided by.
/// The answer is approximate and always names at least one block.
pub fn blocks_for_page(
    index: &Index,
    page: u64,
    page_size: u64,
    avg_bytes_per_record: u64,
) -> Vec<usize> {
    let block_count = index.len() as u64;
    let total_uncompressed = index.total_uncompressed();

    let records_per_block = avg_bytes_per_record
        .checked_mul(block_count)
        .and_then(|bytes_per_block| total_uncompressed.checked_div(bytes_per_block))
        .unwrap_or(0);
    if records_per_block == 0 {
        return vec![0];
    }

    let total_records = total_uncompressed / avg_bytes_per_record;
    let start_record = page.saturating_sub(1).saturating_mul(page_size);
    let end_record = start_record
        .saturating_add(page_size.saturating_sub(1))
        .min(total_records);

    let last_block = block_count - 1;
    let start_block = (start_record / records_per_block).min(last_block);
    let end_block = end_record.div_ceil(records_per_block).min(last_block);

    if start_block > end_block {
        return vec![0];
    }
    (start_block as usize..=end_block as usize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bgzf::index::Block;

    /// `count` blocks of 1000 compressed / 65280 decompressed bytes each.
    fn uniform_index(count: u64) -> Index {
        let blocks = (0..count)
            .map(|i| Block::new(i * 1000, i * 65280))
            .collect();
        Index::new(blocks, count * 1000).unwrap()
    }

    #[test]
    fn test_first_page() {
        // 9 * 65280 / (100 * 10) = 587 records per block
        let index = uniform_index(10);
        assert_eq!(blocks_for_page(&index, 1, 50, 100), vec![0, 1]);
    }

    #[test]
    fn test_middle_page() {
        let index = uniform_index(10);
        // records 2000..=2049 -> blocks 3..=4
        assert_eq!(blocks_for_page(&index, 41, 50, 100), vec![3, 4]);
    }

    #[test]
    fn test_large_page_spans_blocks() {
        let index = uniform_index(10);
        // records 0..=1999 -> blocks 0..=4
        assert_eq!(blocks_for_page(&index, 1, 2000, 100), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_page_past_end_is_clamped() {
        let index = uniform_index(10);
        assert_eq!(blocks_for_page(&index, 10_000, 50, 100), vec![9]);
    }

    #[test]
    fn test_degenerate_inputs_default_to_first_block() {
        let single = uniform_index(1);
        assert_eq!(blocks_for_page(&single, 5, 50, 100), vec![0]);

        let index = uniform_index(10);
        assert_eq!(blocks_for_page(&index, 1, 50, 0), vec![0]);
        // Records larger than a block
        assert_eq!(blocks_for_page(&index, 3, 50, 1_000_000), vec![0]);
    }

    #[test]
    fn test_always_in_bounds() {
        let index = uniform_index(7);
        for page in 1..200 {
            for page_size in [1, 10, 333] {
                let blocks = blocks_for_page(&index, page, page_size, 97);
                assert!(!blocks.is_empty());
                assert!(blocks.iter().all(|&b| b < index.len()));
            }
        }
    }
}
