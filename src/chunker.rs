//! Partitioning of inference requests into bounded, contiguous chunks.

/// Split `ids` into contiguous chunks of at most `limit` items.
///
/// A `None` or zero limit yields the whole input as one chunk. Chunks never
/// overlap, keep input order and only the last one may be shorter. An empty
/// input yields no chunks.
pub fn chunk_ids<T>(ids: &[T], limit: Option<usize>) -> Vec<&[T]> {
    if ids.is_empty() {
        return Vec::new();
    }
    match limit {
        Some(limit) if limit > 0 => ids.chunks(limit).collect(),
        _ => vec![ids],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_ids_by_four_gives_four_four_two() {
        let ids: Vec<u32> = (1..=10).collect();
        let chunks = chunk_ids(&ids, Some(4));
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(chunks[2], &[9, 10]);
    }

    #[test]
    fn chunks_form_an_order_preserving_partition() {
        for len in 1..40usize {
            let ids: Vec<usize> = (0..len).collect();
            for limit in 1..12usize {
                let chunks = chunk_ids(&ids, Some(limit));
                let flattened: Vec<usize> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
                assert_eq!(flattened, ids);
                assert!(chunks.iter().all(|c| c.len() <= limit && !c.is_empty()));
                let (last, rest) = chunks.split_last().unwrap();
                assert!(rest.iter().all(|c| c.len() == limit));
                assert!(last.len() <= limit);
            }
        }
    }

    #[test]
    fn missing_or_zero_limit_keeps_one_chunk() {
        let ids = ["a", "b", "c"];
        assert_eq!(chunk_ids(&ids, None), vec![&ids[..]]);
        assert_eq!(chunk_ids(&ids, Some(0)), vec![&ids[..]]);
    }

    #[test]
    fn empty_input_has_no_chunks() {
        let ids: [u8; 0] = [];
        assert!(chunk_ids(&ids, Some(3)).is_empty());
    }
}
