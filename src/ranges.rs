//! Byte range planning for parallel downloads.

use crate::error::{Result, StemcellError};
use crate::types::ByteRange;

/// Splits `[0, total_size - 1]` into contiguous ranges for `workers` parallel requests.
///
/// Produces `workers` ranges of `total_size / workers` bytes, with the remainder
/// absorbed by the last one. When the object has fewer bytes than there are
/// workers, one single-byte range per byte is produced instead, so no range is
/// ever empty.
///
/// # Arguments
///
/// * `total_size` - Content length of the object, in bytes
/// * `workers` - Number of concurrent requests to plan for
///
/// # Returns
///
/// Ranges sorted by `start`, tiling the object exactly, or an error when
/// either argument is zero.
pub fn plan_ranges(total_size: u64, workers: usize) -> Result<Vec<ByteRange>> {
    if total_size == 0 {
        return Err(StemcellError::InvalidSize(total_size));
    }
    if workers == 0 {
        return Err(StemcellError::InvalidWorkerCount(workers));
    }

    let count = (workers as u64).min(total_size);
    let chunk_size = total_size / count;

    let ranges = (0..count)
        .map(|i| {
            let start = i * chunk_size;
            let end = if i == count - 1 {
                total_size - 1
            } else {
                start + chunk_size - 1
            };
            ByteRange { start, end }
        })
        .collect();

    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_tiles(ranges: &[ByteRange], total_size: u64) {
        assert_eq!(ranges.first().map(|r| r.start), Some(0));
        assert_eq!(ranges.last().map(|r| r.end), Some(total_size - 1));
        for pair in ranges.windows(2) {
            assert_eq!(pair[1].start, pair[0].end + 1, "gap or overlap in {ranges:?}");
        }
        for range in ranges {
            assert!(range.start <= range.end, "empty range in {ranges:?}");
        }
        let covered: u64 = ranges.iter().map(ByteRange::size).sum();
        assert_eq!(covered, total_size);
    }

    #[test]
    fn test_even_split() {
        let ranges = plan_ranges(100, 10).unwrap();
        assert_eq!(ranges.len(), 10);
        assert_eq!(ranges[0], ByteRange { start: 0, end: 9 });
        assert_eq!(ranges[9], ByteRange { start: 90, end: 99 });
        assert_tiles(&ranges, 100);
    }

    #[test]
    fn test_remainder_goes_to_last_range() {
        let ranges = plan_ranges(105, 10).unwrap();
        assert_eq!(ranges.len(), 10);
        assert_eq!(ranges[8], ByteRange { start: 80, end: 89 });
        assert_eq!(ranges[9], ByteRange { start: 90, end: 104 });
        assert_tiles(&ranges, 105);
    }

    #[test]
    fn test_fewer_bytes_than_workers() {
        let ranges = plan_ranges(3, 10).unwrap();
        assert_eq!(
            ranges,
            vec![
                ByteRange { start: 0, end: 0 },
                ByteRange { start: 1, end: 1 },
                ByteRange { start: 2, end: 2 },
            ]
        );
    }

    #[test]
    fn test_single_worker_covers_everything() {
        let ranges = plan_ranges(4096, 1).unwrap();
        assert_eq!(ranges, vec![ByteRange { start: 0, end: 4095 }]);
    }

    #[test]
    fn test_tiling_over_many_shapes() {
        for total_size in 1..=257u64 {
            for workers in 1..=17usize {
                let ranges = plan_ranges(total_size, workers).unwrap();
                assert_eq!(ranges.len() as u64, (workers as u64).min(total_size));
                assert_tiles(&ranges, total_size);
            }
        }
    }

    #[test]
    fn test_large_object() {
        let total_size = 5 * 1024 * 1024 * 1024 + 7;
        let ranges = plan_ranges(total_size, 10).unwrap();
        assert_tiles(&ranges, total_size);
    }

    #[test]
    fn test_zero_size_is_rejected() {
        assert!(matches!(plan_ranges(0, 10), Err(StemcellError::InvalidSize(0))));
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        assert!(matches!(
            plan_ranges(10, 0),
            Err(StemcellError::InvalidWorkerCount(0))
        ));
    }
}
