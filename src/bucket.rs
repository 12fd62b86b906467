//! Bucket planning: split key positions into contiguous near-equal runs.

/// Minimum bucket count that keeps the radius-`range` filter sound.
///
/// With `B = (range + 3) / 2` buckets, any key within Hamming distance
/// `range` of a query is guaranteed to agree with it up to one mismatch
/// inside at least one bucket, which is what the one-deletion tables
/// can detect.
#[must_use]
pub fn proper_buckets(range: u32) -> u32 {
    (range + 3) / 2
}

/// Compute the `buckets + 1` cumulative begin offsets partitioning
/// `[0, length)` into contiguous buckets whose widths differ by at
/// most one. Earlier buckets absorb the remainder.
#[must_use]
pub fn split_points(length: u32, buckets: u32) -> Vec<u32> {
    debug_assert!(buckets >= 1 && buckets <= length);
    let mut begs = Vec::with_capacity(buckets as usize + 1);
    let mut beg = 0u32;
    for b in 0..buckets {
        begs.push(beg);
        beg += (length + b) / buckets;
    }
    begs.push(beg);
    begs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proper_buckets() {
        assert_eq!(proper_buckets(0), 1);
        assert_eq!(proper_buckets(1), 2);
        assert_eq!(proper_buckets(2), 2);
        assert_eq!(proper_buckets(3), 3);
        assert_eq!(proper_buckets(10), 6);
    }

    #[test]
    fn test_split_points_partition() {
        for length in 1..=64u32 {
            for buckets in 1..=length {
                let begs = split_points(length, buckets);
                assert_eq!(begs.len(), buckets as usize + 1);
                assert_eq!(begs[0], 0);
                assert_eq!(*begs.last().unwrap(), length);

                let widths: Vec<u32> = begs.windows(2).map(|w| w[1] - w[0]).collect();
                let min = *widths.iter().min().unwrap();
                let max = *widths.iter().max().unwrap();
                assert!(min >= 1);
                assert!(max - min <= 1);
            }
        }
    }

    #[test]
    fn test_split_points_exact() {
        assert_eq!(split_points(4, 2), vec![0, 2, 4]);
        assert_eq!(split_points(8, 3), vec![0, 2, 5, 8]);
        assert_eq!(split_points(64, 6), vec![0, 10, 20, 31, 42, 53, 64]);
    }
}
