// Range producer - splits an image length into segment-sized byte ranges

use super::types::ByteRange;

/// Lazy sequence of contiguous ranges covering `[0, total_size)`.
///
/// Every range is `segment_size` long except the last, which holds the
/// remainder. An empty image yields nothing.
#[derive(Debug, Clone)]
pub struct RangeProducer {
    segment_size: u64,
    total_size: u64,
    produced: u64,
}

impl RangeProducer {
    /// # Panics
    /// Panics if `segment_size` is zero.
    pub fn new(segment_size: u64, total_size: u64) -> Self {
        assert!(segment_size > 0, "segment size must be positive");
        Self {
            segment_size,
            total_size,
            produced: 0,
        }
    }
}

impl Iterator for RangeProducer {
    type Item = ByteRange;

    fn next(&mut self) -> Option<ByteRange> {
        if self.produced >= self.total_size {
            return None;
        }
        let length = self.segment_size.min(self.total_size - self.produced);
        let range = ByteRange::new(self.produced, length);
        self.produced += length;
        Some(range)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.total_size - self.produced.min(self.total_size)).div_ceil(self.segment_size);
        let left = usize::try_from(left).unwrap_or(usize::MAX);
        (left, Some(left))
    }
}
