//! Type definitions shared by the pipeline stages

use std::sync::Arc;

use crate::manifest::ManifestRowError;

// =============================================================================
// Byte Ranges
// =============================================================================

/// A contiguous span of the image that is hashed as one segment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub length: u64,
}

impl ByteRange {
    pub fn new(start: u64, length: u64) -> Self {
        Self { start, length }
    }

    /// Offset one past the last byte of the range
    pub fn end(&self) -> u64 {
        self.start + self.length
    }
}

// =============================================================================
// Chunks - one physical read, shared with every consumer
// =============================================================================

/// The bytes of one physical read, handed to each consumer in turn.
///
/// The chunk shares one of the streamer's two read buffers. A consumer must
/// absorb the data and drop the chunk before receiving the next one; the
/// streamer refuses to refill a buffer that is still shared.
#[derive(Clone, Debug)]
pub struct Chunk {
    buffer: Arc<Vec<u8>>,
    len: usize,
    /// This chunk completes its enclosing range
    pub is_last: bool,
    /// Start offset of the enclosing range
    pub range_start: u64,
}

impl Chunk {
    pub(crate) fn new(buffer: Arc<Vec<u8>>, len: usize, is_last: bool, range_start: u64) -> Self {
        debug_assert!(len <= buffer.len());
        Self {
            buffer,
            len,
            is_last,
            range_start,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// =============================================================================
// Segments
// =============================================================================

/// One range's worth of hashed data.
///
/// In calculation `hash` is the computed digest. On the expected side of a
/// verification it is the digest declared by a manifest row, and `err` is set
/// when that row was structurally invalid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub start: u64,
    pub length: u64,
    pub hash: Vec<u8>,
    pub err: Option<ManifestRowError>,
}

impl Segment {
    pub fn new(start: u64, length: u64, hash: Vec<u8>) -> Self {
        Self {
            start,
            length,
            hash,
            err: None,
        }
    }

    pub fn invalid(err: ManifestRowError) -> Self {
        Self {
            start: 0,
            length: 0,
            hash: Vec::new(),
            err: Some(err),
        }
    }

    pub fn range(&self) -> ByteRange {
        ByteRange::new(self.start, self.length)
    }
}
