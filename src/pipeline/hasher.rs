// Segment hasher - turns one consumer's chunk stream into finished segments

use std::sync::mpsc::{Receiver, SyncSender};

use tracing::{debug, trace};

use crate::common::{HashAlgorithm, StreamingHasher};

use super::types::{Chunk, Segment};

/// Accumulates chunks into the running digest and emits a segment at each
/// range boundary.
pub struct SegmentHasher {
    hasher: StreamingHasher,
    start: u64,
    length: u64,
}

impl SegmentHasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            hasher: StreamingHasher::new(algorithm),
            start: 0,
            length: 0,
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.hasher.algorithm()
    }

    /// Absorb one chunk; returns the finished segment when the chunk closes
    /// its range.
    pub fn absorb(&mut self, chunk: &Chunk) -> Option<Segment> {
        self.hasher.update(chunk.data());

        if self.length == 0 {
            self.start = chunk.range_start;
        }
        self.length += chunk.len() as u64;

        if chunk.is_last {
            Some(self.finalize())
        } else {
            None
        }
    }

    /// Flush a segment left open by a stream that ended without a closing chunk
    pub fn finish(mut self) -> Option<Segment> {
        (self.length > 0).then(|| self.finalize())
    }

    fn finalize(&mut self) -> Segment {
        let segment = Segment::new(self.start, self.length, self.hasher.finalize_reset());
        trace!(
            algorithm = %self.hasher.algorithm(),
            start = segment.start,
            length = segment.length,
            "Segment finalized"
        );
        self.start = 0;
        self.length = 0;
        segment
    }
}

/// What to do with a segment still open when the chunk stream closes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialSegment {
    /// Emit it; the data simply ended inside the last range
    Flush,
    /// Drop it; every range is closed by its own chunk, so an open segment
    /// means the streamer stopped early
    Discard,
}

/// Hash a chunk stream until the streamer closes it, sending segments
/// downstream in input order. Returns the number of segments emitted.
///
/// Stops quietly if the downstream receiver has hung up.
pub fn run_segment_hasher(
    algorithm: HashAlgorithm,
    chunks: Receiver<Chunk>,
    segments: SyncSender<Segment>,
    partial: PartialSegment,
) -> u64 {
    let mut hasher = SegmentHasher::new(algorithm);
    let mut emitted = 0;

    for chunk in chunks {
        if let Some(segment) = hasher.absorb(&chunk) {
            // Release the read buffer before blocking on downstream
            drop(chunk);
            if segments.send(segment).is_err() {
                return emitted;
            }
            emitted += 1;
        }
    }

    let algorithm = hasher.algorithm();
    match hasher.finish() {
        Some(segment) if partial == PartialSegment::Flush => {
            if segments.send(segment).is_ok() {
                emitted += 1;
            }
        }
        Some(segment) => {
            debug!(%algorithm, start = segment.start, length = segment.length, "Discarding unterminated segment");
        }
        None => {}
    }
    trace!(%algorithm, emitted, "Hasher finished");
    emitted
}
