//! Streaming segmentation and hashing pipeline
//!
//! Stages are connected by rendezvous channels (`sync_channel(0)`), so each
//! hand-off blocks until the next stage has taken the item:
//!
//! ```text
//! ranges -> DoubleBufferedStreamer -+-> SegmentHasher -> segments
//!                                   +-> SegmentHasher -> segments
//! ```

pub mod hasher;
pub mod ranges;
pub mod sink;
pub mod streamer;
pub mod types;

pub use hasher::{run_segment_hasher, PartialSegment, SegmentHasher};
pub use ranges::RangeProducer;
pub use sink::{FileSinks, SinkFactory};
pub use streamer::{chunk_channels, DoubleBufferedStreamer, StreamStats};
pub use types::{ByteRange, Chunk, Segment};

use std::io::{self, Seek, SeekFrom};

/// Length of a seekable source; leaves the position at the start
pub fn stream_len<S: Seek>(source: &mut S) -> io::Result<u64> {
    let len = source.seek(SeekFrom::End(0))?;
    source.seek(SeekFrom::Start(0))?;
    Ok(len)
}
