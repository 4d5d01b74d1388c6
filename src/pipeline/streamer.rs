// Double-buffered streamer
//
// Reads byte ranges sequentially from the image and hands every physical
// read to each consumer over a rendezvous channel. Two read buffers are used
// in strict alternation: while consumers hash the chunk in one buffer, the
// next read fills the other. A send only completes once the consumer has
// taken the chunk, and consumers drop a chunk before asking for the next, so
// by the time a buffer comes round again every consumer has released it.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{Result, SeghashError};

use super::types::{ByteRange, Chunk};

// =============================================================================
// Two-slot buffer arena
// =============================================================================

/// The two alternating read buffers, addressed by slot index 0/1
struct BufferPair {
    slots: [Arc<Vec<u8>>; 2],
    current: usize,
}

impl BufferPair {
    fn new(size: usize) -> Self {
        Self {
            slots: [Arc::new(vec![0u8; size]), Arc::new(vec![0u8; size])],
            current: 0,
        }
    }

    /// Exclusive access to the current slot for refilling.
    /// Fails if a consumer still holds a chunk of it.
    fn acquire(&mut self) -> Result<&mut [u8]> {
        let slot = self.current;
        Arc::get_mut(&mut self.slots[slot])
            .map(|buffer| buffer.as_mut_slice())
            .ok_or(SeghashError::BufferInUse { slot })
    }

    /// A shared handle to the current slot for delivery
    fn share(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.slots[self.current])
    }

    fn toggle(&mut self) {
        self.current ^= 1;
    }
}

// =============================================================================
// Streamer
// =============================================================================

/// Counters for one streaming run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub ranges: u64,
    pub chunks: u64,
    pub bytes: u64,
}

/// Rendezvous channels for `count` consumers
pub fn chunk_channels(count: usize) -> (Vec<SyncSender<Chunk>>, Vec<Receiver<Chunk>>) {
    (0..count).map(|_| mpsc::sync_channel(0)).unzip()
}

pub struct DoubleBufferedStreamer<'a, R> {
    source: &'a mut R,
    buffers: BufferPair,
    chunk_size: usize,
    position: u64,
}

impl<'a, R: Read + Seek> DoubleBufferedStreamer<'a, R> {
    pub fn new(source: &'a mut R, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(SeghashError::InvalidArgument(
                "chunk size must be positive".to_string(),
            ));
        }
        let position = source.stream_position()?;
        Ok(Self {
            source,
            buffers: BufferPair::new(chunk_size),
            chunk_size,
            position,
        })
    }

    /// Stream every range to every consumer, in order.
    ///
    /// `progress` is called once per physical read with the byte count just
    /// read. If a consumer hangs up the run stops early without error; the
    /// stage that hung up reports its own failure.
    pub fn run<I, P>(mut self, ranges: I, consumers: &[SyncSender<Chunk>], mut progress: P) -> Result<StreamStats>
    where
        I: IntoIterator<Item = ByteRange>,
        P: FnMut(u64),
    {
        let mut stats = StreamStats::default();

        for range in ranges {
            if range.start != self.position {
                trace!(from = self.position, to = range.start, "Seeking to range start");
                self.source.seek(SeekFrom::Start(range.start))?;
            }

            let mut left = range.length;
            while left > 0 {
                let wanted = left.min(self.chunk_size as u64) as usize;
                let buffer = self.buffers.acquire()?;
                let read = read_full(&mut *self.source, &mut buffer[..wanted])?;
                if read == 0 {
                    debug!(start = range.start, left, "End of data inside range");
                    break;
                }

                // A short read means the data ended inside this range
                left = if read < wanted { 0 } else { left - read as u64 };
                progress(read as u64);
                stats.chunks += 1;
                stats.bytes += read as u64;

                let shared = self.buffers.share();
                for consumer in consumers {
                    let chunk = Chunk::new(Arc::clone(&shared), read, left == 0, range.start);
                    if consumer.send(chunk).is_err() {
                        debug!("Consumer hung up, stopping streamer");
                        return Ok(stats);
                    }
                }
                drop(shared);
                self.buffers.toggle();
            }

            self.position = range.end();
            stats.ranges += 1;
        }

        debug!(?stats, "Streaming finished");
        Ok(stats)
    }
}

/// Fill `buf` from `source`, stopping early only at end of data
fn read_full<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
