//! Segment hash calculation
//!
//! ```text
//! RangeProducer -> DoubleBufferedStreamer -+-> SegmentHasher -> ManifestWriter
//!                                          +-> SegmentHasher -> ManifestWriter
//! ```
//!
//! The streamer runs on the calling thread; each requested algorithm gets a
//! hasher thread and a writer thread.

use std::io::{Read, Seek, Write};
use std::sync::mpsc::{self, Receiver};
use std::thread;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::common::{HashAlgorithm, BUFFER_SIZE, DEFAULT_SEGMENT_SIZE, MAX_HASHES, SECTOR_SIZE};
use crate::error::{Result, SeghashError};
use crate::manifest::ManifestWriter;
use crate::pipeline::{
    chunk_channels, run_segment_hasher, stream_len, DoubleBufferedStreamer, PartialSegment, RangeProducer,
    Segment, SinkFactory,
};

// =============================================================================
// Options and outcome
// =============================================================================

#[derive(Debug, Clone)]
pub struct CalcOptions {
    /// Segment size in bytes, a multiple of the sector size
    pub segment_size: u64,
    /// One or two distinct algorithms
    pub algorithms: Vec<HashAlgorithm>,
    /// Size of each of the two read buffers
    pub chunk_size: usize,
}

impl Default for CalcOptions {
    fn default() -> Self {
        Self {
            segment_size: DEFAULT_SEGMENT_SIZE,
            algorithms: vec![HashAlgorithm::Md5],
            chunk_size: BUFFER_SIZE,
        }
    }
}

impl CalcOptions {
    pub fn new(segment_size: u64, algorithms: Vec<HashAlgorithm>) -> Self {
        Self {
            segment_size,
            algorithms,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.segment_size == 0 || self.segment_size % SECTOR_SIZE != 0 {
            return Err(SeghashError::InvalidSegmentSize(format!(
                "{} is not a positive multiple of {SECTOR_SIZE}",
                self.segment_size
            )));
        }
        if self.algorithms.is_empty() {
            return Err(SeghashError::InvalidAlgorithms("no hash type given".to_string()));
        }
        if self.algorithms.len() > MAX_HASHES {
            return Err(SeghashError::InvalidAlgorithms(format!(
                "cannot calculate more than {MAX_HASHES} hashes at once"
            )));
        }
        for (i, algorithm) in self.algorithms.iter().enumerate() {
            if self.algorithms[..i].contains(algorithm) {
                return Err(SeghashError::InvalidAlgorithms(format!("{algorithm} requested twice")));
            }
        }
        Ok(())
    }
}

/// Result of a calculation run
#[derive(Debug, Clone, Serialize)]
pub struct CalcOutcome {
    /// Output names, in algorithm order
    pub outputs: Vec<String>,
    pub algorithms: Vec<HashAlgorithm>,
    /// Segments written per manifest
    pub segments: u64,
    /// Bytes read from the input
    pub bytes: u64,
}

impl CalcOutcome {
    pub fn summary(&self, input_name: &str) -> String {
        format!(
            "Segment hashes calculated. \nInput file: {}. Output file(s): {}",
            input_name,
            self.outputs.join(", ")
        )
    }
}

// =============================================================================
// Calculation
// =============================================================================

/// Hash `input` segment by segment with every requested algorithm, writing
/// one manifest per algorithm.
///
/// `sinks` is asked for one output per algorithm, role `<tag>.csv`.
/// `progress` receives the byte count of every physical read.
#[instrument(skip_all, fields(segment_size = options.segment_size))]
pub fn calculate<R, F, P>(input: &mut R, options: &CalcOptions, mut sinks: F, progress: P) -> Result<CalcOutcome>
where
    R: Read + Seek,
    F: SinkFactory,
    F::Sink: Send,
    P: FnMut(u64),
{
    options.validate()?;
    let total_size = stream_len(input)?;
    info!(total_size, algorithms = ?options.algorithms, "Calculating segment hashes");

    let mut writers = Vec::with_capacity(options.algorithms.len());
    let mut outputs = Vec::with_capacity(options.algorithms.len());
    for algorithm in &options.algorithms {
        let (sink, name) = sinks.create(&format!("{}.csv", algorithm.tag()))?;
        writers.push(ManifestWriter::new(sink));
        outputs.push(name);
    }

    let (chunk_tx, chunk_rx) = chunk_channels(options.algorithms.len());
    let ranges = RangeProducer::new(options.segment_size, total_size);

    let (streamed, written) = thread::scope(|s| {
        let workers: Vec<_> = options
            .algorithms
            .iter()
            .copied()
            .zip(chunk_rx)
            .zip(writers)
            .map(|((algorithm, chunks), writer)| {
                let (segment_tx, segment_rx) = mpsc::sync_channel(0);
                let hasher = s.spawn(move || run_segment_hasher(algorithm, chunks, segment_tx, PartialSegment::Flush));
                let writer = s.spawn(move || write_manifest(writer, segment_rx));
                (hasher, writer)
            })
            .collect();

        let streamed = DoubleBufferedStreamer::new(input, options.chunk_size)
            .and_then(|streamer| streamer.run(ranges, &chunk_tx, progress));
        drop(chunk_tx);

        let written: Vec<Result<u64>> = workers
            .into_iter()
            .map(|(hasher, writer)| {
                let hashed = hasher
                    .join()
                    .map_err(|_| SeghashError::WorkerPanicked("segment hasher"));
                let written = writer
                    .join()
                    .map_err(|_| SeghashError::WorkerPanicked("manifest writer"))
                    .and_then(|rows| rows);
                hashed.and(written)
            })
            .collect();
        (streamed, written)
    });

    let stats = streamed?;
    let mut segments = 0;
    for rows in written {
        segments = rows?;
    }

    info!(ranges = stats.ranges, segments, bytes = stats.bytes, outputs = ?outputs, "Segment hashes calculated");
    Ok(CalcOutcome {
        outputs,
        algorithms: options.algorithms.clone(),
        segments,
        bytes: stats.bytes,
    })
}

/// Write every segment from `segments` as a manifest row
fn write_manifest<W: Write>(mut writer: ManifestWriter<W>, segments: Receiver<Segment>) -> Result<u64> {
    for segment in segments {
        writer.write_segment(&segment)?;
    }
    let rows = writer.rows();
    writer.into_inner()?;
    debug!(rows, "Manifest complete");
    Ok(rows)
}
