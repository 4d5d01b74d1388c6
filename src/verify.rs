//! Segment hash verification
//!
//! ```text
//! ManifestReader -+-> ranges ---> DoubleBufferedStreamer -> SegmentHasher -+
//!                 |                                                        v
//!                 +-> expected segments ------------------------------> Verifier -> report
//! ```
//!
//! The manifest reader, streamer and hasher each run on their own thread;
//! the verifier runs on the calling thread.

use std::io::{BufReader, Read, Seek, SeekFrom};
use std::sync::mpsc;
use std::thread;

use serde::Serialize;
use tracing::{debug, error, info, instrument};

use crate::common::{bytes_to_sectors, HashAlgorithm, BUFFER_SIZE};
use crate::error::{Result, SeghashError};
use crate::manifest::{detect_algorithm, run_manifest_reader, ManifestReader, ManifestWriter};
use crate::pipeline::{
    run_segment_hasher, stream_len, DoubleBufferedStreamer, PartialSegment, Segment, SinkFactory,
};

/// Exit code ceiling for the diff count; 255 is reserved for failures
pub const MAX_DIFF_EXIT_CODE: u8 = 254;
pub const FAILURE_EXIT_CODE: u8 = 255;

// =============================================================================
// Options and outcome
// =============================================================================

#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Algorithm of the manifest; inferred from the first row when `None`
    pub algorithm: Option<HashAlgorithm>,
    /// Size of each of the two read buffers
    pub chunk_size: usize,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            algorithm: None,
            chunk_size: BUFFER_SIZE,
        }
    }
}

/// Result of a verification run
#[derive(Debug, Clone, Serialize)]
pub struct VerifyOutcome {
    pub algorithm: HashAlgorithm,
    /// Segments whose digest differs from the manifest
    pub diffs: u64,
    /// Structurally invalid manifest rows
    pub errors: u64,
    /// Segments hashed and compared
    pub segments: u64,
    /// Bytes read from the input
    pub bytes: u64,
    /// Name of the diff report, created only if a diff or error occurred
    pub report: Option<String>,
}

impl VerifyOutcome {
    pub fn is_clean(&self) -> bool {
        self.diffs == 0 && self.errors == 0
    }

    /// Process exit code: 255 if any manifest row was invalid, otherwise the
    /// diff count clamped to 254.
    pub fn exit_code(&self) -> u8 {
        if self.errors > 0 {
            FAILURE_EXIT_CODE
        } else {
            self.diffs.min(u64::from(MAX_DIFF_EXIT_CODE)) as u8
        }
    }

    pub fn summary(&self, input_name: &str, manifest_name: &str) -> String {
        let mut summary = format!(
            "Segment hashes verified. \nInput data file: {}. Input hashes file: {}. \nNumber of different segments: {}. ",
            input_name, manifest_name, self.diffs
        );
        if let Some(report) = &self.report {
            if self.diffs > 0 {
                summary.push_str(&format!("Different segments written to {report}."));
            }
            if self.errors > 0 {
                summary.push_str(&format!("\nErrors during verify: {}. Errors written to {report}.", self.errors));
            }
        }
        summary
    }
}

// =============================================================================
// Verifier - reconciles expected and computed segments
// =============================================================================

/// Counts produced by one reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub diffs: u64,
    pub errors: u64,
    pub segments: u64,
    pub report: Option<String>,
}

/// Walks the manifest's segments in row order, pairing each valid one with
/// the next computed segment. The report is created on the first diff or
/// error.
pub struct Verifier<F: SinkFactory> {
    sinks: F,
    report: Option<ManifestWriter<F::Sink>>,
    result: Reconciliation,
}

impl<F: SinkFactory> Verifier<F> {
    pub fn new(sinks: F) -> Self {
        Self {
            sinks,
            report: None,
            result: Reconciliation::default(),
        }
    }

    pub fn run<E, C>(mut self, expected: E, computed: C) -> Result<Reconciliation>
    where
        E: IntoIterator<Item = Segment>,
        C: IntoIterator<Item = Segment>,
    {
        let mut computed = computed.into_iter();
        for segment in expected {
            self.check(segment, &mut computed)?;
        }
        self.finish()
    }

    /// Classify one manifest segment
    pub fn check<C>(&mut self, expected: Segment, computed: &mut C) -> Result<()>
    where
        C: Iterator<Item = Segment>,
    {
        if let Some(err) = &expected.err {
            self.result.errors += 1;
            self.report()?.write_error(&err.to_string())?;
            return Ok(());
        }

        let actual = computed.next().ok_or(SeghashError::MissingSegment {
            expected: expected.start,
        })?;
        self.result.segments += 1;

        if actual.start != expected.start {
            error!(expected = expected.start, computed = actual.start, "Segment streams out of step");
            return Err(SeghashError::Desync {
                expected: expected.start,
                computed: actual.start,
            });
        }

        if actual.hash != expected.hash {
            let (start_lba, end_lba) = bytes_to_sectors(expected.start, expected.length)?;
            debug!(start_lba, end_lba, "Segment differs");
            self.result.diffs += 1;
            self.report()?.write_diff(start_lba, end_lba)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<Reconciliation> {
        if let Some(report) = self.report.take() {
            report.into_inner()?;
        }
        Ok(self.result)
    }

    fn report(&mut self) -> Result<&mut ManifestWriter<F::Sink>> {
        let report = match self.report.take() {
            Some(report) => report,
            None => {
                let (sink, name) = self.sinks.create("diffs")?;
                info!(report = %name, "Created diff report");
                self.result.report = Some(name);
                ManifestWriter::new(sink)
            }
        };
        Ok(self.report.insert(report))
    }
}

// =============================================================================
// Verification
// =============================================================================

/// Verify `input` against a segment hash manifest.
///
/// Invalid manifest rows are counted and reported without stopping the run.
/// `report_sinks` is asked for the `diffs` output only when the first diff or
/// error occurs. `progress` receives the byte count of every physical read.
#[instrument(skip_all)]
pub fn verify<R, M, F, P>(
    input: &mut R,
    manifest: M,
    options: &VerifyOptions,
    report_sinks: F,
    progress: P,
) -> Result<VerifyOutcome>
where
    R: Read + Seek + Send,
    M: Read + Seek + Send,
    F: SinkFactory,
    P: FnMut(u64) + Send,
{
    let data_size = stream_len(input)?;
    let mut manifest = BufReader::new(manifest);
    let algorithm = match options.algorithm {
        Some(algorithm) => algorithm,
        None => detect_algorithm(&mut manifest)?,
    };
    manifest.seek(SeekFrom::Start(0))?;
    info!(data_size, algorithm = algorithm.name(), "Verifying segment hashes");

    let reader = ManifestReader::new(manifest, data_size).with_algorithm(algorithm);
    let chunk_size = options.chunk_size;

    let (range_tx, range_rx) = mpsc::sync_channel(0);
    let (expected_tx, expected_rx) = mpsc::sync_channel(0);
    let (chunk_tx, chunk_rx) = mpsc::sync_channel(0);
    let (segment_tx, segment_rx) = mpsc::sync_channel(0);

    let (read, streamed, hashed, reconciled) = thread::scope(|s| {
        let reader = s.spawn(move || run_manifest_reader(reader, range_tx, expected_tx));
        let streamer = s.spawn(move || {
            let consumers = [chunk_tx];
            DoubleBufferedStreamer::new(input, chunk_size)?.run(range_rx, &consumers, progress)
        });
        // Every manifest range ends with its own closing chunk; a segment left
        // open means the streamer failed and must not be compared
        let hasher =
            s.spawn(move || run_segment_hasher(algorithm, chunk_rx, segment_tx, PartialSegment::Discard));

        let reconciled = Verifier::new(report_sinks).run(expected_rx, segment_rx);

        let read = reader
            .join()
            .map_err(|_| SeghashError::WorkerPanicked("manifest reader"))
            .and_then(|stats| stats);
        let streamed = streamer
            .join()
            .map_err(|_| SeghashError::WorkerPanicked("streamer"))
            .and_then(|stats| stats);
        let hashed = hasher
            .join()
            .map_err(|_| SeghashError::WorkerPanicked("segment hasher"));
        (read, streamed, hashed, reconciled)
    });

    // Upstream failures first: they are what starved the verifier
    let manifest_stats = read?;
    let stream_stats = streamed?;
    hashed?;
    let reconciled = reconciled?;

    info!(
        rows = manifest_stats.rows,
        diffs = reconciled.diffs,
        errors = reconciled.errors,
        "Segment hashes verified"
    );
    Ok(VerifyOutcome {
        algorithm,
        diffs: reconciled.diffs,
        errors: reconciled.errors,
        segments: reconciled.segments,
        bytes: stream_stats.bytes,
        report: reconciled.report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::{calculate, CalcOptions};
    use crate::common::sectors_to_bytes;
    use crate::pipeline::sink::memory::MemorySinks;
    use crate::pipeline::FileSinks;
    use std::io::Cursor;
    use tempfile::TempDir;

    const SEGMENT: u64 = 64 * 1024;

    fn image(len: usize) -> Vec<u8> {
        let mut state = 0x2545_f491u32;
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect()
    }

    fn manifest_for(data: &[u8], algorithm: HashAlgorithm) -> String {
        let sinks = MemorySinks::default();
        let options = CalcOptions::new(SEGMENT, vec![algorithm]);
        calculate(&mut Cursor::new(data.to_vec()), &options, sinks.clone(), |_| {}).unwrap();
        sinks.text(&format!("{}.csv", algorithm.tag())).unwrap()
    }

    fn options(chunk_size: usize) -> VerifyOptions {
        VerifyOptions {
            algorithm: None,
            chunk_size,
        }
    }

    fn run(data: &[u8], manifest: &str) -> (VerifyOutcome, MemorySinks) {
        let sinks = MemorySinks::default();
        let outcome = verify(
            &mut Cursor::new(data.to_vec()),
            Cursor::new(manifest.as_bytes().to_vec()),
            &options(10_000),
            sinks.clone(),
            |_| {},
        )
        .unwrap();
        (outcome, sinks)
    }

    #[test]
    fn test_verify_own_manifest_is_clean() {
        let data = image(1_000_000);
        for algorithm in HashAlgorithm::ALL {
            let manifest = manifest_for(&data, algorithm);
            let (outcome, sinks) = run(&data, &manifest);

            assert_eq!(outcome.algorithm, algorithm);
            assert!(outcome.is_clean());
            assert_eq!(outcome.segments, 16);
            assert_eq!(outcome.bytes, 1_000_000);
            assert_eq!(outcome.report, None);
            assert_eq!(outcome.exit_code(), 0);
            assert!(sinks.names().is_empty());
        }
    }

    #[test]
    fn test_single_flipped_byte_is_one_diff() {
        let data = image(1_000_000);
        let manifest = manifest_for(&data, HashAlgorithm::Md5);

        let mut tampered = data.clone();
        tampered[5 * SEGMENT as usize + 1234] ^= 0x01;
        let (outcome, sinks) = run(&tampered, &manifest);

        assert_eq!(outcome.diffs, 1);
        assert_eq!(outcome.errors, 0);
        assert_eq!(outcome.exit_code(), 1);
        assert_eq!(outcome.report.as_deref(), Some("diffs"));

        let rows = sinks.rows("diffs");
        let start_lba = 5 * SEGMENT / 512;
        let end_lba = start_lba + SEGMENT / 512 - 1;
        assert_eq!(rows, vec![vec![start_lba.to_string(), end_lba.to_string()]]);
    }

    #[test]
    fn test_malformed_row_is_reported_and_others_verified() {
        let data = image(300_000);
        let manifest = manifest_for(&data, HashAlgorithm::Sha1);
        let mut lines: Vec<String> = manifest.lines().map(str::to_string).collect();
        let broken = lines[2].replacen(|c: char| c.is_ascii_hexdigit(), "x", 1);
        lines[2] = broken.clone();
        let manifest = lines.join("\n");

        let (outcome, sinks) = run(&data, &manifest);

        assert_eq!(outcome.errors, 1);
        assert_eq!(outcome.diffs, 0);
        assert_eq!(outcome.segments, 4);
        assert_eq!(outcome.exit_code(), FAILURE_EXIT_CODE);

        let rows = sinks.rows("diffs");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 1);
        assert_eq!(rows[0][0], format!("Error in line 3: digest is not valid hex ({broken})"));
    }

    #[test]
    fn test_out_of_bounds_row_keeps_stream_in_step() {
        let data = image(4096);
        let digest = crate::common::compute_hash(&data[512..1024], HashAlgorithm::Md5);
        let wrong = "00".repeat(16);
        let manifest = format!("{digest},1,1\n{wrong},2,100\n{digest},1,1\n{wrong},3,3\n");

        let (outcome, sinks) = run(&data, &manifest);

        assert_eq!(outcome.errors, 1);
        assert_eq!(outcome.diffs, 1);
        assert_eq!(outcome.segments, 3);
        let rows = sinks.rows("diffs");
        assert_eq!(rows.len(), 2);
        assert!(rows[0][0].contains("exceeds input file range"));
        assert_eq!(rows[1], vec!["3", "3"]);
    }

    #[test]
    fn test_overlapping_rows_are_reread() {
        let data = image(8192);
        let (start, length) = sectors_to_bytes(2, 5);
        let digest = crate::common::compute_hash(
            &data[start as usize..(start + length) as usize],
            HashAlgorithm::Sha256,
        );
        let manifest = format!("{digest},2,5\n{digest},2,5\n");

        let (outcome, _) = run(&data, &manifest);
        assert!(outcome.is_clean());
        assert_eq!(outcome.segments, 2);
    }

    #[test]
    fn test_short_final_segment() {
        let data = image(1000);
        let manifest = manifest_for(&data, HashAlgorithm::Sha384);
        assert!(manifest.starts_with(&crate::common::compute_hash(&data, HashAlgorithm::Sha384)));
        assert!(manifest.trim_end().ends_with(",0,1"));

        let (outcome, _) = run(&data, &manifest);
        assert!(outcome.is_clean());
    }

    #[test]
    fn test_explicit_algorithm_skips_detection() {
        let data = image(300_000);
        let manifest = manifest_for(&data, HashAlgorithm::Sha512);
        let sinks = MemorySinks::default();
        let options = VerifyOptions {
            algorithm: Some(HashAlgorithm::Sha512),
            chunk_size: 10_000,
        };

        let outcome = verify(
            &mut Cursor::new(data),
            Cursor::new(manifest.into_bytes()),
            &options,
            sinks.clone(),
            |_| {},
        )
        .unwrap();
        assert_eq!(outcome.algorithm, HashAlgorithm::Sha512);
        assert!(outcome.is_clean());
        assert_eq!(outcome.segments, 5);
        assert!(sinks.names().is_empty());
    }

    #[test]
    fn test_explicit_algorithm_mismatch_rejects_every_row() {
        let data = image(300_000);
        let manifest = manifest_for(&data, HashAlgorithm::Md5);
        let sinks = MemorySinks::default();
        let options = VerifyOptions {
            algorithm: Some(HashAlgorithm::Sha1),
            chunk_size: 10_000,
        };

        let mut progress = 0;
        let outcome = verify(
            &mut Cursor::new(data),
            Cursor::new(manifest.into_bytes()),
            &options,
            sinks.clone(),
            |n| progress += n,
        )
        .unwrap();

        assert_eq!(outcome.algorithm, HashAlgorithm::Sha1);
        assert_eq!(outcome.errors, 5);
        assert_eq!(outcome.diffs, 0);
        assert_eq!(outcome.segments, 0);
        assert_eq!(outcome.bytes, 0);
        assert_eq!(progress, 0);
        assert_eq!(outcome.exit_code(), FAILURE_EXIT_CODE);

        let rows = sinks.rows("diffs");
        assert_eq!(rows.len(), 5);
        assert!(rows
            .iter()
            .all(|row| row.len() == 1 && row[0].contains("digest is 16 bytes, expected 20")));
    }

    /// Cursor that fails every read once `fail_at` is reached
    struct FailingReader {
        inner: Cursor<Vec<u8>>,
        fail_at: u64,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let left = self.fail_at.saturating_sub(self.inner.position());
            if left == 0 {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "device went away"));
            }
            let len = buf.len().min(left as usize);
            self.inner.read(&mut buf[..len])
        }
    }

    impl Seek for FailingReader {
        fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn test_read_failure_mid_segment_reports_no_diff() {
        let data = image(200_000);
        let manifest = manifest_for(&data, HashAlgorithm::Md5);
        let sinks = MemorySinks::default();
        let mut input = FailingReader {
            inner: Cursor::new(data),
            fail_at: 100_000,
        };

        let result = verify(
            &mut input,
            Cursor::new(manifest.into_bytes()),
            &options(10_000),
            sinks.clone(),
            |_| {},
        );

        assert!(matches!(result, Err(SeghashError::Io(_))));
        assert!(sinks.names().is_empty());
    }

    #[test]
    fn test_unusable_first_row_is_fatal() {
        let data = image(4096);
        let sinks = MemorySinks::default();
        let result = verify(
            &mut Cursor::new(data),
            Cursor::new(b"not a manifest".to_vec()),
            &VerifyOptions::default(),
            sinks,
            |_| {},
        );
        assert!(matches!(result, Err(SeghashError::InvalidManifest(_))));
    }

    #[test]
    fn test_desync_is_internal_fault() {
        let sinks = MemorySinks::default();
        let mut verifier = Verifier::new(sinks.clone());
        let expected = Segment::new(512, 512, vec![1; 16]);
        let mut computed = vec![Segment::new(0, 512, vec![1; 16])].into_iter();

        let err = verifier.check(expected, &mut computed).unwrap_err();
        assert!(matches!(err, SeghashError::Desync { expected: 512, computed: 0 }));
        assert!(err.is_internal());
    }

    #[test]
    fn test_missing_computed_segment_is_internal_fault() {
        let verifier = Verifier::new(MemorySinks::default());
        let expected = vec![Segment::new(0, 512, vec![1; 16])];
        let err = verifier.run(expected, Vec::new()).unwrap_err();
        assert!(matches!(err, SeghashError::MissingSegment { expected: 0 }));
    }

    #[test]
    fn test_report_written_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let report_path = temp_dir.path().join("Diffs-image.csv");
        let data = image(200_000);
        let manifest = manifest_for(&data, HashAlgorithm::Sha224);

        let mut tampered = data.clone();
        tampered[0] ^= 0xFF;
        tampered[199_999] ^= 0xFF;

        let outcome = verify(
            &mut Cursor::new(tampered),
            Cursor::new(manifest.into_bytes()),
            &VerifyOptions::default(),
            FileSinks::Fixed(report_path.clone()),
            |_| {},
        )
        .unwrap();

        assert_eq!(outcome.diffs, 2);
        assert_eq!(outcome.report.as_deref(), Some(report_path.to_string_lossy().as_ref()));
        let text = std::fs::read_to_string(&report_path).unwrap();
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows, vec!["0,127", "384,390"]);

        let summary = outcome.summary("image.dd", "hashes.csv");
        assert!(summary.contains("Number of different segments: 2."));
        assert!(summary.contains("Different segments written to"));
    }

    #[test]
    fn test_exit_code_clamps_diff_count() {
        let outcome = VerifyOutcome {
            algorithm: HashAlgorithm::Md5,
            diffs: 1000,
            errors: 0,
            segments: 1000,
            bytes: 0,
            report: Some("diffs".into()),
        };
        assert_eq!(outcome.exit_code(), MAX_DIFF_EXIT_CODE);
    }
}
