// Manifest reader (verification input)
//
// Turns manifest rows into expected segments. A row that fails validation
// becomes an error-bearing segment instead of stopping the stream; only rows
// that validate produce a byte range for the streamer to read.

use std::io::{self, BufRead};
use std::sync::mpsc::SyncSender;

use tracing::{debug, warn};

use crate::common::{last_sector, sectors_to_bytes, HashAlgorithm};
use crate::error::{Result, SeghashError};
use crate::pipeline::{ByteRange, Segment};

use super::format::split_record;
use super::{ManifestRowError, RowErrorKind};

// =============================================================================
// Record iteration
// =============================================================================

/// Non-blank records with their 1-based line numbers
struct Records<R> {
    source: R,
    line: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> Records<R> {
    fn new(source: R) -> Self {
        Self {
            source,
            line: 0,
            buf: Vec::new(),
        }
    }

    fn next_record(&mut self) -> io::Result<Option<(usize, String)>> {
        loop {
            self.buf.clear();
            if self.source.read_until(b'\n', &mut self.buf)? == 0 {
                return Ok(None);
            }
            self.line += 1;

            let text = String::from_utf8_lossy(&self.buf);
            let record = text.trim_end_matches(&['\n', '\r'][..]);
            if !record.trim().is_empty() {
                return Ok(Some((self.line, record.to_string())));
            }
        }
    }
}

// =============================================================================
// Row validation
// =============================================================================

/// Parse and validate one manifest row against the image's last sector
pub fn parse_row(
    line: usize,
    raw: &str,
    last_sector: Option<u64>,
    digest_len: Option<usize>,
) -> std::result::Result<Segment, ManifestRowError> {
    let reject = |kind| ManifestRowError {
        line,
        raw: raw.to_string(),
        kind,
    };

    let fields = split_record(raw);
    if fields.len() != 3 {
        return Err(reject(RowErrorKind::FieldCount(fields.len())));
    }

    let hash = hex::decode(fields[0].trim()).map_err(|_| reject(RowErrorKind::InvalidDigest))?;
    if hash.is_empty() {
        return Err(reject(RowErrorKind::InvalidDigest));
    }
    if let Some(expected) = digest_len {
        if hash.len() != expected {
            return Err(reject(RowErrorKind::DigestLength {
                expected,
                actual: hash.len(),
            }));
        }
    }

    let start_lba: u64 = fields[1]
        .trim()
        .parse()
        .map_err(|_| reject(RowErrorKind::InvalidLba { field: "start" }))?;
    let end_lba: u64 = fields[2]
        .trim()
        .parse()
        .map_err(|_| reject(RowErrorKind::InvalidLba { field: "end" }))?;

    if end_lba < start_lba {
        return Err(reject(RowErrorKind::InvertedRange {
            start: start_lba,
            end: end_lba,
        }));
    }
    if last_sector.map_or(true, |last| end_lba > last) {
        return Err(reject(RowErrorKind::OutOfBounds {
            start: start_lba,
            end: end_lba,
        }));
    }

    let (start, length) = sectors_to_bytes(start_lba, end_lba);
    Ok(Segment::new(start, length, hash))
}

// =============================================================================
// Manifest Reader
// =============================================================================

/// Iterator over the expected segments of a manifest.
///
/// Yields `Err` only for I/O failures; invalid rows come through as segments
/// with `err` set.
pub struct ManifestReader<R> {
    records: Records<R>,
    last_sector: Option<u64>,
    digest_len: Option<usize>,
}

impl<R: BufRead> ManifestReader<R> {
    /// `data_size` is the size of the image being verified; rows reaching
    /// past its last sector are rejected.
    pub fn new(source: R, data_size: u64) -> Self {
        Self {
            records: Records::new(source),
            last_sector: last_sector(data_size),
            digest_len: None,
        }
    }

    /// Also reject rows whose digest length does not match `algorithm`
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.digest_len = Some(algorithm.digest_len());
        self
    }
}

impl<R: BufRead> Iterator for ManifestReader<R> {
    type Item = io::Result<Segment>;

    fn next(&mut self) -> Option<Self::Item> {
        let (line, raw) = match self.records.next_record() {
            Ok(Some(record)) => record,
            Ok(None) => return None,
            Err(e) => return Some(Err(e)),
        };

        let segment = match parse_row(line, &raw, self.last_sector, self.digest_len) {
            Ok(segment) => segment,
            Err(err) => {
                warn!(%err, "Invalid manifest row");
                Segment::invalid(err)
            }
        };
        Some(Ok(segment))
    }
}

/// Row counters for one manifest pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManifestStats {
    pub rows: u64,
    pub errors: u64,
}

/// Feed the streamer and the verifier from a manifest, in lock step.
///
/// For each valid row the byte range goes to `ranges` before the expected
/// segment goes to `expected`; invalid rows only produce the segment. Stops
/// quietly if either receiver hangs up.
pub fn run_manifest_reader<R: BufRead>(
    reader: ManifestReader<R>,
    ranges: SyncSender<ByteRange>,
    expected: SyncSender<Segment>,
) -> Result<ManifestStats> {
    let mut stats = ManifestStats::default();

    for segment in reader {
        let segment = segment?;
        stats.rows += 1;

        if segment.err.is_none() {
            if ranges.send(segment.range()).is_err() {
                break;
            }
        } else {
            stats.errors += 1;
        }
        if expected.send(segment).is_err() {
            break;
        }
    }

    debug!(?stats, "Manifest read");
    Ok(stats)
}

/// Identify the hash algorithm of a manifest from its first row's digest
pub fn detect_algorithm<R: BufRead>(source: R) -> Result<HashAlgorithm> {
    let mut records = Records::new(source);
    let (line, raw) = records
        .next_record()?
        .ok_or_else(|| SeghashError::InvalidManifest("no segment rows".to_string()))?;

    let fields = split_record(&raw);
    if fields.len() != 3 {
        return Err(SeghashError::InvalidManifest(format!(
            "line {line}: expected 3 fields, found {}",
            fields.len()
        )));
    }
    let digest = hex::decode(fields[0].trim())
        .map_err(|_| SeghashError::InvalidManifest(format!("line {line}: digest is not valid hex")))?;

    let algorithm = HashAlgorithm::from_digest_len(digest.len())?;
    debug!(%algorithm, "Detected manifest hash algorithm");
    Ok(algorithm)
}
