//! Segment hash manifests
//!
//! A manifest is a headerless comma-separated file with one row per segment:
//!
//! ```text
//! <hex digest>,<start LBA>,<end LBA>
//! ```
//!
//! LBAs are inclusive 512-byte sector indices. Verification reports reuse the
//! same format with two-field diff rows (`<start LBA>,<end LBA>`) and
//! one-field error rows; row width tells them apart.

pub mod format;
pub mod reader;
pub mod writer;

pub use reader::{detect_algorithm, run_manifest_reader, ManifestReader, ManifestStats};
pub use writer::ManifestWriter;

/// Why a manifest row was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowErrorKind {
    #[error("expected 3 fields, found {0}")]
    FieldCount(usize),

    #[error("digest is not valid hex")]
    InvalidDigest,

    #[error("digest is {actual} bytes, expected {expected}")]
    DigestLength { expected: usize, actual: usize },

    #[error("{field} LBA is not an unsigned integer")]
    InvalidLba { field: &'static str },

    #[error("end LBA {end} is before start LBA {start}")]
    InvertedRange { start: u64, end: u64 },

    #[error("segment with range ({start}, {end}) exceeds input file range")]
    OutOfBounds { start: u64, end: u64 },
}

/// A structurally invalid manifest row. Recovered per row: the run keeps
/// going and the row is reported in the diff report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Error in line {line}: {kind} ({raw})")]
pub struct ManifestRowError {
    /// 1-based physical line number
    pub line: usize,
    /// The row as it appeared in the manifest
    pub raw: String,
    pub kind: RowErrorKind,
}
