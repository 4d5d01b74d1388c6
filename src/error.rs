//! Error types for segment hashing and verification

use std::io;

/// Result type alias for seghash operations
pub type Result<T> = std::result::Result<T, SeghashError>;

/// Errors that stop a calculation or verification run.
///
/// Per-row manifest problems are not represented here: they are recovered
/// inside the manifest reader and travel as [`crate::manifest::ManifestRowError`]
/// on the affected segment.
#[derive(Debug, thiserror::Error)]
pub enum SeghashError {
    /// I/O error while reading the image or the manifest, or writing output
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unknown hash type '{0}'. Supported: md5, sha1, sha224, sha256, sha384, sha512")]
    UnknownAlgorithm(String),

    #[error("unknown hash type with digest length {0}")]
    UnknownDigestLength(usize),

    /// Zero, more than two, or repeated algorithms requested
    #[error("invalid hash selection: {0}")]
    InvalidAlgorithms(String),

    #[error("invalid segment size: {0}")]
    InvalidSegmentSize(String),

    /// The manifest cannot be used at all (e.g. its first row is unreadable)
    #[error("file with segment hashes is invalid: {0}")]
    InvalidManifest(String),

    /// Command-line validation failure
    #[error("{0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Internal consistency faults - range accounting defects, never user input
    // -------------------------------------------------------------------------
    #[error("internal error: segment start is not sector aligned. start={start}")]
    Misaligned { start: u64 },

    #[error("internal error: zero-length segment at offset {start}")]
    EmptySegment { start: u64 },

    #[error("internal error: manifest segment start ({expected}) is different from calculated segment start ({computed})")]
    Desync { expected: u64, computed: u64 },

    #[error("internal error: calculated segments ended before manifest segment at offset {expected}")]
    MissingSegment { expected: u64 },

    #[error("internal error: read buffer {slot} is still shared with a consumer")]
    BufferInUse { slot: usize },

    #[error("internal error: {0} thread panicked")]
    WorkerPanicked(&'static str),
}

impl SeghashError {
    /// True for faults that indicate a defect in range accounting rather than
    /// a problem with the user's input.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            SeghashError::Misaligned { .. }
                | SeghashError::EmptySegment { .. }
                | SeghashError::Desync { .. }
                | SeghashError::MissingSegment { .. }
                | SeghashError::BufferInUse { .. }
                | SeghashError::WorkerPanicked(_)
        )
    }
}
