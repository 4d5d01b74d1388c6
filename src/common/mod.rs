// Common utilities shared by the calculation and verification pipelines

pub mod hash;
pub mod sectors;

// Re-exports for convenience
pub use hash::{compute_hash, HashAlgorithm, StreamingHasher};
pub use sectors::{bytes_to_sectors, last_sector, sectors_to_bytes};

// Shared constants
pub const SECTOR_SIZE: u64 = 512;
pub const BUFFER_SIZE: usize = 2 * 1024 * 1024; // 2MB per read buffer, two are in flight
pub const MIN_SEGMENT_SIZE: u64 = 2 * 1024 * 1024;
pub const DEFAULT_SEGMENT_SIZE: u64 = 4 * 1024 * 1024 * 1024;
pub const MAX_HASHES: usize = 2;
