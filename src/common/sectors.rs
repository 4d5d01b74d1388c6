// Sector (LBA) addressing for segment manifests
//
// Manifests address segments by inclusive logical block address pairs with a
// fixed 512-byte sector. Segment starts are always sector aligned; lengths
// may end mid-sector only for the final segment of an image.

use crate::error::{Result, SeghashError};

use super::SECTOR_SIZE;

/// Convert a byte range to an inclusive `(start_lba, end_lba)` pair.
///
/// A misaligned or empty range can only come from a range accounting defect
/// and is reported as an internal fault.
pub fn bytes_to_sectors(start: u64, length: u64) -> Result<(u64, u64)> {
    if start % SECTOR_SIZE != 0 {
        return Err(SeghashError::Misaligned { start });
    }
    if length == 0 {
        return Err(SeghashError::EmptySegment { start });
    }
    let start_lba = start / SECTOR_SIZE;
    let end_lba = start_lba + length.div_ceil(SECTOR_SIZE) - 1;
    Ok((start_lba, end_lba))
}

/// Convert an inclusive LBA pair to `(start_offset, length)` in bytes.
///
/// Callers guarantee `end_lba >= start_lba`; the manifest reader checks the
/// pair against the image size before converting, so the products fit.
pub fn sectors_to_bytes(start_lba: u64, end_lba: u64) -> (u64, u64) {
    let start = start_lba * SECTOR_SIZE;
    let length = (end_lba - start_lba + 1) * SECTOR_SIZE;
    (start, length)
}

/// Last addressable LBA of an image of `size` bytes, `None` for an empty image
pub fn last_sector(size: u64) -> Option<u64> {
    size.div_ceil(SECTOR_SIZE).checked_sub(1)
}
