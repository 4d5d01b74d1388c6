// Manifest / report writer
//
// Three row shapes share one format: hash rows in calculation manifests,
// diff rows and error rows in verification reports. Each row is flushed as
// soon as it is written.

use std::io::Write;

use crate::common::bytes_to_sectors;
use crate::error::Result;
use crate::pipeline::Segment;

use super::format::{join_record, LINE_ENDING};

pub struct ManifestWriter<W: Write> {
    out: W,
    rows: u64,
}

impl<W: Write> ManifestWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out, rows: 0 }
    }

    /// `<hex digest>,<start LBA>,<end LBA>`
    pub fn write_segment(&mut self, segment: &Segment) -> Result<()> {
        let (start_lba, end_lba) = bytes_to_sectors(segment.start, segment.length)?;
        self.write_row(&[hex::encode(&segment.hash), start_lba.to_string(), end_lba.to_string()])
    }

    /// `<start LBA>,<end LBA>`
    pub fn write_diff(&mut self, start_lba: u64, end_lba: u64) -> Result<()> {
        self.write_row(&[start_lba.to_string(), end_lba.to_string()])
    }

    /// Free text in a single field
    pub fn write_error(&mut self, text: &str) -> Result<()> {
        self.write_row(&[text])
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush and hand back the underlying sink
    pub fn into_inner(mut self) -> Result<W> {
        self.out.flush()?;
        Ok(self.out)
    }

    fn write_row<S: AsRef<str>>(&mut self, fields: &[S]) -> Result<()> {
        let record = join_record(fields);
        self.out.write_all(record.as_bytes())?;
        self.out.write_all(LINE_ENDING.as_bytes())?;
        self.out.flush()?;
        self.rows += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SeghashError;

    fn written(writer: ManifestWriter<Vec<u8>>) -> String {
        String::from_utf8(writer.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_row_shapes() {
        let mut writer = ManifestWriter::new(Vec::new());
        let hash = hex::decode("5eb63bbbe01eeed093cb22bb8f5acdc3").unwrap();
        writer.write_segment(&Segment::new(3 * 1024 * 1024, 1000, hash)).unwrap();
        writer.write_diff(0, 6143).unwrap();
        writer.write_error("Error in line 2: bad, row").unwrap();
        assert_eq!(writer.rows(), 3);

        let expected = [
            "5eb63bbbe01eeed093cb22bb8f5acdc3,6144,6145",
            "0,6143",
            "\"Error in line 2: bad, row\"",
        ]
        .map(|row| format!("{row}{LINE_ENDING}"))
        .concat();
        assert_eq!(written(writer), expected);
    }

    #[test]
    fn test_misaligned_segment_is_rejected() {
        let mut writer = ManifestWriter::new(Vec::new());
        let err = writer.write_segment(&Segment::new(100, 512, vec![0; 16])).unwrap_err();
        assert!(matches!(err, SeghashError::Misaligned { start: 100 }));
        assert_eq!(writer.rows(), 0);
    }
}
