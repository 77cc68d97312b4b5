use crate::archive::format::{read_u16, read_u32};
use crate::error::{ArchiveError, Result};
use std::io::{Read, Seek, SeekFrom, Write};

/// End of central directory signature "PK\x05\x06"
pub const END_RECORD_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x05, 0x06];

/// End record size in bytes, excluding the trailing comment
pub const END_RECORD_SIZE: usize = 22;

/// Maximum archive comment length allowed by the format
const MAX_COMMENT_SIZE: usize = 65535;

/// End of Central Directory Record
///
/// Located at the end of the archive, optionally followed by a comment.
/// Allows readers to locate the central directory by reading from the end
/// of the file without scanning from the beginning.
///
/// Structure (22 bytes + comment):
/// - Signature: "PK\x05\x06" (4 bytes)
/// - Disk number: uint16
/// - Disk with central directory: uint16
/// - Entries on this disk: uint16
/// - Total entries: uint16
/// - Central Directory Size: uint32
/// - Central Directory Offset: uint32
/// - Comment length: uint16
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndRecord {
    pub disk_number: u16,
    pub disk_with_central_directory: u16,
    pub disk_entries: u16,
    pub total_entries: u16,
    pub central_directory_size: u32,
    pub central_directory_offset: u32,
    pub comment_len: u16,
}

impl EndRecord {
    /// Create a new single-disk end record with no comment
    pub fn new(entry_count: u16, central_directory_size: u32, central_directory_offset: u32) -> Self {
        Self {
            disk_number: 0,
            disk_with_central_directory: 0,
            disk_entries: entry_count,
            total_entries: entry_count,
            central_directory_size,
            central_directory_offset,
            comment_len: 0,
        }
    }

    /// Write end record to a writer
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<usize> {
        writer.write_all(&END_RECORD_SIGNATURE)?;
        writer.write_all(&self.disk_number.to_le_bytes())?;
        writer.write_all(&self.disk_with_central_directory.to_le_bytes())?;
        writer.write_all(&self.disk_entries.to_le_bytes())?;
        writer.write_all(&self.total_entries.to_le_bytes())?;
        writer.write_all(&self.central_directory_size.to_le_bytes())?;
        writer.write_all(&self.central_directory_offset.to_le_bytes())?;
        writer.write_all(&self.comment_len.to_le_bytes())?;

        Ok(END_RECORD_SIZE)
    }

    /// Read end record from a reader
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut sig = [0u8; 4];
        reader.read_exact(&mut sig)?;
        if sig != END_RECORD_SIGNATURE {
            return Err(ArchiveError::CorruptArchive(
                "Invalid end record signature".to_string(),
            ));
        }

        Ok(Self {
            disk_number: read_u16(&mut reader)?,
            disk_with_central_directory: read_u16(&mut reader)?,
            disk_entries: read_u16(&mut reader)?,
            total_entries: read_u16(&mut reader)?,
            central_directory_size: read_u32(&mut reader)?,
            central_directory_offset: read_u32(&mut reader)?,
            comment_len: read_u16(&mut reader)?,
        })
    }

    /// Find the end record by scanning backward from the end of the stream.
    ///
    /// Tries the comment-less position first, then searches the last
    /// 64 KiB + 22 bytes for a signature whose comment length reaches
    /// exactly to the end of the stream. Returns the record and its offset.
    pub fn locate<R: Read + Seek>(mut reader: R, stream_len: u64) -> Result<(Self, u64)> {
        if stream_len < END_RECORD_SIZE as u64 {
            return Err(ArchiveError::CorruptArchive(format!(
                "Stream too short for end of central directory: {} bytes",
                stream_len
            )));
        }

        let search_size = (MAX_COMMENT_SIZE as u64 + END_RECORD_SIZE as u64).min(stream_len);
        let search_start = stream_len - search_size;

        reader.seek(SeekFrom::Start(search_start))?;
        let mut buf = vec![0u8; search_size as usize];
        reader.read_exact(&mut buf)?;

        for i in (0..=buf.len() - END_RECORD_SIZE).rev() {
            if buf[i..i + 4] != END_RECORD_SIGNATURE {
                continue;
            }
            let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
            if comment_len == buf.len() - i - END_RECORD_SIZE {
                let record = Self::read_from(&buf[i..i + END_RECORD_SIZE])?;
                return Ok((record, search_start + i as u64));
            }
        }

        Err(ArchiveError::CorruptArchive(
            "End of central directory signature not found".to_string(),
        ))
    }

    /// Check the record against the position it was found at
    pub fn validate(&self, record_offset: u64) -> Result<()> {
        if self.disk_number != 0 || self.disk_with_central_directory != 0 {
            return Err(ArchiveError::UnsupportedFeature(
                "Multi-volume archive".to_string(),
            ));
        }

        if self.total_entries == u16::MAX
            || self.central_directory_size == u32::MAX
            || self.central_directory_offset == u32::MAX
        {
            return Err(ArchiveError::UnsupportedFeature("ZIP64 archive".to_string()));
        }

        if self.disk_entries != self.total_entries {
            return Err(ArchiveError::CorruptArchive(format!(
                "Entry count mismatch: {} on disk, {} total",
                self.disk_entries, self.total_entries
            )));
        }

        let directory_end =
            self.central_directory_offset as u64 + self.central_directory_size as u64;
        if directory_end > record_offset {
            return Err(ArchiveError::CorruptArchive(format!(
                "Central directory ({} bytes at {}) overruns end record at {}",
                self.central_directory_size, self.central_directory_offset, record_offset
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_end_record_roundtrip() {
        let record = EndRecord::new(10, 3200, 1024);

        let mut buf = Vec::new();
        let written = record.write_to(&mut buf).unwrap();

        assert_eq!(written, END_RECORD_SIZE);
        assert_eq!(buf.len(), END_RECORD_SIZE);

        let parsed = EndRecord::read_from(&buf[..]).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_signature_validation() {
        let mut buf = vec![0xFF, 0xFF, 0xFF, 0xFF]; // Invalid signature
        buf.extend_from_slice(&[0u8; 18]);

        let result = EndRecord::read_from(&buf[..]);
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Invalid end record signature"));
    }

    #[test]
    fn test_locate_without_comment() {
        let mut data = vec![0u8; 100];
        EndRecord::new(0, 0, 100).write_to(&mut data).unwrap();
        let len = data.len() as u64;

        let (record, offset) = EndRecord::locate(Cursor::new(&data), len).unwrap();
        assert_eq!(offset, 100);
        assert_eq!(record.central_directory_offset, 100);
    }

    #[test]
    fn test_locate_with_comment() {
        let comment = b"written by another tool";
        let mut data = vec![0u8; 40];
        let mut record = EndRecord::new(0, 0, 40);
        record.comment_len = comment.len() as u16;
        record.write_to(&mut data).unwrap();
        data.extend_from_slice(comment);
        let len = data.len() as u64;

        let (found, offset) = EndRecord::locate(Cursor::new(&data), len).unwrap();
        assert_eq!(offset, 40);
        assert_eq!(found, record);
    }

    #[test]
    fn test_locate_missing_signature() {
        let data = vec![0u8; 200];
        let err = EndRecord::locate(Cursor::new(&data), 200).unwrap_err();
        assert!(err.is_corruption());

        let err = EndRecord::locate(Cursor::new(&data[..10]), 10).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_validate() {
        // Valid case
        assert!(EndRecord::new(10, 3200, 1024).validate(4224).is_ok());

        // Directory runs past the end record
        assert!(EndRecord::new(10, 3200, 1024).validate(4000).is_err());

        // Multi-volume
        let mut record = EndRecord::new(1, 46, 0);
        record.disk_number = 1;
        assert!(matches!(
            record.validate(46),
            Err(ArchiveError::UnsupportedFeature(_))
        ));

        // ZIP64 marker
        let record = EndRecord::new(u16::MAX, 46, 0);
        assert!(matches!(
            record.validate(46),
            Err(ArchiveError::UnsupportedFeature(_))
        ));
    }
}
