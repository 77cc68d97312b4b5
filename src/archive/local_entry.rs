use crate::archive::format::{
    decode_name, name_flags, read_u16, read_u32, skip, zip32, CompressionMethod, DosDateTime,
    EntryInfo, VERSION_NEEDED,
};
use crate::error::{ArchiveError, Result};
use std::io::{Read, Write};

/// Local file header signature "PK\x03\x04"
pub const LOCAL_ENTRY_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Fixed portion of a local file header in bytes
pub const LOCAL_HEADER_FIXED_SIZE: usize = 30;

/// Local File Header
///
/// Precedes each entry's stored or deflated data, enabling sequential
/// streaming reads without consulting the central directory.
///
/// Structure (30 bytes + name + extra):
/// - Signature: "PK\x03\x04" (4 bytes)
/// - Version needed: uint16
/// - Flags: uint16
/// - Compression method: uint16 (0 = store, 8 = deflate)
/// - DOS time, DOS date: uint16 each
/// - CRC32: uint32
/// - Compressed size: uint32
/// - Uncompressed size: uint32
/// - Name length, extra length: uint16 each
/// - Name: variable
/// - Extra: variable (never written by this crate)
#[derive(Debug, Clone)]
pub struct LocalEntryHeader {
    pub flags: u16,
    pub compression: CompressionMethod,
    pub modified: DosDateTime,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub name: String,
    /// Name length as recorded on disk; lossy decoding can change `name.len()`
    pub name_len: u16,
    pub extra_len: u16,
}

impl LocalEntryHeader {
    /// Create a new local entry header
    pub fn new(
        name: String,
        compression: CompressionMethod,
        modified: DosDateTime,
        crc32: u32,
        compressed_size: u64,
        uncompressed_size: u64,
    ) -> Self {
        Self {
            flags: name_flags(&name),
            compression,
            modified,
            crc32,
            compressed_size,
            uncompressed_size,
            name_len: u16::try_from(name.len()).unwrap_or(u16::MAX),
            name,
            extra_len: 0,
        }
    }

    /// Header mirroring a central directory record
    pub fn for_entry(entry: &EntryInfo) -> Self {
        Self::new(
            entry.name.clone(),
            entry.compression,
            entry.modified,
            entry.crc32,
            entry.compressed_size,
            entry.uncompressed_size,
        )
    }

    /// Write local entry header to a writer
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<usize> {
        let name_bytes = self.name.as_bytes();
        if name_bytes.len() > u16::MAX as usize {
            return Err(ArchiveError::PathError(format!(
                "Name too long: {} bytes (max {})",
                name_bytes.len(),
                u16::MAX
            )));
        }

        writer.write_all(&LOCAL_ENTRY_SIGNATURE)?;
        writer.write_all(&VERSION_NEEDED.to_le_bytes())?;
        writer.write_all(&self.flags.to_le_bytes())?;
        writer.write_all(&self.compression.as_u16().to_le_bytes())?;
        writer.write_all(&self.modified.time.to_le_bytes())?;
        writer.write_all(&self.modified.date.to_le_bytes())?;
        writer.write_all(&self.crc32.to_le_bytes())?;
        writer.write_all(&zip32(self.compressed_size, "compressed size")?.to_le_bytes())?;
        writer.write_all(&zip32(self.uncompressed_size, "uncompressed size")?.to_le_bytes())?;
        writer.write_all(&(name_bytes.len() as u16).to_le_bytes())?;
        writer.write_all(&0u16.to_le_bytes())?;
        writer.write_all(name_bytes)?;

        Ok(LOCAL_HEADER_FIXED_SIZE + name_bytes.len())
    }

    /// Read local entry header from a reader, leaving it positioned at the data
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut sig = [0u8; 4];
        reader.read_exact(&mut sig)?;
        if sig != LOCAL_ENTRY_SIGNATURE {
            return Err(ArchiveError::CorruptArchive(
                "Invalid local entry signature".to_string(),
            ));
        }

        let _version_needed = read_u16(&mut reader)?;
        let flags = read_u16(&mut reader)?;
        let compression = CompressionMethod::from_u16(read_u16(&mut reader)?);
        let time = read_u16(&mut reader)?;
        let date = read_u16(&mut reader)?;
        let crc32 = read_u32(&mut reader)?;
        let compressed_size = read_u32(&mut reader)?;
        let uncompressed_size = read_u32(&mut reader)?;
        let name_len = read_u16(&mut reader)?;
        let extra_len = read_u16(&mut reader)?;

        let mut name_buf = vec![0u8; name_len as usize];
        reader.read_exact(&mut name_buf)?;
        skip(&mut reader, extra_len as u64)?;

        Ok(Self {
            flags,
            compression,
            modified: DosDateTime::new(time, date),
            crc32,
            compressed_size: compressed_size as u64,
            uncompressed_size: uncompressed_size as u64,
            name: decode_name(name_buf, flags),
            name_len,
            extra_len,
        })
    }

    /// Calculate the total size of this header when written
    pub fn header_size(&self) -> usize {
        LOCAL_HEADER_FIXED_SIZE + self.name_len as usize + self.extra_len as usize
    }
}
