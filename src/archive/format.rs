use crate::error::{ArchiveError, Result};
use std::io::{Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};

/// Central directory file header signature "PK\x01\x02"
pub const CENTRAL_DIRECTORY_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x01, 0x02];

/// Fixed portion of a central directory record in bytes
pub const CENTRAL_DIRECTORY_FIXED_SIZE: usize = 46;

/// Version needed to extract: 2.0 (deflate)
pub const VERSION_NEEDED: u16 = 20;

/// Version made by: host Unix (3), format version 2.0
pub const VERSION_MADE_BY: u16 = (3 << 8) | 20;

/// General purpose flag: entry is encrypted
pub const FLAG_ENCRYPTED: u16 = 1 << 0;

/// General purpose flag: sizes and CRC follow the data in a data descriptor
pub const FLAG_DATA_DESCRIPTOR: u16 = 1 << 3;

/// General purpose flag: name is UTF-8
pub const FLAG_UTF8: u16 = 1 << 11;

/// Largest size or offset representable without ZIP64
pub const MAX_ZIP32_SIZE: u64 = 0xFFFF_FFFE;

/// Largest entry count representable without ZIP64
pub const MAX_ZIP32_ENTRIES: usize = 0xFFFE;

/// zlib/miniz default deflate level
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Unix mode bits stored in the external attributes of regular files (0o100644)
const UNIX_FILE_MODE: u32 = 0o100644;

/// MS-DOS directory attribute bit
const DOS_DIRECTORY_ATTRIBUTE: u32 = 0x10;

/// Compression methods understood by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Store,
    Deflate,
    /// A method found in a foreign archive that this crate cannot decode
    Unsupported(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => Self::Store,
            8 => Self::Deflate,
            other => Self::Unsupported(other),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            Self::Store => 0,
            Self::Deflate => 8,
            Self::Unsupported(value) => value,
        }
    }

    /// Fail unless this method can be decoded
    pub fn ensure_supported(self) -> Result<Self> {
        match self {
            Self::Unsupported(value) => Err(ArchiveError::UnsupportedCompression(value)),
            supported => Ok(supported),
        }
    }
}

/// Modification timestamp in MS-DOS encoding (2-second resolution, 1980..=2107)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DosDateTime {
    pub time: u16,
    pub date: u16,
}

impl DosDateTime {
    /// Earliest representable value: 1980-01-01 00:00:00
    pub const MIN: DosDateTime = DosDateTime {
        time: 0,
        date: (1 << 5) | 1,
    };

    /// Latest representable value: 2107-12-31 23:59:58
    pub const MAX: DosDateTime = DosDateTime {
        time: (23 << 11) | (59 << 5) | 29,
        date: (127 << 9) | (12 << 5) | 31,
    };

    pub fn new(time: u16, date: u16) -> Self {
        Self { time, date }
    }

    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    /// Encode a wall-clock time (UTC), clamping to the DOS range
    pub fn from_system_time(time: SystemTime) -> Self {
        let secs = match time.duration_since(UNIX_EPOCH) {
            Ok(duration) => duration.as_secs() as i64,
            Err(_) => return Self::MIN,
        };

        match OffsetDateTime::from_unix_timestamp(secs) {
            Ok(datetime) => Self::from_datetime(PrimitiveDateTime::new(
                datetime.date(),
                datetime.time(),
            )),
            Err(_) => Self::MAX,
        }
    }

    pub fn from_datetime(datetime: PrimitiveDateTime) -> Self {
        let year = datetime.year();
        if year < 1980 {
            return Self::MIN;
        }
        if year > 2107 {
            return Self::MAX;
        }

        let time = ((datetime.hour() as u16) << 11)
            | ((datetime.minute() as u16) << 5)
            | ((datetime.second() as u16) >> 1);
        let date = (((year - 1980) as u16) << 9)
            | ((u8::from(datetime.month()) as u16) << 5)
            | datetime.day() as u16;

        Self { time, date }
    }

    /// Decode into a calendar value; `None` for out-of-range fields
    pub fn to_datetime(self) -> Option<PrimitiveDateTime> {
        let year = ((self.date >> 9) & 0x7F) as i32 + 1980;
        let month = Month::try_from(((self.date >> 5) & 0x0F) as u8).ok()?;
        let day = (self.date & 0x1F) as u8;
        let hour = ((self.time >> 11) & 0x1F) as u8;
        let minute = ((self.time >> 5) & 0x3F) as u8;
        let second = ((self.time & 0x1F) * 2) as u8;

        let date = Date::from_calendar_date(year, month, day).ok()?;
        let time = Time::from_hms(hour, minute, second).ok()?;
        Some(PrimitiveDateTime::new(date, time))
    }
}

/// Central directory record describing one entry
#[derive(Debug, Clone)]
pub struct EntryInfo {
    /// Forward-slash relative path; directories end with '/'
    pub name: String,
    pub compression: CompressionMethod,
    pub crc32: u32,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    /// Offset of the entry's local file header
    pub local_header_offset: u64,
    pub modified: DosDateTime,
    pub flags: u16,
    pub external_attributes: u32,
}

impl EntryInfo {
    /// Build the record for a regular file entry written by this crate
    pub fn new_file(
        name: String,
        compression: CompressionMethod,
        crc32: u32,
        compressed_size: u64,
        uncompressed_size: u64,
        local_header_offset: u64,
        modified: DosDateTime,
    ) -> Self {
        let flags = name_flags(&name);
        Self {
            name,
            compression,
            crc32,
            compressed_size,
            uncompressed_size,
            local_header_offset,
            modified,
            flags,
            external_attributes: UNIX_FILE_MODE << 16,
        }
    }

    /// Directory entries carry no data and end with '/'
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/')
            || (self.external_attributes & DOS_DIRECTORY_ATTRIBUTE != 0
                && self.uncompressed_size == 0)
    }

    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// Modification time decoded from its DOS encoding
    pub fn modified_time(&self) -> Option<PrimitiveDateTime> {
        self.modified.to_datetime()
    }

    /// Size of this record once written
    pub fn record_size(&self) -> usize {
        CENTRAL_DIRECTORY_FIXED_SIZE + self.name.len()
    }

    /// Write entry to central directory
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<usize> {
        let name_bytes = self.name.as_bytes();
        if name_bytes.len() > u16::MAX as usize {
            return Err(ArchiveError::PathError(format!(
                "Name too long: {} bytes (max {})",
                name_bytes.len(),
                u16::MAX
            )));
        }

        writer.write_all(&CENTRAL_DIRECTORY_SIGNATURE)?;
        writer.write_all(&VERSION_MADE_BY.to_le_bytes())?;
        writer.write_all(&VERSION_NEEDED.to_le_bytes())?;
        writer.write_all(&self.flags.to_le_bytes())?;
        writer.write_all(&self.compression.as_u16().to_le_bytes())?;
        writer.write_all(&self.modified.time.to_le_bytes())?;
        writer.write_all(&self.modified.date.to_le_bytes())?;
        writer.write_all(&self.crc32.to_le_bytes())?;
        writer.write_all(&zip32(self.compressed_size, "compressed size")?.to_le_bytes())?;
        writer.write_all(&zip32(self.uncompressed_size, "uncompressed size")?.to_le_bytes())?;
        writer.write_all(&(name_bytes.len() as u16).to_le_bytes())?;
        writer.write_all(&0u16.to_le_bytes())?; // extra field length
        writer.write_all(&0u16.to_le_bytes())?; // comment length
        writer.write_all(&0u16.to_le_bytes())?; // disk number start
        writer.write_all(&0u16.to_le_bytes())?; // internal attributes
        writer.write_all(&self.external_attributes.to_le_bytes())?;
        writer.write_all(&zip32(self.local_header_offset, "local header offset")?.to_le_bytes())?;
        writer.write_all(name_bytes)?;

        Ok(self.record_size())
    }

    /// Read entry from central directory
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut sig = [0u8; 4];
        reader.read_exact(&mut sig)?;
        if sig != CENTRAL_DIRECTORY_SIGNATURE {
            return Err(ArchiveError::CorruptArchive(
                "Invalid central directory entry signature".to_string(),
            ));
        }

        let _version_made_by = read_u16(&mut reader)?;
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
        let comment_len = read_u16(&mut reader)?;
        let disk_start = read_u16(&mut reader)?;
        let _internal_attributes = read_u16(&mut reader)?;
        let external_attributes = read_u32(&mut reader)?;
        let local_header_offset = read_u32(&mut reader)?;

        let mut name_buf = vec![0u8; name_len as usize];
        reader.read_exact(&mut name_buf)?;
        skip(&mut reader, extra_len as u64 + comment_len as u64)?;

        let name = decode_name(name_buf, flags);

        if compressed_size == u32::MAX
            || uncompressed_size == u32::MAX
            || local_header_offset == u32::MAX
        {
            return Err(ArchiveError::UnsupportedFeature(format!(
                "ZIP64 entry: {}",
                name
            )));
        }
        if disk_start != 0 {
            return Err(ArchiveError::UnsupportedFeature(format!(
                "Multi-volume entry: {}",
                name
            )));
        }

        Ok(Self {
            name,
            compression,
            crc32,
            compressed_size: compressed_size as u64,
            uncompressed_size: uncompressed_size as u64,
            local_header_offset: local_header_offset as u64,
            modified: DosDateTime::new(time, date),
            flags,
            external_attributes,
        })
    }
}

/// UTF-8 flag when the name is not plain ASCII
pub(crate) fn name_flags(name: &str) -> u16 {
    if name.is_ascii() {
        0
    } else {
        FLAG_UTF8
    }
}

/// Names without the UTF-8 flag are decoded lossily
pub(crate) fn decode_name(bytes: Vec<u8>, flags: u16) -> String {
    if flags & FLAG_UTF8 != 0 {
        match String::from_utf8(bytes) {
            Ok(name) => name,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        }
    } else {
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Narrow a size or offset to its 32-bit field
pub(crate) fn zip32(value: u64, what: &str) -> Result<u32> {
    if value > MAX_ZIP32_SIZE {
        return Err(ArchiveError::TooLarge(format!(
            "{} {} exceeds 4 GiB",
            what, value
        )));
    }
    Ok(value as u32)
}

// Helper functions for reading primitive types
pub(crate) fn read_u16<R: Read>(mut reader: R) -> Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub(crate) fn read_u32<R: Read>(mut reader: R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn skip<R: Read>(reader: R, len: u64) -> Result<()> {
    let skipped = std::io::copy(&mut reader.take(len), &mut std::io::sink())?;
    if skipped != len {
        return Err(ArchiveError::CorruptArchive(
            "Unexpected end of record".to_string(),
        ));
    }
    Ok(())
}
