use crate::archive::compression::{decompress_stream, decompress_to_vec};
use crate::archive::end_record::EndRecord;
use crate::archive::format::EntryInfo;
use crate::archive::local_entry::{LocalEntryHeader, LOCAL_HEADER_FIXED_SIZE};
use crate::error::{ArchiveError, Result};
use crate::path::{safe_join, to_host_separators};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Archive reader with O(1) entry lookup
///
/// The whole central directory is parsed at open time; the index is
/// immutable afterwards. Entry data is read and verified on demand.
pub struct ArchiveReader {
    file: File,
    entries: Vec<EntryInfo>,
    index: HashMap<String, usize>,
    central_directory_offset: u64,
}

impl ArchiveReader {
    /// Open an archive file and parse its central directory
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path.as_ref())?;
        let stream_len = file.metadata()?.len();

        let (end_record, end_offset) = EndRecord::locate(&mut file, stream_len)?;
        end_record.validate(end_offset)?;

        let cd_offset = end_record.central_directory_offset as u64;
        let mut directory = vec![0u8; end_record.central_directory_size as usize];
        file.seek(SeekFrom::Start(cd_offset))?;
        file.read_exact(&mut directory)?;

        let entry_count = end_record.total_entries as usize;
        let mut cursor = Cursor::new(&directory[..]);
        let mut entries = Vec::with_capacity(entry_count);
        let mut index = HashMap::with_capacity(entry_count);

        for i in 0..entry_count {
            let entry = EntryInfo::read_from(&mut cursor).map_err(|e| match e {
                ArchiveError::Io(io_err) if io_err.kind() == io::ErrorKind::UnexpectedEof => {
                    ArchiveError::CorruptArchive(format!(
                        "Central directory truncated at entry {} of {}",
                        i, entry_count
                    ))
                }
                other => other,
            })?;

            if entry.local_header_offset + LOCAL_HEADER_FIXED_SIZE as u64 > cd_offset {
                return Err(ArchiveError::CorruptArchive(format!(
                    "Entry {} points past the central directory",
                    entry.name
                )));
            }

            // First occurrence wins for lookups; listing keeps every record
            index.entry(entry.name.clone()).or_insert(entries.len());
            entries.push(entry);
        }

        info!(
            path = %path.as_ref().display(),
            entries = entries.len(),
            "opened archive"
        );

        Ok(Self {
            file,
            entries,
            index,
            central_directory_offset: cd_offset,
        })
    }

    /// Get number of entries in archive
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Entry names in central directory order, using the host path separator
    pub fn file_list(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| to_host_separators(&entry.name))
            .collect()
    }

    /// Entry records in central directory order; names keep forward slashes
    pub fn entries(&self) -> &[EntryInfo] {
        &self.entries
    }

    /// Check if an entry exists (exact match)
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Get entry information without reading data
    pub fn get_entry(&self, name: &str) -> Option<&EntryInfo> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// Decompress one entry into memory.
    ///
    /// A zero-length entry yields an empty buffer.
    pub fn extract_file_to_memory(&mut self, name: &str) -> Result<Vec<u8>> {
        let entry = self.lookup(name)?.clone();
        if entry.is_dir() {
            return Ok(Vec::new());
        }

        let data = self.entry_data(&entry)?;
        let (output, crc32) = decompress_to_vec(data, entry.compression, entry.uncompressed_size)?;
        verify_crc(&entry, crc32)?;

        debug!(name = %entry.name, size = output.len(), "extracted to memory");
        Ok(output)
    }

    /// Decompress one entry into `output_path`, creating parent directories.
    ///
    /// An existing file at `output_path` is replaced only once the entry has
    /// been fully decoded and verified.
    pub fn extract_file<P: AsRef<Path>>(&mut self, name: &str, output_path: P) -> Result<()> {
        let entry = self.lookup(name)?.clone();
        self.extract_entry_to(&entry, output_path.as_ref())
    }

    /// Extract every entry under `output_folder`, overwriting existing files
    pub fn extract_all<P: AsRef<Path>>(&mut self, output_folder: P) -> Result<()> {
        let output_folder = output_folder.as_ref();
        fs::create_dir_all(output_folder)?;

        let entries = self.entries.clone();
        for entry in &entries {
            let target = safe_join(output_folder, &entry.name)?;
            self.extract_entry_to(entry, &target)?;
        }

        info!(
            folder = %output_folder.display(),
            entries = entries.len(),
            "extracted archive"
        );
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<&EntryInfo> {
        self.get_entry(name)
            .ok_or_else(|| ArchiveError::NotFound(name.to_string()))
    }

    fn extract_entry_to(&mut self, entry: &EntryInfo, target: &Path) -> Result<()> {
        if entry.is_dir() {
            fs::create_dir_all(target)?;
            return Ok(());
        }

        let parent = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        // Decode next to the target so the final rename stays on one filesystem
        let mut staging = NamedTempFile::new_in(parent)?;
        {
            let data = self.entry_data(entry)?;
            let mut out = io::BufWriter::new(staging.as_file_mut());
            let crc32 = decompress_stream(data, entry.compression, entry.uncompressed_size, &mut out)?;
            out.flush()?;
            verify_crc(entry, crc32)?;
        }
        staging.persist(target)?;

        debug!(
            name = %entry.name,
            target = %target.display(),
            size = entry.uncompressed_size,
            "extracted entry"
        );
        Ok(())
    }

    /// Position at an entry's data and return a reader over its compressed bytes
    fn entry_data(&mut self, entry: &EntryInfo) -> Result<impl Read + '_> {
        if entry.is_encrypted() {
            return Err(ArchiveError::UnsupportedFeature(format!(
                "Encrypted entry: {}",
                entry.name
            )));
        }
        entry.compression.ensure_supported()?;

        self.file.seek(SeekFrom::Start(entry.local_header_offset))?;
        let local = LocalEntryHeader::read_from(&mut self.file).map_err(|e| match e {
            ArchiveError::Io(io_err) if io_err.kind() == io::ErrorKind::UnexpectedEof => {
                ArchiveError::CorruptArchive(format!("Truncated local header for {}", entry.name))
            }
            other => other,
        })?;

        if local.compression != entry.compression {
            return Err(ArchiveError::CorruptArchive(format!(
                "Local header of {} disagrees with the central directory",
                entry.name
            )));
        }

        let data_offset = entry.local_header_offset + local.header_size() as u64;
        if data_offset + entry.compressed_size > self.central_directory_offset {
            return Err(ArchiveError::CorruptArchive(format!(
                "Data of {} overruns the central directory",
                entry.name
            )));
        }

        Ok(BufReader::new((&mut self.file).take(entry.compressed_size)))
    }
}

fn verify_crc(entry: &EntryInfo, actual: u32) -> Result<()> {
    if actual != entry.crc32 {
        return Err(ArchiveError::CrcMismatch {
            name: entry.name.clone(),
            expected: entry.crc32,
            actual,
        });
    }
    Ok(())
}
