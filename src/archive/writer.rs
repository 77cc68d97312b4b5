use crate::archive::compression::{compress, deflate_stream, store_stream, StreamStats};
use crate::archive::end_record::EndRecord;
use crate::archive::format::{
    zip32, CompressionMethod, DosDateTime, EntryInfo, DEFAULT_COMPRESSION_LEVEL,
    MAX_ZIP32_ENTRIES, MAX_ZIP32_SIZE,
};
use crate::archive::local_entry::LocalEntryHeader;
use crate::error::{ArchiveError, Result};
use crate::path::{normalize_name, relativize};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Archive writer for creating .zip files
///
/// Entries are written as they are added; the central directory and end
/// record are written once by [`finish`](Self::finish), or on drop if the
/// caller never calls it.
pub struct ArchiveWriter {
    writer: BufWriter<File>,
    /// Canonical path of the archive itself, never added as an entry
    output_path: Option<PathBuf>,
    entries: Vec<EntryInfo>,
    names: HashSet<String>,
    current_offset: u64,
    compression: CompressionMethod,
    level: u32,
    finished: bool,
}

impl ArchiveWriter {
    /// Create a new archive file, truncating any existing one
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path.as_ref())?;

        let output_path = fs::canonicalize(path.as_ref()).ok();
        debug!(path = %path.as_ref().display(), "created archive");

        Ok(Self {
            writer: BufWriter::new(file),
            output_path,
            entries: Vec::new(),
            names: HashSet::new(),
            current_offset: 0,
            compression: CompressionMethod::Deflate,
            level: DEFAULT_COMPRESSION_LEVEL,
            finished: false,
        })
    }

    /// Set the compression method used by `add_file`, `add_folder` and `add_data`
    pub fn with_compression(mut self, method: CompressionMethod) -> Result<Self> {
        self.compression = method.ensure_supported()?;
        Ok(self)
    }

    /// Set the deflate level (0 = fastest, 9 = smallest)
    pub fn with_compression_level(mut self, level: u32) -> Result<Self> {
        if level > 9 {
            return Err(ArchiveError::InvalidArgument(format!(
                "Compression level {} out of range 0..=9",
                level
            )));
        }
        self.level = level;
        Ok(self)
    }

    /// Entries written so far, in archive order
    pub fn entries(&self) -> &[EntryInfo] {
        &self.entries
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Add a file from disk, stored under its base name.
    ///
    /// Paths that do not resolve to a regular file (directories, missing
    /// paths, sockets) are skipped without error, as is the archive being
    /// written. Exactly the file's size at the time of the call is read.
    pub fn add_file<P: AsRef<Path>>(&mut self, file_path: P) -> Result<()> {
        self.add_file_with_base(file_path, "")
    }

    /// Add a file from disk, stored under its path relative to `base_path`.
    ///
    /// An empty `base_path` behaves like [`add_file`](Self::add_file).
    pub fn add_file_with_base<P: AsRef<Path>, B: AsRef<Path>>(
        &mut self,
        file_path: P,
        base_path: B,
    ) -> Result<()> {
        self.ensure_open()?;
        let file_path = file_path.as_ref();

        let metadata = match fs::metadata(file_path) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => {
                warn!(path = %file_path.display(), "skipping non-regular file");
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(path = %file_path.display(), "skipping missing file");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if self.is_own_output(file_path) {
            warn!(path = %file_path.display(), "skipping the archive being written");
            return Ok(());
        }

        if metadata.len() > MAX_ZIP32_SIZE {
            return Err(ArchiveError::TooLarge(format!(
                "{} is {} bytes (max {})",
                file_path.display(),
                metadata.len(),
                MAX_ZIP32_SIZE
            )));
        }

        let name = relativize(file_path, base_path.as_ref())?;
        self.check_new_name(&name)?;

        let modified = metadata
            .modified()
            .map(DosDateTime::from_system_time)
            .unwrap_or_else(|_| DosDateTime::now());

        let source = File::open(file_path)?;
        self.add_stream(name, source, metadata.len(), modified)
    }

    /// Add every regular file under `folder_path`, named relative to it
    pub fn add_folder<P: AsRef<Path>>(&mut self, folder_path: P) -> Result<()> {
        self.ensure_open()?;
        let folder_path = folder_path.as_ref();

        if !folder_path.exists() {
            return Err(ArchiveError::FolderNotFound(folder_path.to_path_buf()));
        }
        if !folder_path.is_dir() {
            return Err(ArchiveError::InvalidArgument(format!(
                "Not a folder: {}",
                folder_path.display()
            )));
        }

        for entry in WalkDir::new(folder_path).sort_by_file_name() {
            let entry = entry?;
            // Follows symlinks to files; directories are only walked, never stored
            if entry.path().is_file() {
                self.add_file_with_base(entry.path(), folder_path)?;
            }
        }

        Ok(())
    }

    /// Add an in-memory buffer using the writer's compression method.
    ///
    /// An empty buffer is valid and produces a zero-length stored entry.
    pub fn add_data(&mut self, name: &str, data: &[u8]) -> Result<()> {
        self.add_data_with_compression(name, data, self.compression)
    }

    /// Add an in-memory buffer with a specific compression method
    pub fn add_data_with_compression(
        &mut self,
        name: &str,
        data: &[u8],
        compression: CompressionMethod,
    ) -> Result<()> {
        self.ensure_open()?;
        let name = normalize_name(name)?;
        self.check_new_name(&name)?;

        if data.len() as u64 > MAX_ZIP32_SIZE {
            return Err(ArchiveError::TooLarge(format!(
                "{} is {} bytes (max {})",
                name,
                data.len(),
                MAX_ZIP32_SIZE
            )));
        }

        let (payload, actual_compression) = compress(data, compression, self.level)?;
        if actual_compression != compression && !data.is_empty() {
            debug!(name = %name, "deflate not beneficial, storing");
        }

        let start = self.current_offset;
        let stats = StreamStats {
            crc32: crc32fast::hash(data),
            uncompressed_size: data.len() as u64,
            compressed_size: payload.len() as u64,
        };
        let result = self.write_buffered_entry(name, &payload, actual_compression, stats);
        if result.is_err() {
            self.rollback(start);
        }
        result
    }

    /// Write the central directory and end record.
    ///
    /// Idempotent: only the first call writes anything. After it, every
    /// `add_*` call fails with [`ArchiveError::Finished`].
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;

        // A failed entry may have left the stream past the last good entry
        self.writer.seek(SeekFrom::Start(self.current_offset))?;

        let cd_offset = self.current_offset;
        let mut cd_size = 0u64;
        for entry in &self.entries {
            cd_size += entry.write_to(&mut self.writer)? as u64;
        }

        let end_record = EndRecord::new(
            self.entries.len() as u16,
            zip32(cd_size, "central directory size")?,
            zip32(cd_offset, "central directory offset")?,
        );
        let end_size = end_record.write_to(&mut self.writer)? as u64;
        self.writer.flush()?;

        // Drop bytes left behind by a rolled-back final entry
        let archive_len = cd_offset + cd_size + end_size;
        self.writer.get_ref().set_len(archive_len)?;

        info!(
            entries = self.entries.len(),
            central_directory_size = cd_size,
            archive_size = archive_len,
            "finished archive"
        );

        Ok(())
    }

    fn is_own_output(&self, path: &Path) -> bool {
        match &self.output_path {
            Some(output) => fs::canonicalize(path).map_or(false, |p| &p == output),
            None => false,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.finished {
            return Err(ArchiveError::Finished);
        }
        Ok(())
    }

    /// Refuse duplicate names and entry counts past the ZIP32 limit
    fn check_new_name(&self, name: &str) -> Result<()> {
        if self.names.contains(name) {
            return Err(ArchiveError::DuplicateEntry(name.to_string()));
        }
        if self.entries.len() >= MAX_ZIP32_ENTRIES {
            return Err(ArchiveError::TooLarge(format!(
                "More than {} entries",
                MAX_ZIP32_ENTRIES
            )));
        }
        Ok(())
    }

    /// Write a header and a payload whose sizes are already known
    fn write_buffered_entry(
        &mut self,
        name: String,
        payload: &[u8],
        compression: CompressionMethod,
        stats: StreamStats,
    ) -> Result<()> {
        let modified = DosDateTime::now();
        let entry = EntryInfo::new_file(
            name,
            compression,
            stats.crc32,
            stats.compressed_size,
            stats.uncompressed_size,
            self.current_offset,
            modified,
        );

        let header_len = LocalEntryHeader::for_entry(&entry).write_to(&mut self.writer)?;
        self.writer.write_all(payload)?;

        self.record_entry(entry, header_len as u64);
        Ok(())
    }

    /// Write a streamed entry, rewinding to its start if anything fails
    fn add_stream<R: Read + Seek>(
        &mut self,
        name: String,
        source: R,
        len: u64,
        modified: DosDateTime,
    ) -> Result<()> {
        let start = self.current_offset;
        let result = self.write_streamed_entry(name, source, len, modified);
        if result.is_err() {
            self.rollback(start);
        }
        result
    }

    /// Stream exactly `len` bytes through the encoder, then patch the local header.
    ///
    /// When deflate does not shrink the data, the source is rewound and
    /// stored instead, overwriting the deflated bytes in place.
    fn write_streamed_entry<R: Read + Seek>(
        &mut self,
        name: String,
        mut source: R,
        len: u64,
        modified: DosDateTime,
    ) -> Result<()> {
        let header_offset = self.current_offset;
        let mut header = LocalEntryHeader::new(name, self.compression, modified, 0, 0, 0);
        let header_len = header.write_to(&mut self.writer)? as u64;
        let data_offset = header_offset + header_len;

        // Bounded by the size taken up front, so a growing source cannot run away
        let mut stats = match self.compression {
            CompressionMethod::Deflate => {
                deflate_stream((&mut source).take(len), &mut self.writer, self.level)?
            }
            _ => store_stream((&mut source).take(len), &mut self.writer)?,
        };
        if stats.uncompressed_size != len {
            return Err(ArchiveError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "{} shrank while being archived: expected {} bytes, read {}",
                    header.name, len, stats.uncompressed_size
                ),
            )));
        }

        if header.compression == CompressionMethod::Deflate
            && stats.compressed_size >= stats.uncompressed_size
        {
            debug!(name = %header.name, "deflate not beneficial, storing");
            source.seek(SeekFrom::Start(0))?;
            self.writer.seek(SeekFrom::Start(data_offset))?;
            let stored = store_stream((&mut source).take(len), &mut self.writer)?;
            if stored.crc32 != stats.crc32 || stored.uncompressed_size != stats.uncompressed_size {
                return Err(ArchiveError::Io(io::Error::new(
                    io::ErrorKind::Other,
                    format!("{} changed while being archived", header.name),
                )));
            }
            header.compression = CompressionMethod::Store;
            stats = stored;
        }

        header.crc32 = stats.crc32;
        header.compressed_size = stats.compressed_size;
        header.uncompressed_size = stats.uncompressed_size;

        let data_end = data_offset + stats.compressed_size;
        zip32(data_end, "entry end offset")?;

        self.writer.seek(SeekFrom::Start(header_offset))?;
        header.write_to(&mut self.writer)?;
        self.writer.seek(SeekFrom::Start(data_end))?;

        let entry = EntryInfo::new_file(
            header.name,
            header.compression,
            stats.crc32,
            stats.compressed_size,
            stats.uncompressed_size,
            header_offset,
            modified,
        );
        self.record_entry(entry, header_len);
        Ok(())
    }

    fn record_entry(&mut self, entry: EntryInfo, header_len: u64) {
        debug!(
            name = %entry.name,
            method = ?entry.compression,
            uncompressed = entry.uncompressed_size,
            compressed = entry.compressed_size,
            "added entry"
        );
        self.current_offset += header_len + entry.compressed_size;
        self.names.insert(entry.name.clone());
        self.entries.push(entry);
    }

    /// Return the stream to the end of the last complete entry
    fn rollback(&mut self, offset: u64) {
        if let Err(e) = self.writer.seek(SeekFrom::Start(offset)) {
            // finish() seeks again before writing the central directory
            warn!(error = %e, "failed to rewind after a failed entry");
        }
    }
}

impl Drop for ArchiveWriter {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.finish() {
                warn!(error = %e, "implicit finish failed; archive is incomplete");
            }
        }
    }
}
