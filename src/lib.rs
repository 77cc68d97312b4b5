//! zip-compress: minimal ZIP archive writer and reader
//!
//! Composes files from disk or memory into a single ZIP container and
//! extracts entries back to disk or memory:
//! - Store and deflate entries, with store fallback for incompressible data
//! - Streaming writes for files, so large inputs never sit in memory
//! - CRC-32 verification on every extraction
//! - Forward-slash entry names, relative to a base folder when adding trees
//! - Central directory written exactly once, on `finish()` or on drop
//!
//! # Example
//!
//! ```no_run
//! use zip_compress::{ArchiveReader, ArchiveWriter};
//!
//! // Create an archive
//! let mut writer = ArchiveWriter::create("example.zip")?;
//! writer.add_data("data.txt", b"Hello, World!")?;
//! writer.add_folder("assets")?;
//! writer.finish()?;
//!
//! // Read from archive
//! let mut reader = ArchiveReader::open("example.zip")?;
//! for name in reader.file_list() {
//!     println!("{}", name);
//! }
//! let data = reader.extract_file_to_memory("data.txt")?;
//! assert_eq!(data, b"Hello, World!");
//! reader.extract_all("unpacked")?;
//! # Ok::<(), zip_compress::error::ArchiveError>(())
//! ```

// Core modules
pub mod archive;
pub mod error;
pub mod path;

// Re-export commonly used types
pub use archive::{
    ArchiveReader, ArchiveWriter, CompressionMethod, DosDateTime, EntryInfo,
    DEFAULT_COMPRESSION_LEVEL,
};
pub use error::{ArchiveError, Result};
pub use path::{normalize_name, relativize};
