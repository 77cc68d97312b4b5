use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for archive operations
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Unified error type for all archive operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    // Caller errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("File not found in archive: {0}")]
    NotFound(String),

    #[error("Folder not found: {}", .0.display())]
    FolderNotFound(PathBuf),

    #[error("Duplicate entry name: {0}")]
    DuplicateEntry(String),

    #[error("Archive already finished; no further entries can be added")]
    Finished,

    // Archive format errors
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("CRC mismatch for {name}: expected {expected:08x}, got {actual:08x}")]
    CrcMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    #[error("Unsupported compression method: {0}")]
    UnsupportedCompression(u16),

    #[error("Unsupported archive feature: {0}")]
    UnsupportedFeature(String),

    #[error("Exceeds ZIP limits: {0}")]
    TooLarge(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Path error: {0}")]
    PathError(String),
}

impl ArchiveError {
    /// True when the error means the archive bytes themselves are damaged or
    /// unreadable by this implementation.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            ArchiveError::CorruptArchive(_)
                | ArchiveError::CrcMismatch { .. }
                | ArchiveError::UnsupportedCompression(_)
        )
    }
}

impl From<walkdir::Error> for ArchiveError {
    fn from(err: walkdir::Error) -> Self {
        match err.into_io_error() {
            Some(io_err) => ArchiveError::Io(io_err),
            None => ArchiveError::PathError("Filesystem loop detected while walking folder".to_string()),
        }
    }
}

impl From<tempfile::PersistError> for ArchiveError {
    fn from(err: tempfile::PersistError) -> Self {
        ArchiveError::Io(err.error)
    }
}
