mod compression;
mod end_record;
mod format;
mod local_entry;
mod reader;
mod writer;

pub use end_record::{EndRecord, END_RECORD_SIGNATURE, END_RECORD_SIZE};
pub use format::{
    CompressionMethod, DosDateTime, EntryInfo, CENTRAL_DIRECTORY_FIXED_SIZE,
    CENTRAL_DIRECTORY_SIGNATURE, DEFAULT_COMPRESSION_LEVEL, FLAG_DATA_DESCRIPTOR, FLAG_ENCRYPTED,
    FLAG_UTF8, MAX_ZIP32_ENTRIES, MAX_ZIP32_SIZE, VERSION_MADE_BY, VERSION_NEEDED,
};
pub use local_entry::{LOCAL_ENTRY_SIGNATURE, LOCAL_HEADER_FIXED_SIZE};
pub use reader::ArchiveReader;
pub use writer::ArchiveWriter;
