//! Corruption Detection Suite
//!
//! Tests for detecting and handling corrupted archive files.

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use zip_compress::archive::{END_RECORD_SIZE, LOCAL_HEADER_FIXED_SIZE};
use zip_compress::{ArchiveError, ArchiveReader, ArchiveWriter, CompressionMethod};

/// Helper: Create a valid test archive with one stored and one deflated entry
fn create_test_archive() -> NamedTempFile {
    let temp_file = NamedTempFile::new().unwrap();
    let mut writer = ArchiveWriter::create(temp_file.path()).unwrap();
    writer
        .add_data_with_compression("test.txt", b"Hello, World!", CompressionMethod::Store)
        .unwrap();
    writer
        .add_data("data.bin", &b"compressible payload ".repeat(200))
        .unwrap();
    writer.finish().unwrap();
    temp_file
}

/// Helper: Offset of the first data byte of an entry
fn data_offset(path: &Path, name: &str) -> u64 {
    let reader = ArchiveReader::open(path).unwrap();
    let entry = reader.get_entry(name).unwrap();
    entry.local_header_offset + LOCAL_HEADER_FIXED_SIZE as u64 + entry.name.len() as u64
}

/// Helper: XOR the byte at a specific offset
fn flip_byte_at(path: &Path, offset: u64) {
    let bytes = fs::read(path).unwrap();
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(&[bytes[offset as usize] ^ 0xFF]).unwrap();
}

/// Helper: Overwrite bytes at specific offset
fn write_bytes_at(path: &Path, offset: u64, data: &[u8]) {
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(offset)).unwrap();
    file.write_all(data).unwrap();
}

/// Helper: Truncate file at specific offset
fn truncate_at(path: &Path, new_length: u64) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_len(new_length).unwrap();
}

#[test]
fn test_flipped_stored_byte_is_crc_mismatch() {
    let temp_file = create_test_archive();
    let path = temp_file.path();

    flip_byte_at(path, data_offset(path, "test.txt") + 3);

    let mut reader = ArchiveReader::open(path).unwrap();
    match reader.extract_file_to_memory("test.txt") {
        Err(ArchiveError::CrcMismatch { name, .. }) => assert_eq!(name, "test.txt"),
        other => panic!("Expected CrcMismatch, got: {:?}", other),
    }

    // The undamaged sibling still extracts
    assert_eq!(
        reader.extract_file_to_memory("data.bin").unwrap(),
        b"compressible payload ".repeat(200)
    );
}

#[test]
fn test_flipped_deflated_byte_is_detected() {
    let temp_file = create_test_archive();
    let path = temp_file.path();

    let reader = ArchiveReader::open(path).unwrap();
    let entry = reader.get_entry("data.bin").unwrap().clone();
    assert_eq!(entry.compression, CompressionMethod::Deflate);
    drop(reader);

    let start = data_offset(path, "data.bin");
    flip_byte_at(path, start + entry.compressed_size / 2);

    let mut reader = ArchiveReader::open(path).unwrap();
    let err = reader.extract_file_to_memory("data.bin").unwrap_err();
    assert!(err.is_corruption(), "Expected corruption, got: {:?}", err);
}

#[test]
fn test_extract_all_stops_on_corrupt_entry() {
    let temp_file = create_test_archive();
    let path = temp_file.path();
    flip_byte_at(path, data_offset(path, "test.txt"));

    let out = tempfile::TempDir::new().unwrap();
    let mut reader = ArchiveReader::open(path).unwrap();
    let err = reader.extract_all(out.path()).unwrap_err();
    assert!(err.is_corruption());

    // Nothing half-written is left at the failing target
    assert!(!out.path().join("test.txt").exists());
}

#[test]
fn test_corrupted_end_record_signature() {
    let temp_file = create_test_archive();
    let path = temp_file.path();
    let len = fs::metadata(path).unwrap().len();

    write_bytes_at(path, len - END_RECORD_SIZE as u64, &[0xFF]);

    let err = ArchiveReader::open(path).err().unwrap();
    assert!(err.is_corruption(), "Expected corruption, got: {:?}", err);
}

#[test]
fn test_central_directory_offset_past_end() {
    let temp_file = create_test_archive();
    let path = temp_file.path();
    let len = fs::metadata(path).unwrap().len();

    // CD offset lives at byte 16 of the end record
    let end_offset = len - END_RECORD_SIZE as u64;
    write_bytes_at(path, end_offset + 16, &(len as u32 + 1000).to_le_bytes());

    let err = ArchiveReader::open(path).err().unwrap();
    assert!(matches!(err, ArchiveError::CorruptArchive(_)), "got: {:?}", err);
}

#[test]
fn test_entry_count_larger_than_directory() {
    let temp_file = create_test_archive();
    let path = temp_file.path();
    let len = fs::metadata(path).unwrap().len();

    // Claim 5 entries when the directory holds 2
    let end_offset = len - END_RECORD_SIZE as u64;
    write_bytes_at(path, end_offset + 8, &5u16.to_le_bytes());
    write_bytes_at(path, end_offset + 10, &5u16.to_le_bytes());

    let err = ArchiveReader::open(path).err().unwrap();
    assert!(matches!(err, ArchiveError::CorruptArchive(_)), "got: {:?}", err);
}

#[test]
fn test_corrupted_central_directory_entry() {
    let temp_file = create_test_archive();
    let path = temp_file.path();
    let len = fs::metadata(path).unwrap().len();

    let bytes = fs::read(path).unwrap();
    let end = &bytes[(len as usize - END_RECORD_SIZE)..];
    let cd_offset = u32::from_le_bytes([end[16], end[17], end[18], end[19]]) as u64;

    // Corrupt first byte of first CD entry (signature)
    write_bytes_at(path, cd_offset, &[0xFF]);

    let err = ArchiveReader::open(path).err().unwrap();
    assert!(err.is_corruption());
}

#[test]
fn test_corrupted_local_header_signature() {
    let temp_file = create_test_archive();
    let path = temp_file.path();

    // First local header sits at offset 0
    write_bytes_at(path, 0, &[0x00]);

    let mut reader = ArchiveReader::open(path).unwrap();
    let err = reader.extract_file_to_memory("test.txt").unwrap_err();
    assert!(err.is_corruption());
}

#[test]
fn test_unsupported_compression_method() {
    let temp_file = create_test_archive();
    let path = temp_file.path();
    let len = fs::metadata(path).unwrap().len();

    let bytes = fs::read(path).unwrap();
    let end = &bytes[(len as usize - END_RECORD_SIZE)..];
    let cd_offset = u32::from_le_bytes([end[16], end[17], end[18], end[19]]) as u64;

    // Compression method is at offset 10 in the CD entry
    write_bytes_at(path, cd_offset + 10, &99u16.to_le_bytes());

    let mut reader = ArchiveReader::open(path).unwrap();
    assert_eq!(reader.entry_count(), 2);
    let err = reader.extract_file_to_memory("test.txt").unwrap_err();
    assert!(matches!(err, ArchiveError::UnsupportedCompression(99)));
}

#[test]
fn test_truncated_archive() {
    let temp_file = create_test_archive();
    let path = temp_file.path();
    let original_size = fs::metadata(path).unwrap().len();

    // Remove the last 10 bytes (inside the end record)
    truncate_at(path, original_size - 10);

    let err = ArchiveReader::open(path).err().unwrap();
    assert!(err.is_corruption());
}

#[test]
fn test_empty_file() {
    let temp_file = NamedTempFile::new().unwrap();
    let err = ArchiveReader::open(temp_file.path()).err().unwrap();
    assert!(err.is_corruption());
}
