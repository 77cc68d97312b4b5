//! ZIP Bomb Protection Tests
//!
//! Decompression is bounded by the size declared in the central directory;
//! entries that inflate past (or short of) that size are refused.

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};
use zip_compress::archive::END_RECORD_SIZE;
use zip_compress::{ArchiveError, ArchiveReader, ArchiveWriter, CompressionMethod};

/// Helper: Rewrite the uncompressed size of the first central directory record
fn patch_declared_size(path: &Path, declared: u32) {
    let bytes = fs::read(path).unwrap();
    let end = &bytes[bytes.len() - END_RECORD_SIZE..];
    let cd_offset = u32::from_le_bytes([end[16], end[17], end[18], end[19]]) as u64;

    // Uncompressed size lives at offset 24 of the record
    let mut file = OpenOptions::new().write(true).open(path).unwrap();
    file.seek(SeekFrom::Start(cd_offset + 24)).unwrap();
    file.write_all(&declared.to_le_bytes()).unwrap();
}

#[test]
fn test_legitimate_highly_compressible_data() {
    println!("\n💣 Testing legitimate highly compressible data (10MB zeros)...");

    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path();

    let data = vec![0u8; 10 * 1024 * 1024];
    {
        let mut writer = ArchiveWriter::create(path).unwrap();
        writer.add_data("zeros.bin", &data).unwrap();
        writer.finish().unwrap();
    }

    let archive_size = fs::metadata(path).unwrap().len();
    let compression_ratio = data.len() as f64 / archive_size as f64;
    println!("  Compressed archive: {} KB", archive_size / 1024);
    println!("  Compression ratio: {:.1}x", compression_ratio);

    assert!(archive_size < 100 * 1024, "Archive should compress to < 100KB");

    let mut reader = ArchiveReader::open(path).unwrap();
    let read_data = reader.extract_file_to_memory("zeros.bin").unwrap();
    assert_eq!(read_data, data);

    println!("  ✅ Legitimate highly compressible data handled correctly");
}

#[test]
fn test_understated_size_is_refused() {
    println!("\n💣 Testing entry that inflates past its declared size...");

    let dir = TempDir::new().unwrap();
    let archive_path = dir.path().join("bomb.zip");
    {
        let mut writer = ArchiveWriter::create(&archive_path).unwrap();
        writer.add_data("bomb.bin", &vec![0u8; 4 * 1024 * 1024]).unwrap();
    }

    // Claim the 4MB payload inflates to 1KB
    patch_declared_size(&archive_path, 1024);

    let mut reader = ArchiveReader::open(&archive_path).unwrap();
    assert_eq!(reader.get_entry("bomb.bin").unwrap().uncompressed_size, 1024);

    let err = reader.extract_file_to_memory("bomb.bin").unwrap_err();
    assert!(matches!(err, ArchiveError::CorruptArchive(_)), "got: {:?}", err);

    let out = dir.path().join("out");
    let err = reader.extract_all(&out).unwrap_err();
    assert!(err.is_corruption());
    assert!(!out.join("bomb.bin").exists());

    println!("  ✅ Oversized output refused: {}", err);
}

#[test]
fn test_overstated_size_is_refused() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path();
    {
        let mut writer = ArchiveWriter::create(path).unwrap();
        writer
            .add_data_with_compression("short.txt", b"only a few bytes", CompressionMethod::Store)
            .unwrap();
    }

    patch_declared_size(path, 1_000_000);

    let mut reader = ArchiveReader::open(path).unwrap();
    let err = reader.extract_file_to_memory("short.txt").unwrap_err();
    assert!(matches!(err, ArchiveError::CorruptArchive(_)));
}

#[test]
fn test_mixed_compressibility_files() {
    let temp_file = NamedTempFile::new().unwrap();
    let path = temp_file.path();

    let text = b"The quick brown fox jumps over the lazy dog. ".repeat(500);
    let mut state = 0x9E3779B97F4A7C15u64;
    let random: Vec<u8> = (0..64 * 1024)
        .map(|_| {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 33) as u8
        })
        .collect();

    {
        let mut writer = ArchiveWriter::create(path).unwrap();
        writer.add_data("text.txt", &text).unwrap();
        writer.add_data("random.bin", &random).unwrap();
    }

    let mut reader = ArchiveReader::open(path).unwrap();
    let text_entry = reader.get_entry("text.txt").unwrap().clone();
    let random_entry = reader.get_entry("random.bin").unwrap().clone();

    assert_eq!(text_entry.compression, CompressionMethod::Deflate);
    assert!(text_entry.compressed_size * 10 < text_entry.uncompressed_size);

    // Never larger than the input
    assert_eq!(random_entry.compression, CompressionMethod::Store);
    assert_eq!(random_entry.compressed_size, random.len() as u64);

    assert_eq!(reader.extract_file_to_memory("text.txt").unwrap(), text);
    assert_eq!(reader.extract_file_to_memory("random.bin").unwrap(), random);
}
