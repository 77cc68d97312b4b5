//! Generate seed corpus for fuzzing
//!
//! Run from the repository root: cargo run --manifest-path fuzz/Cargo.toml --bin generate_seeds

use std::fs;
use zip_compress::{ArchiveWriter, CompressionMethod};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let corpus_dir = "fuzz/corpus/fuzz_archive_parse";
    fs::create_dir_all(corpus_dir)?;

    println!("Generating seed corpus...");

    // Seed 1: Empty archive (end record only)
    {
        let path = format!("{}/seed_empty.zip", corpus_dir);
        let mut writer = ArchiveWriter::create(&path)?;
        writer.finish()?;
        println!("✓ Generated: {}", path);
    }

    // Seed 2: Single stored entry
    {
        let path = format!("{}/seed_single_stored.zip", corpus_dir);
        let mut writer = ArchiveWriter::create(&path)?;
        writer.add_data_with_compression("test.txt", b"Hello, World!", CompressionMethod::Store)?;
        writer.finish()?;
        println!("✓ Generated: {}", path);
    }

    // Seed 3: Nested names
    {
        let path = format!("{}/seed_multi.zip", corpus_dir);
        let mut writer = ArchiveWriter::create(&path)?;
        writer.add_data("file1.txt", b"First file")?;
        writer.add_data("file2.txt", b"Second file")?;
        writer.add_data("dir/file3.txt", b"Third file in directory")?;
        writer.finish()?;
        println!("✓ Generated: {}", path);
    }

    // Seed 4: Deflated entry
    {
        let path = format!("{}/seed_deflate.zip", corpus_dir);
        let mut writer = ArchiveWriter::create(&path)?;
        let large_data = b"This is test data for compression. ".repeat(1000);
        writer.add_data("large.txt", &large_data)?;
        writer.finish()?;
        println!("✓ Generated: {}", path);
    }

    // Seed 5: UTF-8 name and binary data
    {
        let path = format!("{}/seed_utf8.zip", corpus_dir);
        let mut writer = ArchiveWriter::create(&path)?;
        let binary_data: Vec<u8> = (0..255).collect();
        writer.add_data("données.bin", &binary_data)?;
        writer.finish()?;
        println!("✓ Generated: {}", path);
    }

    // Seed 6: Empty entry (zero bytes)
    {
        let path = format!("{}/seed_zero_length.zip", corpus_dir);
        let mut writer = ArchiveWriter::create(&path)?;
        writer.add_data("empty.txt", b"")?;
        writer.finish()?;
        println!("✓ Generated: {}", path);
    }

    println!("\nGenerated 6 seed files in {}", corpus_dir);
    Ok(())
}
