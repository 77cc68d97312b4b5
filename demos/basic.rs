/// Basic example demonstrating archive creation and reading
///
/// Run with: cargo run --example basic
use anyhow::Result;
use std::fs;
use zip_compress::{ArchiveReader, ArchiveWriter};

const SOURCE_DIR: &str = "tmp_basic";
const ARCHIVE: &str = "example_basic.zip";

fn main() -> Result<()> {
    println!("=== zip-compress Basic Example ===\n");

    println!("1. Creating archive...");
    create_archive()?;

    println!("\n2. Reading from archive...");
    read_archive()?;

    fs::remove_dir_all(SOURCE_DIR)?;
    println!("\n✓ Example complete!");
    Ok(())
}

fn create_archive() -> Result<()> {
    fs::create_dir_all(SOURCE_DIR)?;
    fs::write(format!("{}/a.txt", SOURCE_DIR), b"AAA")?;
    fs::write(format!("{}/b.txt", SOURCE_DIR), b"BBB")?;

    let mut writer = ArchiveWriter::create(ARCHIVE)?;
    writer.add_file(format!("{}/a.txt", SOURCE_DIR))?;
    writer.add_file(format!("{}/b.txt", SOURCE_DIR))?;
    writer.add_data("mem.txt", b"hello mem!")?;
    writer.finish()?;

    println!("   ✓ Archive created: {}", ARCHIVE);
    Ok(())
}

fn read_archive() -> Result<()> {
    let mut reader = ArchiveReader::open(ARCHIVE)?;

    println!("   Files in archive:");
    for entry in reader.entries() {
        println!(
            "     - {} ({} bytes, {:?})",
            entry.name, entry.uncompressed_size, entry.compression
        );
    }

    let data = reader.extract_file_to_memory("mem.txt")?;
    println!("\n   mem.txt: {}", String::from_utf8_lossy(&data));

    reader.extract_all("extract_out")?;
    println!("   ✓ Extracted everything to extract_out/");
    Ok(())
}
