/// Archive a 100MB file without holding it in memory
///
/// Run with: cargo run --release --example big_file
use anyhow::Result;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::time::Instant;
use zip_compress::{ArchiveReader, ArchiveWriter};

const BIG_FILE: &str = "big_test.dat";
const ARCHIVE: &str = "big_test.zip";
const SIZE_MB: usize = 100;

fn main() -> Result<()> {
    println!("=== zip-compress Big File Example ===\n");

    println!("1. Generating {} MB of zeros...", SIZE_MB);
    {
        let mut out = BufWriter::new(File::create(BIG_FILE)?);
        let chunk = vec![0u8; 1024 * 1024];
        for _ in 0..SIZE_MB {
            out.write_all(&chunk)?;
        }
        out.flush()?;
    }

    println!("\n2. Archiving...");
    let start = Instant::now();
    {
        let mut writer = ArchiveWriter::create(ARCHIVE)?;
        writer.add_file(BIG_FILE)?;
        writer.finish()?;
    }
    println!(
        "   ✓ {} → {} ({} KB) in {:?}",
        BIG_FILE,
        ARCHIVE,
        fs::metadata(ARCHIVE)?.len() / 1024,
        start.elapsed()
    );

    println!("\n3. Verifying...");
    let mut reader = ArchiveReader::open(ARCHIVE)?;
    let start = Instant::now();
    reader.extract_file(BIG_FILE, "big_test_out.dat")?;
    println!(
        "   ✓ Extracted {} MB in {:?}",
        fs::metadata("big_test_out.dat")?.len() / 1024 / 1024,
        start.elapsed()
    );

    fs::remove_file(BIG_FILE)?;
    fs::remove_file("big_test_out.dat")?;
    println!("\n✓ Example complete!");
    Ok(())
}
