#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};
use zip_compress::ArchiveReader;

fuzz_target!(|data: &[u8]| {
    // Smaller than an end record: nothing to parse
    if data.len() < 22 {
        return;
    }

    let mut temp_file = match NamedTempFile::new() {
        Ok(f) => f,
        Err(_) => return,
    };
    if temp_file.write_all(data).is_err() || temp_file.flush().is_err() {
        return;
    }

    // Open parses the whole central directory - should never panic
    let mut reader = match ArchiveReader::open(temp_file.path()) {
        Ok(r) => r,
        Err(_) => return, // Expected for invalid data
    };

    let _ = reader.file_list();
    let names: Vec<String> = reader.entries().iter().map(|e| e.name.clone()).collect();

    // Extraction of every entry - should never panic
    for name in &names {
        let _ = reader.extract_file_to_memory(name);
        let _ = reader.get_entry(name).map(|e| e.modified_time());
    }

    // Hostile names must never escape the output folder
    if let Ok(out) = TempDir::new() {
        let _ = reader.extract_all(out.path());
    }

    let _ = reader.contains("");
    let _ = reader.contains("../../../etc/passwd");
});
