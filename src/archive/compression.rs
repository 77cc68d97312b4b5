use crate::archive::format::CompressionMethod;
use crate::error::{ArchiveError, Result};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};

/// Chunk size for streaming reads (64KB)
pub const STREAM_CHUNK_SIZE: usize = 65536;

/// Upper bound on memory reserved up front from a declared entry size (64MB)
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// Totals produced while streaming one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamStats {
    pub crc32: u32,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
}

/// Compress an in-memory buffer.
///
/// Falls back to `Store` when deflate does not make the data smaller, so
/// empty buffers are always stored.
pub fn compress(
    data: &[u8],
    method: CompressionMethod,
    level: u32,
) -> Result<(Vec<u8>, CompressionMethod)> {
    match method {
        CompressionMethod::Store => Ok((data.to_vec(), CompressionMethod::Store)),
        CompressionMethod::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(level));
            encoder.write_all(data)?;
            let compressed = encoder.finish()?;

            // Use compressed only if it's actually smaller
            if compressed.len() < data.len() {
                Ok((compressed, CompressionMethod::Deflate))
            } else {
                Ok((data.to_vec(), CompressionMethod::Store))
            }
        }
        CompressionMethod::Unsupported(value) => Err(ArchiveError::UnsupportedCompression(value)),
    }
}

/// Stream `source` into `dest` deflated, hashing the uncompressed bytes
pub fn deflate_stream<R: Read, W: Write>(source: R, dest: W, level: u32) -> Result<StreamStats> {
    let mut encoder = DeflateEncoder::new(CountingWriter::new(dest), Compression::new(level));
    let (crc32, uncompressed_size) = hash_copy(source, &mut encoder)?;
    let counter = encoder.finish()?;

    Ok(StreamStats {
        crc32,
        uncompressed_size,
        compressed_size: counter.count,
    })
}

/// Stream `source` into `dest` unchanged, hashing the bytes
pub fn store_stream<R: Read, W: Write>(source: R, mut dest: W) -> Result<StreamStats> {
    let (crc32, size) = hash_copy(source, &mut dest)?;
    Ok(StreamStats {
        crc32,
        uncompressed_size: size,
        compressed_size: size,
    })
}

/// Decode one entry's data into `dest` and return the CRC-32 of the output.
///
/// `source` must yield exactly the entry's compressed bytes. Output longer or
/// shorter than `expected_size` and undecodable deflate data are reported as
/// corruption.
pub fn decompress_stream<R: Read, W: Write>(
    source: R,
    method: CompressionMethod,
    expected_size: u64,
    dest: W,
) -> Result<u32> {
    // One byte of slack to detect output that overruns the declared size
    let limit = expected_size + 1;

    let (crc32, size) = match method.ensure_supported()? {
        CompressionMethod::Store => hash_copy(source.take(limit), dest),
        _ => hash_copy(DeflateDecoder::new(source).take(limit), dest),
    }
    .map_err(into_corruption)?;

    if size != expected_size {
        return Err(ArchiveError::CorruptArchive(format!(
            "Decompressed size mismatch: expected {}, got {}",
            expected_size, size
        )));
    }

    Ok(crc32)
}

/// Decode one entry fully into memory
pub fn decompress_to_vec<R: Read>(
    source: R,
    method: CompressionMethod,
    expected_size: u64,
) -> Result<(Vec<u8>, u32)> {
    let mut output = Vec::with_capacity(expected_size.min(MAX_PREALLOCATION) as usize);
    let crc32 = decompress_stream(source, method, expected_size, &mut output)?;
    Ok((output, crc32))
}

/// Copy everything from `source` to `dest`, returning (crc32, byte count)
fn hash_copy<R: Read, W: Write>(mut source: R, mut dest: W) -> Result<(u32, u64)> {
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buf[..n]);
        dest.write_all(&buf[..n])?;
        total += n as u64;
    }

    Ok((hasher.finalize(), total))
}

/// Inflate failures and short reads mean the stored bytes are damaged
fn into_corruption(err: ArchiveError) -> ArchiveError {
    match err {
        ArchiveError::Io(e)
            if matches!(
                e.kind(),
                io::ErrorKind::InvalidInput
                    | io::ErrorKind::InvalidData
                    | io::ErrorKind::UnexpectedEof
            ) =>
        {
            ArchiveError::CorruptArchive(format!("Decompression failed: {}", e))
        }
        other => other,
    }
}

/// Writer adapter that counts bytes passed through
struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
