//! Streamed CRC32 over file contents.
//!
//! Folds the file in fixed-size chunks into a running [`crc32fast::Hasher`]
//! the same way the teacher's `ChecksumReader`/`ChecksumWriter` fold chunk
//! bytes while reading/writing a data blob, so no file is ever buffered
//! whole in memory.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::Result;

const CHUNK_SIZE: usize = 64 * 1024;

/// Compute the CRC32 of a file's contents, returned as an uppercase hex
/// string with no leading zeros trimmed beyond its natural width.
pub fn crc32(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = [0u8; CHUNK_SIZE];

    loop {
        let count = file.read(&mut buf)?;
        if count == 0 {
            break;
        }
        hasher.update(&buf[..count]);
    }

    Ok(format!("{:08X}", hasher.finalize()))
}
