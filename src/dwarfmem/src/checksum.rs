//! Executable checksums used as layout keys
//!
//! ELF binaries don't carry a linker timestamp, so the executable is hashed
//! with MD5 and the first 32 bits kept. It is a lookup key only.

use md5::{Digest, Md5};
use std::path::Path;

/// First 32 bits of the MD5 digest of `data`
pub fn checksum_bytes(data: &[u8]) -> u32 {
    let digest = Md5::digest(data);
    tracing::trace!("GOT MD5: {}", hex::encode(digest));
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// Checksum of the file at `path`
pub fn checksum_file(path: &Path) -> std::io::Result<u32> {
    let data = std::fs::read(path)?;
    Ok(checksum_bytes(&data))
}

/// Display form used as the layout key: `0x` plus 8 lower-case hex digits
pub fn hexify(checksum: u32) -> String {
    format!("{:#010x}", checksum)
}
