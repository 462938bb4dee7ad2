//! Hex dump rendering

use crate::VirtAddr;

const HEADER: &str = "    ADDR   | 00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F | TEXT\n\
------------------------------------------------------------------------\n";

/// Render `bytes` as 16-byte lines labelled from `start`.
///
/// NUL bytes show as `.`, printable ASCII as itself, anything else as its
/// two hex digits.
pub fn pprint(bytes: &[u8], start: VirtAddr) -> String {
    let mut out = String::from(HEADER);

    for (i, line) in bytes.chunks(16).enumerate() {
        out.push_str(&format!("{:#010x} | ", start + (i * 16) as VirtAddr));
        for c in 0..16 {
            match line.get(c) {
                Some(b) => out.push_str(&format!("{:02x} ", b)),
                None => out.push_str("   "),
            }
        }
        out.push_str("| ");
        for &b in line {
            match b {
                0 => out.push('.'),
                32..=126 => out.push(b as char),
                _ => out.push_str(&format!("{:02x}", b)),
            }
        }
        out.push('\n');
    }

    out
}
