//! Raw memory access command handlers
//!
//! Handlers for process info, segment listing, reading and writing.

use anyhow::{bail, Context, Result};
use dwarfmem::checksum::hexify;
use dwarfmem::{MemoryDriver, ProcessInstance, VirtAddr};

/// Parse hex bytes, space separated or packed
pub fn parse_hex_bytes(bytes: &str) -> Result<Vec<u8>> {
    let compact: String = bytes.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() || compact.len() % 2 != 0 {
        bail!("Expected an even number of hex digits, got '{}'", bytes);
    }

    (0..compact.len())
        .step_by(2)
        .map(|i| {
            let Some(part) = compact.get(i..i + 2) else {
                bail!("Invalid hex digits in '{}'", bytes);
            };
            u8::from_str_radix(part, 16).with_context(|| format!("Invalid hex byte: {}", part))
        })
        .collect()
}

/// Handle the Info command
pub fn info<D: MemoryDriver>(df: &mut ProcessInstance<D>) -> Result<()> {
    let checksum = df.driver().calculate_checksum().map(hexify).ok();

    println!("PID:            {}", df.pid().map(|p| p.to_string()).unwrap_or_default());
    println!("Checksum:       {}", checksum.as_deref().unwrap_or("unknown"));
    match df.memory_layout() {
        Some(layout) => {
            println!("Version:        {}", layout.game_version());
            println!("Layout:         {}", layout.filename().display());
            println!("Complete:       {}", layout.is_complete());
        }
        None => println!("Version:        unknown (no layout)"),
    }
    println!("Base address:   {:#010x}", df.base_address());
    println!("Correction:     {:#x}", df.memory_correction());
    println!("Lowest:         {:#010x}", df.lowest_address());
    println!("Highest:        {:#010x}", df.highest_address());
    println!("Heap start:     {:#010x}", df.heap_start_address());
    println!("Segments:       {}", df.segments().len());
    if let Some(dir) = df.df_dir() {
        println!("Game directory: {}", dir.display());
    }
    println!("Healthy:        {}", df.is_ok());

    Ok(())
}

/// Handle the Segments command
pub fn segments<D: MemoryDriver>(df: &ProcessInstance<D>) -> Result<()> {
    let mut total = 0u64;
    for seg in df.segments() {
        println!("{}", seg);
        total += seg.size();
    }
    println!("{} segments, {} MB", df.segments().len(), total / (1024 * 1024));
    Ok(())
}

/// Handle the Read command
pub fn read<D: MemoryDriver>(df: &mut ProcessInstance<D>, address: VirtAddr, size: usize) -> Result<()> {
    let (read, data) = df.read_raw(address, size);
    if read == 0 {
        bail!("Could not read memory at {:#x}", address);
    }
    if read < size {
        tracing::warn!("only {} of {} bytes readable at {:#x}", read, size, address);
    }

    print!("{}", dwarfmem::hexdump::pprint(&data[..read], address));
    Ok(())
}

/// Handle the Write command
pub fn write<D: MemoryDriver>(df: &mut ProcessInstance<D>, address: VirtAddr, bytes: &str) -> Result<()> {
    let data = parse_hex_bytes(bytes)?;

    let original = df.get_data(address, data.len());
    if original.is_empty() {
        bail!("Address {:#x} is not readable", address);
    }
    println!("Original: {}", format_bytes(&original));
    println!("New:      {}", format_bytes(&data));

    let written = df.write_raw(address, &data);
    if written < data.len() {
        bail!("Only wrote {} of {} bytes at {:#x}", written, data.len(), address);
    }

    println!("Write successful!");
    Ok(())
}

fn format_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwarfmem::driver::MockDriver;
    use dwarfmem::LayoutRegistry;

    fn mock_instance() -> ProcessInstance<MockDriver> {
        let mut driver = MockDriver::new().with_zeroed(0x1000, 0x100);
        driver.plant(0x1000, b"Urist McMiner");
        let mut df = ProcessInstance::new(driver, LayoutRegistry::default());
        df.map_virtual_memory();
        df
    }

    #[test]
    fn test_parse_hex_bytes() {
        assert_eq!(parse_hex_bytes("48 8B 05").unwrap(), vec![0x48, 0x8B, 0x05]);
        assert_eq!(parse_hex_bytes("488b05").unwrap(), vec![0x48, 0x8B, 0x05]);
        assert_eq!(parse_hex_bytes("90").unwrap(), vec![0x90]);
    }

    #[test]
    fn test_parse_hex_bytes_invalid() {
        assert!(parse_hex_bytes("GG").is_err());
        assert!(parse_hex_bytes("48 GG 05").is_err());
        assert!(parse_hex_bytes("488").is_err());
        assert!(parse_hex_bytes("").is_err());
    }

    #[test]
    fn test_parse_hex_bytes_non_ascii() {
        assert!(parse_hex_bytes("aéb").is_err());
        assert!(parse_hex_bytes("éé").is_err());
        assert!(parse_hex_bytes("48 é5").is_err());
    }

    #[test]
    fn test_read() {
        let mut df = mock_instance();
        assert!(read(&mut df, 0x1000, 32).is_ok());
        assert!(read(&mut df, 0x1080, 0x100).is_ok());
        assert!(read(&mut df, 0x9000, 16).is_err());
    }

    #[test]
    fn test_write() {
        let mut df = mock_instance();
        write(&mut df, 0x1004, "78 56 34 12").unwrap();
        assert_eq!(df.read_int(0x1004), 0x12345678);
        assert!(write(&mut df, 0x9000, "00").is_err());
    }

    #[test]
    fn test_info_and_segments() {
        let mut df = mock_instance();
        assert!(info(&mut df).is_ok());
        assert!(segments(&df).is_ok());
    }
}
