//! Scan command handlers

use crate::cli::ScanRange;
use anyhow::{Context, Result};
use dwarfmem::{EntryMatch, MemoryDriver, Pattern, ProcessInstance, VirtAddr};

const SHOW_MAX: usize = 20;

fn print_hits(hits: &[VirtAddr], what: &str) {
    if hits.is_empty() {
        println!("No {} found.", what);
        return;
    }

    println!("Found {} {}:", hits.len(), what);
    for (i, addr) in hits.iter().take(SHOW_MAX).enumerate() {
        println!("  {}: {:#x}", i + 1, addr);
    }
    if hits.len() > SHOW_MAX {
        println!("  ... and {} more", hits.len() - SHOW_MAX);
    }
}

/// Handle the Scan command
pub fn scan<D: MemoryDriver>(df: &mut ProcessInstance<D>, pattern: &str, range: ScanRange) -> Result<()> {
    let pattern: Pattern = pattern.parse().context("Invalid scan pattern")?;

    println!("Scanning for pattern: {}", pattern);
    println!("This may take a while...");

    let hits = df.scan_for_pattern(&pattern, range.start, range.end);
    print_hits(&hits, "matches");
    Ok(())
}

/// Handle the FindVectors command
pub fn find_vectors<D: MemoryDriver>(
    df: &mut ProcessInstance<D>,
    entries: u64,
    fuzz: u64,
    entry_size: usize,
    op: Option<char>,
    range: ScanRange,
) -> Result<()> {
    let matcher = match op {
        Some(op) => EntryMatch::from_op(op, entries)
            .with_context(|| format!("Invalid comparison operator '{}'", op))?,
        None => EntryMatch::Fuzzy {
            target: entries,
            fuzz,
        },
    };

    println!("Scanning for vectors matching {:?}...", matcher);
    let whole_space = range.start == 0 && range.end == VirtAddr::MAX;
    let vectors = match matcher {
        EntryMatch::Fuzzy { .. } if whole_space => df.find_vectors(entries, fuzz, entry_size),
        _ => df.find_vectors_ext(matcher, range.start, range.end, entry_size),
    };

    print_hits(&vectors, "vectors");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwarfmem::driver::MockDriver;
    use dwarfmem::LayoutRegistry;

    const ALL: ScanRange = ScanRange {
        start: 0,
        end: VirtAddr::MAX,
    };

    fn mock_instance() -> ProcessInstance<MockDriver> {
        let mut driver = MockDriver::new()
            .with_zeroed(0x1000, 0x100)
            .with_zeroed(0x2000, 0x20);
        driver.plant_u32(0x1040, 0x2000);
        driver.plant_u32(0x1044, 0x2008);
        driver.plant_u32(0x2000, 0x2000);
        driver.plant_u32(0x2004, 0x2004);
        driver.plant(0x1080, b"dwarf");
        let mut df = ProcessInstance::new(driver, LayoutRegistry::default());
        df.map_virtual_memory();
        df
    }

    #[test]
    fn test_scan() {
        let mut df = mock_instance();
        assert!(scan(&mut df, "64 77 61 ?? 66", ALL).is_ok());
        assert!(scan(&mut df, "zz", ALL).is_err());
    }

    #[test]
    fn test_find_vectors() {
        let mut df = mock_instance();
        assert!(find_vectors(&mut df, 2, 0, 4, None, ALL).is_ok());
        assert!(find_vectors(&mut df, 1, 0, 4, Some('>'), ALL).is_ok());
        assert!(find_vectors(&mut df, 1, 0, 4, Some('!'), ALL).is_err());
    }

    #[test]
    fn test_print_hits_truncates() {
        let hits: Vec<VirtAddr> = (0..30).collect();
        print_hits(&hits, "matches");
        print_hits(&[], "matches");
    }
}
