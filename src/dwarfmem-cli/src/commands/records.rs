//! Creature, squad and name command handlers
//!
//! Decoders only check what the active layout describes (the race offset,
//! a name string) and print addresses.

use anyhow::{bail, Context, Result};
use dwarfmem::{MemoryDriver, ProcessInstance, VirtAddr, WordTable};
use std::fs;
use std::path::Path;

/// An element accepted by a decoder, with its name when the layout has one
struct Record {
    address: VirtAddr,
    name: Option<String>,
}

fn print_records(records: &[Record], what: &str) {
    for record in records {
        match &record.name {
            Some(name) => println!("{:#010x}  {}", record.address, name),
            None => println!("{:#010x}", record.address),
        }
    }
    println!("{} {}", records.len(), what);
}

/// Handle the Creatures command
pub fn creatures<D: MemoryDriver>(df: &mut ProcessInstance<D>) -> Result<()> {
    let (race, first_name) = match df.memory_layout() {
        Some(layout) => (layout.dwarf_offset("race"), layout.dwarf_offset("first_name")),
        None => bail!("No memory layout selected, cannot locate the creature vector"),
    };

    let dwarves = df.load_dwarves(|df, address| {
        if let Some(offset) = race {
            if df.read_word(address + offset) != df.dwarf_race_id() {
                return None;
            }
        }
        let name = first_name.map(|offset| df.read_string(address + offset));
        Some(Record { address, name })
    });

    if !df.is_ok() {
        bail!("No creatures found. Is a fortress loaded?");
    }
    print_records(&dwarves, "dwarves");
    Ok(())
}

/// Handle the Squads command
pub fn squads<D: MemoryDriver>(df: &mut ProcessInstance<D>) -> Result<()> {
    let name = match df.memory_layout() {
        Some(layout) => layout.squad_offset("name"),
        None => bail!("No memory layout selected, cannot locate the squad vector"),
    };

    let squads = df.load_squads(|df, address| {
        Some(Record {
            address,
            name: name.map(|offset| df.read_string(address + offset)),
        })
    });
    print_records(&squads, "squads");
    Ok(())
}

/// Handle the Name command
pub fn name<D: MemoryDriver>(df: &mut ProcessInstance<D>, address: VirtAddr, words: &Path) -> Result<()> {
    let contents = fs::read_to_string(words)
        .with_context(|| format!("Failed to read word table {}", words.display()))?;
    let table = WordTable::from_toml_str(&contents)
        .with_context(|| format!("Failed to parse word table {}", words.display()))?;
    tracing::debug!("loaded {} words", table.len());

    println!("{}", df.read_dwarf_name(address, &table));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwarfmem::driver::MockDriver;
    use dwarfmem::{LayoutRegistry, MemoryLayout};

    const LAYOUT: &str = r#"
[info]
checksum = "0xdeadbeef"
version_name = "v0.31.25 (test)"
complete = true

[addresses]
creature_vector = 0x1000
dwarf_race_index = 0x1100
squad_vector = 0x1200

[dwarf_offsets]
race = 0x8c
first_name = 0x0
"#;

    fn fortress() -> ProcessInstance<MockDriver> {
        let mut driver = MockDriver::new()
            .with_zeroed(0x1000, 0x300)
            .with_zeroed(0x3000, 0x10)
            .with_zeroed(0x4000, 0x200)
            .with_zeroed(0x5000, 0x100);
        driver.plant_u32(0x1000, 0x3000);
        driver.plant_u32(0x1004, 0x3008);
        driver.plant(0x1100, &7u16.to_le_bytes());
        driver.plant_u32(0x3000, 0x4000);
        driver.plant_u32(0x3004, 0x4100);
        driver.plant_u32(0x4000, 0x5000);
        driver.plant(0x4000 + 0x8c, &7u16.to_le_bytes());
        driver.plant(0x5000, b"Urist\0");

        let mut df = ProcessInstance::new(driver, LayoutRegistry::default());
        df.set_memory_layout(MemoryLayout::from_toml_str(LAYOUT, "test.toml").unwrap());
        df
    }

    #[test]
    fn test_creatures() {
        let mut df = fortress();
        assert!(creatures(&mut df).is_ok());
        assert_eq!(df.dwarf_race_id(), 7);
    }

    #[test]
    fn test_creatures_without_fortress() {
        let mut df = fortress();
        df.driver_mut().plant_u32(0x1004, 0x3000);
        assert!(creatures(&mut df).is_err());
    }

    #[test]
    fn test_squads_empty_vector() {
        let mut df = fortress();
        assert!(squads(&mut df).is_ok());
    }

    #[test]
    fn test_no_layout() {
        let mut df = ProcessInstance::new(MockDriver::new(), LayoutRegistry::default());
        assert!(creatures(&mut df).is_err());
        assert!(squads(&mut df).is_err());
    }

    #[test]
    fn test_name() {
        let dir = tempfile::tempdir().unwrap();
        let words = dir.path().join("words.toml");
        std::fs::write(&words, "[[word]]\nid = 1\nnoun = \"axe\"\n").unwrap();

        let mut df = fortress();
        df.driver_mut().plant(0x1200, &[0xff; 0x18]);
        df.driver_mut().plant_u32(0x1214, 1);
        assert!(name(&mut df, 0x1200, &words).is_ok());
        assert!(name(&mut df, 0x1200, &dir.path().join("missing.toml")).is_err());
    }
}
