//! Dispatch of commands that need a live connection

use crate::cli::Commands;
use crate::commands;
use anyhow::{bail, Result};
use dwarfmem::{MemoryDriver, ProcessInstance};

/// Run `command` against a connected instance
pub fn live<D: MemoryDriver>(df: &mut ProcessInstance<D>, command: Commands) -> Result<()> {
    match command {
        Commands::Info => commands::memory::info(df),
        Commands::Segments => commands::memory::segments(df),
        Commands::Read { address, size } => commands::memory::read(df, address, size),
        Commands::Write { address, bytes } => commands::memory::write(df, address, &bytes),
        Commands::Scan { pattern, range } => commands::scan::scan(df, &pattern, range),
        Commands::FindVectors {
            entries,
            fuzz,
            entry_size,
            op,
            range,
        } => commands::scan::find_vectors(df, entries, fuzz, entry_size, op, range),
        Commands::Creatures => commands::records::creatures(df),
        Commands::Squads => commands::records::squads(df),
        Commands::Name { address, words } => commands::records::name(df, address, &words),
        Commands::Configure { .. } | Commands::Layouts | Commands::AddLayout { .. } => {
            bail!("command does not use a live connection")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dwarfmem::driver::MockDriver;
    use dwarfmem::LayoutRegistry;

    #[test]
    fn test_live_dispatch() {
        let mut df = ProcessInstance::new(
            MockDriver::new().with_zeroed(0x1000, 0x40),
            LayoutRegistry::default(),
        );
        df.map_virtual_memory();

        assert!(live(&mut df, Commands::Segments).is_ok());
        assert!(live(&mut df, Commands::Read { address: 0x1000, size: 16 }).is_ok());
        assert!(live(
            &mut df,
            Commands::Write {
                address: 0x1000,
                bytes: "01 02".to_string()
            }
        )
        .is_ok());
        assert_eq!(df.read_byte(0x1001), 2);
        assert!(live(&mut df, Commands::Layouts).is_err());
    }
}
