//! Core CLI definitions

use clap::{Parser, Subcommand};
use dwarfmem::VirtAddr;
use std::path::PathBuf;

use super::scan::{parse_address, parse_op, ScanRange};

#[derive(Parser)]
#[command(name = "dwarfmem")]
#[command(about = "Inspect the memory of a running Dwarf Fortress", long_about = None)]
pub struct Cli {
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Connect even when no layout matches the running version
    #[arg(long, global = true)]
    pub force: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure default settings
    #[command(visible_alias = "c")]
    Configure {
        /// Add a directory to the layout search path
        #[arg(long)]
        layout_dir: Option<PathBuf>,

        /// Stay connected to versions without a layout
        #[arg(long)]
        connect_unknown: Option<bool>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },

    /// List every loaded memory layout
    Layouts,

    /// Install a layout file for a game version
    AddLayout {
        /// Version label, e.g. "v0.31.25 (linux)"
        version: String,

        /// Layout file to install
        file: PathBuf,
    },

    /// Connect and show process, version and address-space info
    #[command(visible_alias = "i")]
    Info,

    /// List mapped memory segments
    Segments,

    /// Hex dump memory
    #[command(visible_alias = "r")]
    Read {
        /// Address to read (hex with 0x prefix, or decimal)
        #[arg(value_parser = parse_address)]
        address: VirtAddr,

        /// Bytes to read
        #[arg(short, long, default_value = "256")]
        size: usize,
    },

    /// Write bytes to memory
    Write {
        /// Address to write (hex with 0x prefix, or decimal)
        #[arg(value_parser = parse_address)]
        address: VirtAddr,

        /// Hex bytes, e.g. "90 90" or "9090"
        bytes: String,
    },

    /// Scan memory for a byte pattern (?? matches any byte)
    #[command(visible_alias = "s")]
    Scan {
        /// Pattern, e.g. "44 46 ?? 00"
        pattern: String,

        #[command(flatten)]
        range: ScanRange,
    },

    /// Scan memory for vector headers with a given element count
    FindVectors {
        /// Target number of elements
        entries: u64,

        /// Accept counts within this distance of the target
        #[arg(long, default_value = "0", conflicts_with = "op")]
        fuzz: u64,

        /// Element size in bytes
        #[arg(long, default_value = "4")]
        entry_size: usize,

        /// Compare with =, < or > instead of fuzz
        #[arg(long, value_parser = parse_op)]
        op: Option<char>,

        #[command(flatten)]
        range: ScanRange,
    },

    /// Decode the creature vector and list dwarves
    Creatures,

    /// Decode the squad vector
    Squads,

    /// Decode the 7-word name stored at an address
    Name {
        /// Address of the first word id
        #[arg(value_parser = parse_address)]
        address: VirtAddr,

        /// TOML word table
        #[arg(long)]
        words: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_find_vectors_args() {
        let cli = Cli::parse_from([
            "dwarfmem", "find-vectors", "12", "--op", ">", "--start", "0x8000000", "-v",
        ]);
        match cli.command {
            Commands::FindVectors {
                entries, op, range, ..
            } => {
                assert_eq!(entries, 12);
                assert_eq!(op, Some('>'));
                assert_eq!(range.start, 0x8000000);
                assert_eq!(range.end, u64::MAX);
            }
            _ => panic!("expected find-vectors"),
        }
        assert_eq!(cli.verbose, 1);
    }

    #[test]
    fn test_global_force() {
        let cli = Cli::parse_from(["dwarfmem", "info", "--force"]);
        assert!(cli.force);
    }
}
