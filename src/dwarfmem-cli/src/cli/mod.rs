//! CLI argument definitions for dwarfmem
//!
//! This module contains all clap-derived structs and enums for CLI parsing.

mod core;
mod scan;

pub use core::{Cli, Commands};
pub use scan::ScanRange;
