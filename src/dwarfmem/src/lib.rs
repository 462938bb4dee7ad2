//! # dwarfmem
//!
//! Live memory inspection of a running Dwarf Fortress process.
//!
//! This library provides functionality to:
//! - Find the game, stop/resume it and read or write its memory
//! - Identify the build by executable checksum and select a memory layout
//! - Decode scalars, strings and `std::vector`s out of the target
//! - Scan memory for byte patterns and vector-shaped headers
//! - Reconstruct the creature and squad lists through caller decoders
//!
//! ## Example
//!
//! ```no_run
//! use dwarfmem::{default_search_paths, LayoutRegistry, NativeDriver, ProcessInstance};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let layouts = LayoutRegistry::discover(&default_search_paths())?;
//! let mut df = ProcessInstance::new(NativeDriver::new(), layouts);
//! df.find_running_copy(false)?;
//!
//! let creatures = df.load_dwarves(|_, addr| Some(addr));
//! println!("{} dwarves", creatures.len());
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod cp437;
pub mod driver;
pub mod error;
pub mod hexdump;
pub mod instance;
pub mod layout;
pub mod name;
pub mod options;
pub mod pattern;
pub mod progress;
mod schedule;
pub mod segment;

/// An address in the target process
pub type VirtAddr = u64;

#[doc(inline)]
pub use driver::MemoryDriver;
#[cfg(target_os = "linux")]
#[doc(inline)]
pub use driver::{LinuxDriver, NativeDriver};
#[doc(inline)]
pub use error::{DriverError, Error, LayoutError, Result};
#[doc(inline)]
pub use instance::{EntryMatch, ProcessInstance};
#[doc(inline)]
pub use layout::{default_search_paths, LayoutRegistry, MemoryLayout, UNSUPPORTED};
#[doc(inline)]
pub use name::{Word, WordLookup, WordTable};
#[doc(inline)]
pub use options::EngineOptions;
#[doc(inline)]
pub use pattern::Pattern;
#[doc(inline)]
pub use progress::{CancelToken, NullProgress, ProgressEvent, ProgressSink};
#[doc(inline)]
pub use segment::{MemoryMap, MemorySegment};
