//! Raw access drivers
//!
//! A driver wraps the OS primitives needed to inspect a foreign process:
//! finding it, stopping/resuming it, chunked reads, word-sized pokes, region
//! enumeration and locating its executable. Reference counting, chunking
//! loops and decoding live in [`ProcessInstance`](crate::ProcessInstance),
//! so a driver only has to expose single primitive operations.
//!
//! The driver for the build target is selected at compile time as
//! [`NativeDriver`].

#[cfg(target_os = "linux")]
mod linux;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

#[cfg(target_os = "linux")]
pub use linux::LinuxDriver;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockDriver;

/// Driver for the platform this crate was built for
#[cfg(target_os = "linux")]
pub type NativeDriver = LinuxDriver;

use crate::error::DriverError;
use crate::segment::MemoryMap;
use crate::VirtAddr;
use std::path::PathBuf;

/// OS-level access to a foreign process
pub trait MemoryDriver {
    /// Bytes between a vector's address and its `{start, end}` pair.
    /// 0 for glibc++ (`START|END|END_ALLOCATOR`), 4 for MSVC
    /// (`ALLOCATOR|START|END|END_ALLOCATOR`).
    const VECTOR_POINTER_OFFSET: VirtAddr;

    /// Bytes between a string's address and its buffer pointer
    const STRING_BUFFER_OFFSET: VirtAddr;

    /// Offset from the lowest mapped address to the process base address
    const BASE_ADDRESS_OFFSET: VirtAddr;

    /// Width of a pointer in the target, in bytes
    fn pointer_size(&self) -> usize {
        4
    }

    /// Width of one poke, in bytes
    fn word_size(&self) -> usize;

    /// Currently selected process, if any
    fn pid(&self) -> Option<u32>;

    /// Find a running copy of the game and select it
    fn locate(&mut self) -> Result<u32, DriverError>;

    /// Stop the target and block until it is confirmed stopped
    fn stop(&mut self) -> Result<(), DriverError>;

    /// Let the target run again
    fn resume(&mut self) -> Result<(), DriverError>;

    /// Read up to `buf.len()` bytes at `address` in one primitive call.
    /// Returns how many bytes were obtained; 0 on any failure.
    fn read_chunk(&mut self, address: VirtAddr, buf: &mut [u8]) -> usize;

    /// Write exactly [`word_size`](Self::word_size) bytes at `address`
    fn poke_word(&mut self, address: VirtAddr, word: &[u8]) -> Result<(), DriverError>;

    /// Enumerate the target's mapped regions
    fn memory_map(&mut self) -> Result<MemoryMap, DriverError>;

    /// Path of the target's executable image
    fn executable_path(&self) -> Result<PathBuf, DriverError>;

    /// Working directory of the target, if known
    fn working_dir(&self) -> Option<PathBuf> {
        None
    }

    /// Checksum of the executable image, the layout lookup key
    fn calculate_checksum(&self) -> Result<u32, DriverError> {
        let path = self.executable_path()?;
        crate::checksum::checksum_file(&path).map_err(|source| DriverError::Proc { path, source })
    }
}
