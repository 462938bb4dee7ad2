//! In-memory driver for tests

use super::MemoryDriver;
use crate::error::DriverError;
use crate::segment::{MemoryMap, MemorySegment};
use crate::VirtAddr;
use std::path::PathBuf;

struct MockRegion {
    start: VirtAddr,
    data: Vec<u8>,
    perms: &'static str,
}

impl MockRegion {
    fn end(&self) -> VirtAddr {
        self.start + self.data.len() as VirtAddr
    }
}

/// A fake process made of synthetic regions
pub struct MockDriver {
    regions: Vec<MockRegion>,
    pub pid: Option<u32>,
    pub checksum: u32,
    pub word_size: usize,
    /// Number of OS-level stops and resumes performed
    pub stops: usize,
    pub resumes: usize,
    pub fail_stop: bool,
    /// Pokes succeed this many times, then fail
    pub pokes_allowed: Option<usize>,
    /// Number of reads served
    pub reads: usize,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            regions: Vec::new(),
            pid: Some(4242),
            checksum: 0xdeadbeef,
            word_size: 8,
            stops: 0,
            resumes: 0,
            fail_stop: false,
            pokes_allowed: None,
            reads: 0,
        }
    }

    /// Add a readable, writable region
    pub fn with_region(mut self, start: VirtAddr, data: Vec<u8>) -> Self {
        self.regions.push(MockRegion {
            start,
            data,
            perms: "rw-p",
        });
        self
    }

    /// Add a zero-filled region of `size` bytes
    pub fn with_zeroed(self, start: VirtAddr, size: usize) -> Self {
        self.with_region(start, vec![0u8; size])
    }

    /// Overwrite bytes directly, bypassing the driver primitives
    pub fn plant(&mut self, address: VirtAddr, bytes: &[u8]) {
        let region = self
            .regions
            .iter_mut()
            .find(|r| address >= r.start && address + bytes.len() as VirtAddr <= r.end())
            .expect("plant outside of any region");
        let offset = (address - region.start) as usize;
        region.data[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    /// Plant a little-endian u32
    pub fn plant_u32(&mut self, address: VirtAddr, value: u32) {
        self.plant(address, &value.to_le_bytes());
    }

    pub fn peek(&self, address: VirtAddr, len: usize) -> Vec<u8> {
        let region = self
            .regions
            .iter()
            .find(|r| address >= r.start && address < r.end())
            .expect("peek outside of any region");
        let offset = (address - region.start) as usize;
        region.data[offset..offset + len].to_vec()
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDriver for MockDriver {
    const VECTOR_POINTER_OFFSET: VirtAddr = 0;
    const STRING_BUFFER_OFFSET: VirtAddr = 0;
    const BASE_ADDRESS_OFFSET: VirtAddr = 0x18;

    fn word_size(&self) -> usize {
        self.word_size
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn locate(&mut self) -> Result<u32, DriverError> {
        self.pid.ok_or(DriverError::ProcessNotFound)
    }

    fn stop(&mut self) -> Result<(), DriverError> {
        if self.fail_stop {
            return Err(DriverError::AttachFailed {
                pid: self.pid.unwrap_or(0),
                reason: "mock".to_string(),
            });
        }
        self.stops += 1;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), DriverError> {
        self.resumes += 1;
        Ok(())
    }

    fn read_chunk(&mut self, address: VirtAddr, buf: &mut [u8]) -> usize {
        self.reads += 1;
        let Some(region) = self
            .regions
            .iter()
            .find(|r| address >= r.start && address < r.end())
        else {
            return 0;
        };
        let offset = (address - region.start) as usize;
        let n = buf.len().min(region.data.len() - offset);
        buf[..n].copy_from_slice(&region.data[offset..offset + n]);
        n
    }

    fn poke_word(&mut self, address: VirtAddr, word: &[u8]) -> Result<(), DriverError> {
        if let Some(allowed) = self.pokes_allowed.as_mut() {
            if *allowed == 0 {
                return Err(DriverError::WriteFailed {
                    address,
                    reason: "mock".to_string(),
                });
            }
            *allowed -= 1;
        }
        let len = self.word_size as VirtAddr;
        let Some(region) = self
            .regions
            .iter_mut()
            .find(|r| address >= r.start && address + len <= r.end())
        else {
            return Err(DriverError::WriteFailed {
                address,
                reason: "unmapped".to_string(),
            });
        };
        let offset = (address - region.start) as usize;
        region.data[offset..offset + self.word_size].copy_from_slice(&word[..self.word_size]);
        Ok(())
    }

    fn memory_map(&mut self) -> Result<MemoryMap, DriverError> {
        Ok(MemoryMap::from_segments(
            self.regions
                .iter()
                .map(|r| MemorySegment::new("", r.start, r.end(), r.perms))
                .collect(),
        ))
    }

    fn executable_path(&self) -> Result<PathBuf, DriverError> {
        Ok(PathBuf::from("/mock/Dwarf_Fortress"))
    }

    fn calculate_checksum(&self) -> Result<u32, DriverError> {
        Ok(self.checksum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_read_chunk_stops_at_region_end() {
        let mut driver = MockDriver::new().with_region(0x1000, vec![1, 2, 3, 4]);
        let mut buf = [0u8; 8];
        assert_eq!(driver.read_chunk(0x1002, &mut buf), 2);
        assert_eq!(&buf[..2], &[3, 4]);
        assert_eq!(driver.read_chunk(0x5000, &mut buf), 0);
    }

    #[test]
    fn test_mock_poke_outside_region_fails() {
        let mut driver = MockDriver::new().with_zeroed(0x1000, 8);
        assert!(driver.poke_word(0x1000, &[1; 8]).is_ok());
        assert!(driver.poke_word(0x1004, &[1; 8]).is_err());
    }

    #[test]
    fn test_mock_memory_map() {
        let mut driver = MockDriver::new()
            .with_zeroed(0x1000, 0x100)
            .with_zeroed(0x3000, 0x100);
        let map = driver.memory_map().unwrap();
        assert_eq!(map.segments.len(), 2);
        assert_eq!(map.lowest_address, 0x1000);
        assert_eq!(map.highest_address, 0x3100);
    }
}
