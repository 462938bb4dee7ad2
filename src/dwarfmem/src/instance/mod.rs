//! The process instance: one connection to a running game
//!
//! A [`ProcessInstance`] owns the driver, the segment list, the layout
//! registry and the connection health. It is created on connect and dropped
//! on disconnect; nothing about a connection lives in globals.
//!
//! Every operation touching memory attaches on entry and detaches on exit.
//! Attachment is reference counted so nested operations share one OS-level
//! stop of the target.

mod reconstruct;
mod scan;

pub use scan::EntryMatch;

use crate::checksum::hexify;
use crate::driver::MemoryDriver;
use crate::error::{DriverError, Error, Result};
use crate::layout::{LayoutRegistry, MemoryLayout};
use crate::options::EngineOptions;
use crate::progress::{CancelToken, NullProgress, ProgressEvent, ProgressSink};
use crate::schedule::Interval;
use crate::segment::{MemoryMap, MemorySegment};
use crate::VirtAddr;

use byteorder::{ByteOrder, LE};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Read granularity of [`ProcessInstance::read_raw`]
pub const PAGE_SIZE: usize = 0x1000;

/// Upper bound for [`ProcessInstance::read_string`]
pub const MAX_STRING_LEN: usize = 256;

/// A connection to one foreign process
pub struct ProcessInstance<D: MemoryDriver> {
    driver: D,
    options: EngineOptions,
    layouts: LayoutRegistry,
    active_layout: Option<String>,
    map: MemoryMap,
    attach_count: u32,
    base_address: VirtAddr,
    memory_correction: i64,
    dwarf_race_id: u16,
    df_dir: Option<PathBuf>,
    is_ok: bool,
    cancel: CancelToken,
    progress: Box<dyn ProgressSink>,
    remap_timer: Interval,
    heartbeat_timer: Interval,
}

impl<D: MemoryDriver> ProcessInstance<D> {
    pub fn new(driver: D, layouts: LayoutRegistry) -> Self {
        Self::with_options(driver, layouts, EngineOptions::default())
    }

    pub fn with_options(driver: D, layouts: LayoutRegistry, options: EngineOptions) -> Self {
        let remap_timer = Interval::new(options.remap_interval());
        let heartbeat_timer = Interval::new(options.heartbeat_interval());
        Self {
            driver,
            options,
            layouts,
            active_layout: None,
            map: MemoryMap::default(),
            attach_count: 0,
            base_address: 0,
            memory_correction: 0,
            dwarf_race_id: 0,
            df_dir: None,
            is_ok: true,
            cancel: CancelToken::new(),
            progress: Box::new(NullProgress),
            remap_timer,
            heartbeat_timer,
        }
    }

    /// Route progress events to `sink`
    pub fn set_progress(&mut self, sink: impl ProgressSink + 'static) {
        self.progress = Box::new(sink);
    }

    pub(crate) fn emit(&self, event: ProgressEvent) {
        self.progress.emit(event);
    }

    /// Token that stops the running scan at its next loop boundary
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel_scan(&self) {
        self.cancel.cancel();
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn pid(&self) -> Option<u32> {
        self.driver.pid()
    }

    pub fn is_ok(&self) -> bool {
        self.is_ok
    }

    pub fn base_address(&self) -> VirtAddr {
        self.base_address
    }

    pub fn memory_correction(&self) -> i64 {
        self.memory_correction
    }

    pub fn heap_start_address(&self) -> VirtAddr {
        self.map.heap_start_address
    }

    pub fn lowest_address(&self) -> VirtAddr {
        self.map.lowest_address
    }

    pub fn highest_address(&self) -> VirtAddr {
        self.map.highest_address
    }

    pub fn dwarf_race_id(&self) -> u16 {
        self.dwarf_race_id
    }

    pub fn df_dir(&self) -> Option<&Path> {
        self.df_dir.as_deref()
    }

    pub fn segments(&self) -> &[MemorySegment] {
        &self.map.segments
    }

    pub fn layouts(&self) -> &LayoutRegistry {
        &self.layouts
    }

    // ---------------------------------------------------------------------
    // Attach / detach
    // ---------------------------------------------------------------------

    pub fn is_attached(&self) -> bool {
        self.attach_count > 0
    }

    pub fn attach_count(&self) -> u32 {
        self.attach_count
    }

    /// Take one attach reference, stopping the target on the first one.
    /// Returns false if the OS refused.
    pub fn attach(&mut self) -> bool {
        tracing::trace!("STARTING ATTACH {}", self.attach_count);
        if self.is_attached() {
            self.attach_count += 1;
            tracing::trace!("ALREADY ATTACHED SKIPPING... {}", self.attach_count);
            return true;
        }

        match self.driver.stop() {
            Ok(()) => {
                self.attach_count = 1;
                tracing::trace!("FINISHED ATTACH {}", self.attach_count);
                true
            }
            Err(DriverError::WaitFailed { pid, reason }) => {
                // Nothing sane is left to do with a half-attached tracee
                tracing::error!("PID {} died while attaching: {}", pid, reason);
                std::process::abort();
            }
            Err(e) => {
                tracing::error!("{}", e);
                false
            }
        }
    }

    /// Release one attach reference, resuming the target on the last one.
    /// Returns false when nothing was attached or the OS refused.
    pub fn detach(&mut self) -> bool {
        tracing::trace!("STARTING DETACH {}", self.attach_count);
        if self.attach_count == 0 {
            tracing::warn!("detach called while not attached");
            return false;
        }

        self.attach_count -= 1;
        if self.attach_count > 0 {
            tracing::trace!("NO NEED TO DETACH SKIPPING... {}", self.attach_count);
            return true;
        }

        match self.driver.resume() {
            Ok(()) => {
                tracing::trace!("FINISHED DETACH");
                true
            }
            Err(e) => {
                tracing::error!("{}", e);
                false
            }
        }
    }

    /// Run `f` while holding one attach reference
    pub fn with_attached<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> Option<R> {
        if !self.attach() {
            return None;
        }
        let result = f(self);
        self.detach();
        Some(result)
    }

    // ---------------------------------------------------------------------
    // Raw access
    // ---------------------------------------------------------------------

    /// Read `length` bytes at `address` in page-sized chunks.
    ///
    /// The buffer is always `length` bytes, zero-filled past what was
    /// obtained. The count stops at the first short chunk, so the valid data
    /// is always a prefix.
    pub fn read_raw(&mut self, address: VirtAddr, length: usize) -> (usize, Vec<u8>) {
        let mut buffer = vec![0u8; length];
        let read = self.read_raw_into(address, &mut buffer);
        (read, buffer)
    }

    /// [`read_raw`](Self::read_raw) into a caller buffer, which is zeroed first
    pub fn read_raw_into(&mut self, address: VirtAddr, buffer: &mut [u8]) -> usize {
        buffer.fill(0);
        if buffer.is_empty() || !self.attach() {
            return 0;
        }

        let mut read = 0;
        while read < buffer.len() {
            let step = PAGE_SIZE.min(buffer.len() - read);
            let got = self
                .driver
                .read_chunk(address + read as VirtAddr, &mut buffer[read..read + step]);
            read += got;
            if got < step {
                break;
            }
        }

        self.detach();
        read
    }

    /// Write `bytes` at `address` one native word at a time.
    ///
    /// The covering words are read first and the new bytes overlaid, so
    /// bytes past the end of `bytes` keep their old values. Stops at the
    /// first failed word and returns how many bytes were written.
    pub fn write_raw(&mut self, address: VirtAddr, bytes: &[u8]) -> usize {
        if bytes.is_empty() || !self.attach() {
            return 0;
        }

        let word = self.driver.word_size();
        let steps = bytes.len().div_ceil(word);
        tracing::debug!(
            "WRITE_RAW: WILL WRITE {} bytes over {} steps, with stepsize {}",
            bytes.len(),
            steps,
            word
        );

        let (_, mut existing) = self.read_raw(address, steps * word);
        existing[..bytes.len()].copy_from_slice(bytes);

        let mut written = 0;
        for chunk in existing.chunks_exact(word) {
            let target = address + written as VirtAddr;
            if let Err(e) = self.driver.poke_word(target, chunk) {
                tracing::warn!("{}", e);
                break;
            }
            written += word;
        }

        self.detach();
        written.min(bytes.len())
    }

    pub fn write_int(&mut self, address: VirtAddr, value: i32) -> usize {
        self.write_raw(address, &value.to_le_bytes())
    }

    /// `size` bytes at `address`, or an empty buffer if the read came up short
    pub fn get_data(&mut self, address: VirtAddr, size: usize) -> Vec<u8> {
        let (read, mut data) = self.read_raw(address, size);
        if read != size {
            data.clear();
        }
        data
    }

    /// Hex dump of `size` bytes at `address`
    pub fn pprint(&mut self, address: VirtAddr, size: usize) -> String {
        let data = self.get_data(address, size);
        crate::hexdump::pprint(&data, address)
    }

    // ---------------------------------------------------------------------
    // Scalar decoding (little-endian, no address validation)
    // ---------------------------------------------------------------------

    pub fn read_byte(&mut self, address: VirtAddr) -> u8 {
        self.read_raw(address, 1).1[0]
    }

    pub fn read_word(&mut self, address: VirtAddr) -> u16 {
        LE::read_u16(&self.read_raw(address, 2).1)
    }

    pub fn read_short(&mut self, address: VirtAddr) -> i16 {
        LE::read_i16(&self.read_raw(address, 2).1)
    }

    pub fn read_int(&mut self, address: VirtAddr) -> i32 {
        LE::read_i32(&self.read_raw(address, 4).1)
    }

    /// Read one target pointer
    pub fn read_addr(&mut self, address: VirtAddr) -> VirtAddr {
        let size = self.driver.pointer_size();
        decode_addr(&self.read_raw(address, size).1)
    }

    /// Read a game string: follow the buffer pointer and decode up to the
    /// first NUL as code page 437
    pub fn read_string(&mut self, address: VirtAddr) -> String {
        let buffer_addr = self.read_addr(address + D::STRING_BUFFER_OFFSET);
        let (read, data) = self.read_raw(buffer_addr, MAX_STRING_LEN);
        crate::cp437::decode(&data[..read])
    }

    // ---------------------------------------------------------------------
    // Segments
    // ---------------------------------------------------------------------

    /// True iff some current segment has `start <= address < end`
    pub fn is_valid_address(&self, address: VirtAddr) -> bool {
        self.map.segments.iter().any(|s| s.contains(address))
    }

    /// Replace the segment list with a fresh snapshot of the target
    pub fn map_virtual_memory(&mut self) {
        self.map = MemoryMap::default();
        if !self.is_ok {
            return;
        }

        match self.driver.memory_map() {
            Ok(map) => {
                tracing::trace!(
                    "mapped {} segments ({:#x}-{:#x}, heap at {:#x})",
                    map.segments.len(),
                    map.lowest_address,
                    map.highest_address,
                    map.heap_start_address
                );
                self.map = map;
            }
            Err(e) => tracing::error!("{}", e),
        }
        self.remap_timer.restart();
    }

    // ---------------------------------------------------------------------
    // Vectors
    // ---------------------------------------------------------------------

    /// Decode the vector at `address` into its element pointers.
    ///
    /// With a complete layout, a short read yields nothing and elements
    /// outside every segment are dropped. With an incomplete (or no) layout
    /// everything read is returned verbatim for exploration.
    pub fn enumerate_vector(&mut self, address: VirtAddr) -> Vec<VirtAddr> {
        let mut addrs = Vec::new();
        if address == 0 || !self.attach() {
            return addrs;
        }

        let ptr = self.driver.pointer_size() as VirtAddr;
        let start = self.read_addr(address + D::VECTOR_POINTER_OFFSET);
        let end = self.read_addr(address + D::VECTOR_POINTER_OFFSET + ptr);

        if end < start {
            tracing::trace!("vector at {:#x} has end {:#x} < start {:#x}", address, end, start);
            self.detach();
            return addrs;
        }

        let bytes = end - start;
        let entries = bytes / ptr;
        tracing::trace!(
            "enumerating vector at {:#x} START {:#x} END {:#x} UNVERIFIED ENTRIES {}",
            address,
            start,
            end,
            entries
        );

        if entries > self.options.vector_warn_entries {
            tracing::warn!(
                "vector at {:#x} has over {} entries! ({})",
                address,
                self.options.vector_warn_entries,
                entries
            );
        }
        if bytes > self.options.max_vector_bytes {
            tracing::warn!("vector at {:#x} spans {} bytes, not reading it", address, bytes);
            self.detach();
            return addrs;
        }

        let complete = self.layout_is_complete();
        let (read, data) = self.read_raw(start, bytes as usize);
        if read != bytes as usize && complete {
            tracing::warn!("Tried to read {} bytes but only got {}", bytes, read);
            self.detach();
            return addrs;
        }

        for chunk in data.chunks_exact(ptr as usize) {
            let entry = decode_addr(chunk);
            if !complete || self.is_valid_address(entry) {
                addrs.push(entry);
            }
        }

        self.detach();
        addrs
    }

    /// Cheap structural probe for a vector header at `address + 4`
    pub fn looks_like_vector_of_pointers(&mut self, address: VirtAddr) -> bool {
        let start = self.read_int(address + 0x4);
        let end = self.read_int(address + 0x8);
        let entries = (end as i64 - start as i64) / 4;
        tracing::debug!("LOOKS LIKE VECTOR? unverified entries: {}", entries);

        start >= 0
            && end >= 0
            && end >= start
            && (end - start) % 4 == 0
            && start % 4 == 0
            && end % 4 == 0
            && entries < 10000
    }

    // ---------------------------------------------------------------------
    // Layouts
    // ---------------------------------------------------------------------

    /// The active layout, if one was selected
    pub fn memory_layout(&self) -> Option<&MemoryLayout> {
        self.active_layout
            .as_deref()
            .and_then(|checksum| self.layouts.get(checksum))
    }

    /// Without a layout nothing is known, which counts as incomplete
    pub fn layout_is_complete(&self) -> bool {
        self.memory_layout().map(|l| l.is_complete()).unwrap_or(false)
    }

    /// Register `layout` and make it the active one
    pub fn set_memory_layout(&mut self, layout: MemoryLayout) {
        let checksum = layout.checksum();
        if self.layouts.insert(layout) {
            self.active_layout = Some(checksum);
        }
    }

    /// Select the layout for `checksum`. A miss is reported through
    /// [`ProgressEvent::LayoutNotFound`] and leaves the instance unhealthy.
    pub fn get_layout_for_checksum(&mut self, checksum: &str) -> Option<&MemoryLayout> {
        let checksum = checksum.trim().to_lowercase();
        tracing::debug!("DF's checksum is: {}", checksum);

        let found = self.layouts.get(&checksum).map(|l| l.is_valid()).unwrap_or(false);
        self.is_ok = found;

        if !found {
            tracing::debug!("Could not find layout for checksum {}", checksum);
            tracing::error!("unable to identify version from checksum: {}", checksum);
            self.emit(ProgressEvent::LayoutNotFound {
                checksum,
                supported: self.layouts.supported_versions(),
            });
            return None;
        }

        self.active_layout = Some(checksum);
        let layout = self.memory_layout()?;
        tracing::info!(
            "Detected Dwarf Fortress version {} using MemoryLayout from {}",
            layout.game_version(),
            layout.filename().display()
        );
        Some(layout)
    }

    /// Install an externally supplied layout file
    pub fn add_new_layout(&mut self, version: &str, file: &Path) -> Result<PathBuf> {
        Ok(self.layouts.add_new_layout(version, file)?)
    }

    /// Layout address for `name` with the address correction applied.
    /// `None` when the layout lacks the field or marks it unsupported.
    pub fn corrected_address(&self, name: &str) -> Option<VirtAddr> {
        let layout = self.memory_layout()?;
        if !layout.is_supported(name) {
            return None;
        }
        Some(layout.address(name).wrapping_add_signed(self.memory_correction))
    }

    // ---------------------------------------------------------------------
    // Connecting
    // ---------------------------------------------------------------------

    /// Find the running game, map it, checksum it and select its layout.
    ///
    /// With `connect_unknown` the connection is kept even when no layout
    /// matches; the instance then runs without one.
    pub fn find_running_copy(&mut self, connect_unknown: bool) -> Result<()> {
        if let Err(e) = self.driver.locate() {
            self.is_ok = false;
            return Err(e.into());
        }

        self.is_ok = true;
        self.active_layout = None;
        self.memory_correction = 0;
        self.map_virtual_memory();

        self.base_address = self.read_addr(self.map.lowest_address + D::BASE_ADDRESS_OFFSET);
        tracing::debug!("base_addr: {:#x}", self.base_address);
        self.is_ok = self.base_address > 0;

        let checksum = match self.driver.calculate_checksum() {
            Ok(c) => hexify(c),
            Err(e) => {
                tracing::error!("{}", e);
                self.is_ok = false;
                String::new()
            }
        };
        tracing::debug!("DF's checksum is {}", checksum);

        if self.is_ok {
            let base = self.base_address;
            self.memory_correction = self
                .get_layout_for_checksum(&checksum)
                .and_then(|l| l.base_address())
                .map(|reference| base as i64 - reference as i64)
                .unwrap_or(0);
        }

        self.df_dir = self.driver.working_dir();
        if let Some(dir) = &self.df_dir {
            tracing::info!("Dwarf fortress path: {}", dir.display());
        }

        self.remap_timer.resume();
        self.heartbeat_timer.resume();

        if self.is_ok || connect_unknown {
            Ok(())
        } else if self.base_address == 0 || checksum.is_empty() {
            Err(Error::NotConnected)
        } else {
            Err(Error::LayoutNotFound(checksum))
        }
    }

    /// Pump the periodic timers: remap when due (never during a scan) and
    /// run the heartbeat when due.
    pub fn poll(&mut self) {
        let now = Instant::now();
        if self.remap_timer.is_due(now) {
            self.map_virtual_memory();
            self.remap_timer.restart();
        }
        if self.memory_layout().is_some() && self.heartbeat_timer.is_due(now) {
            self.heartbeat();
            self.heartbeat_timer.restart();
        }
    }
}

/// Decode a little-endian pointer of `bytes.len()` width
pub(crate) fn decode_addr(bytes: &[u8]) -> VirtAddr {
    match bytes.len() {
        8 => LE::read_u64(bytes),
        4 => LE::read_u32(bytes) as VirtAddr,
        n => LE::read_uint(bytes, n),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::driver::mock::MockDriver;
    use crate::layout::tests::SAMPLE;
    use std::cell::RefCell;
    use std::rc::Rc;

    pub fn instance(driver: MockDriver) -> ProcessInstance<MockDriver> {
        let mut inst = ProcessInstance::new(driver, LayoutRegistry::default());
        inst.map_virtual_memory();
        inst
    }

    pub fn complete_layout() -> MemoryLayout {
        MemoryLayout::from_toml_str(SAMPLE, "sample.toml").unwrap()
    }

    pub fn incomplete_layout() -> MemoryLayout {
        MemoryLayout::from_toml_str(&SAMPLE.replace("complete = true", "complete = false"), "x")
            .unwrap()
    }

    pub fn recorder(
        inst: &mut ProcessInstance<MockDriver>,
    ) -> Rc<RefCell<Vec<ProgressEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        inst.set_progress(move |e| sink.borrow_mut().push(e));
        events
    }

    #[test]
    fn test_is_valid_address_matches_segments() {
        let inst = instance(
            MockDriver::new()
                .with_zeroed(0x1000, 0x1000)
                .with_zeroed(0x4000, 0x10),
        );
        for addr in [0x1000, 0x1800, 0x1fff, 0x4000, 0x400f] {
            assert!(inst.is_valid_address(addr), "{:#x}", addr);
        }
        for addr in [0, 0xfff, 0x2000, 0x3fff, 0x4010] {
            assert!(!inst.is_valid_address(addr), "{:#x}", addr);
        }
    }

    #[test]
    fn test_nested_attach_reference_counting() {
        let mut inst = instance(MockDriver::new().with_zeroed(0x1000, 0x10));

        assert!(inst.attach());
        assert!(inst.attach());
        assert!(inst.attach());
        assert_eq!(inst.driver().stops, 1);

        assert!(inst.detach());
        assert!(inst.detach());
        assert!(inst.is_attached());
        assert_eq!(inst.driver().resumes, 0);

        assert!(inst.detach());
        assert!(!inst.is_attached());
        assert_eq!(inst.driver().resumes, 1);
    }

    #[test]
    fn test_detach_when_not_attached_fails_quietly() {
        let mut inst = instance(MockDriver::new());
        assert!(!inst.detach());
        assert_eq!(inst.attach_count(), 0);
        assert_eq!(inst.driver().resumes, 0);
    }

    #[test]
    fn test_failed_attach_leaves_count_at_zero() {
        let mut driver = MockDriver::new().with_zeroed(0x1000, 0x10);
        driver.fail_stop = true;
        let mut inst = instance(driver);
        assert!(!inst.attach());
        assert_eq!(inst.attach_count(), 0);
        assert_eq!(inst.read_raw(0x1000, 4).0, 0);
    }

    #[test]
    fn test_with_attached_releases() {
        let mut inst = instance(MockDriver::new().with_zeroed(0x1000, 0x10));
        let count = inst.with_attached(|i| i.attach_count());
        assert_eq!(count, Some(1));
        assert!(!inst.is_attached());
    }

    #[test]
    fn test_read_raw_across_pages() {
        let data: Vec<u8> = (0..0x2800).map(|i| (i % 251) as u8).collect();
        let mut inst = instance(MockDriver::new().with_region(0x10000, data.clone()));

        let (read, buf) = inst.read_raw(0x10100, 0x2000);
        assert_eq!(read, 0x2000);
        assert_eq!(buf, data[0x100..0x2100]);
        assert!(!inst.is_attached());
    }

    #[test]
    fn test_read_raw_partial_is_zero_filled_prefix() {
        let mut inst = instance(
            MockDriver::new()
                .with_region(0x1000, vec![0xAA; 0x10])
                .with_region(0x1020, vec![0xBB; 0x10]),
        );

        let (read, buf) = inst.read_raw(0x1008, 0x20);
        assert_eq!(read, 8);
        assert_eq!(buf.len(), 0x20);
        assert_eq!(&buf[..8], &[0xAA; 8]);
        assert!(buf[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_get_data_empty_on_short_read() {
        let mut inst = instance(MockDriver::new().with_zeroed(0x1000, 0x10));
        assert_eq!(inst.get_data(0x1000, 0x10).len(), 0x10);
        assert!(inst.get_data(0x1008, 0x10).is_empty());
    }

    #[test]
    fn test_scalar_reads_little_endian() {
        let mut driver = MockDriver::new().with_zeroed(0x1000, 0x10);
        driver.plant(0x1000, &[0x01, 0x02, 0x03, 0x04, 0xFE, 0xFF]);
        let mut inst = instance(driver);

        assert_eq!(inst.read_byte(0x1000), 0x01);
        assert_eq!(inst.read_word(0x1000), 0x0201);
        assert_eq!(inst.read_short(0x1004), -2);
        assert_eq!(inst.read_int(0x1000), 0x04030201);
        assert_eq!(inst.read_addr(0x1000), 0x04030201);
    }

    #[test]
    fn test_write_raw_round_trip_without_clobbering() {
        let mut driver = MockDriver::new().with_region(0x1000, vec![0x11; 0x40]);
        driver.word_size = 8;
        let mut inst = instance(driver);

        // 5 bytes: not a multiple of the word size
        let written = inst.write_raw(0x1003, &[1, 2, 3, 4, 5]);
        assert_eq!(written, 5);

        let (_, back) = inst.read_raw(0x1003, 5);
        assert_eq!(back, vec![1, 2, 3, 4, 5]);

        let (_, around) = inst.read_raw(0x1000, 0x18);
        assert_eq!(&around[..3], &[0x11; 3]);
        assert_eq!(&around[8..], &[0x11; 0x10]);
    }

    #[test]
    fn test_write_raw_stops_at_first_failed_word() {
        let mut driver = MockDriver::new().with_zeroed(0x1000, 0x40);
        driver.word_size = 4;
        driver.pokes_allowed = Some(1);
        let mut inst = instance(driver);

        let written = inst.write_raw(0x1000, &[9; 10]);
        assert_eq!(written, 4);
        assert_eq!(inst.driver().peek(0x1000, 6), vec![9, 9, 9, 9, 0, 0]);
    }

    #[test]
    fn test_write_int() {
        let mut inst = instance(MockDriver::new().with_zeroed(0x1000, 0x10));
        assert_eq!(inst.write_int(0x1004, -5), 4);
        assert_eq!(inst.read_int(0x1004), -5);
    }

    #[test]
    fn test_enumerate_vector_synthetic() {
        let mut driver = MockDriver::new().with_zeroed(0x800, 0x10).with_zeroed(0x1000, 0x10);
        driver.plant_u32(0x800, 0x1000);
        driver.plant_u32(0x804, 0x1010);
        for (i, value) in [0x1000u32, 0x1004, 0x1008, 0x100c].iter().enumerate() {
            driver.plant_u32(0x1000 + i as VirtAddr * 4, *value);
        }
        let mut inst = instance(driver);
        inst.set_memory_layout(complete_layout());

        assert_eq!(
            inst.enumerate_vector(0x800),
            vec![0x1000, 0x1004, 0x1008, 0x100c]
        );
        assert!(!inst.is_attached());
    }

    #[test]
    fn test_enumerate_vector_filters_invalid_only_when_complete() {
        let mut driver = MockDriver::new().with_zeroed(0x800, 0x10).with_zeroed(0x1000, 0x10);
        driver.plant_u32(0x800, 0x1000);
        driver.plant_u32(0x804, 0x1008);
        driver.plant_u32(0x1000, 0x1004);
        driver.plant_u32(0x1004, 0xdead0000);
        let mut inst = instance(driver);

        inst.set_memory_layout(complete_layout());
        assert_eq!(inst.enumerate_vector(0x800), vec![0x1004]);

        inst.set_memory_layout(incomplete_layout());
        assert_eq!(inst.enumerate_vector(0x800), vec![0x1004, 0xdead0000]);
    }

    #[test]
    fn test_enumerate_vector_short_read() {
        let mut driver = MockDriver::new().with_zeroed(0x800, 0x10).with_zeroed(0x1000, 0x8);
        driver.plant_u32(0x800, 0x1000);
        driver.plant_u32(0x804, 0x1010);
        driver.plant_u32(0x1000, 0x1004);
        let mut inst = instance(driver);

        inst.set_memory_layout(complete_layout());
        assert!(inst.enumerate_vector(0x800).is_empty());

        inst.set_memory_layout(incomplete_layout());
        assert_eq!(inst.enumerate_vector(0x800), vec![0x1004, 0, 0, 0]);
    }

    #[test]
    fn test_enumerate_vector_rejects_backwards_and_null() {
        let mut driver = MockDriver::new().with_zeroed(0x800, 0x10);
        driver.plant_u32(0x800, 0x2000);
        driver.plant_u32(0x804, 0x1000);
        let mut inst = instance(driver);
        assert!(inst.enumerate_vector(0x800).is_empty());
        assert!(inst.enumerate_vector(0).is_empty());
    }

    #[test]
    fn test_enumerate_large_vector_is_still_returned() {
        let entries = 5001usize;
        let mut driver = MockDriver::new()
            .with_zeroed(0x800, 0x10)
            .with_zeroed(0x10000, entries * 4);
        driver.plant_u32(0x800, 0x10000);
        driver.plant_u32(0x804, 0x10000 + entries as u32 * 4);
        let mut inst = instance(driver);
        assert_eq!(inst.enumerate_vector(0x800).len(), entries);
    }

    #[test]
    fn test_looks_like_vector_of_pointers() {
        let mut driver = MockDriver::new().with_zeroed(0x800, 0x20);
        driver.plant_u32(0x804, 0x1000);
        driver.plant_u32(0x808, 0x1010);
        driver.plant_u32(0x814, 0x1001);
        driver.plant_u32(0x818, 0x1010);
        let mut inst = instance(driver);
        assert!(inst.looks_like_vector_of_pointers(0x800));
        assert!(!inst.looks_like_vector_of_pointers(0x810));
    }

    #[test]
    fn test_read_string_follows_pointer() {
        let mut driver = MockDriver::new().with_zeroed(0x800, 0x10).with_zeroed(0x2000, 0x200);
        driver.plant_u32(0x800, 0x2000);
        driver.plant(0x2000, b"Urist\x82\0junk");
        let mut inst = instance(driver);
        assert_eq!(inst.read_string(0x800), "Uristé");
    }

    #[test]
    fn test_remap_replaces_segments() {
        let mut inst = instance(MockDriver::new().with_zeroed(0x1000, 0x10));
        assert_eq!(inst.segments().len(), 1);

        *inst.driver_mut() = MockDriver::new()
            .with_zeroed(0x1000, 0x10)
            .with_zeroed(0x9000, 0x10);
        assert!(!inst.is_valid_address(0x9000));
        inst.map_virtual_memory();
        assert_eq!(inst.segments().len(), 2);
        assert!(inst.is_valid_address(0x9000));
    }

    #[test]
    fn test_layout_lookup_miss_notifies() {
        let mut inst = instance(MockDriver::new());
        let events = recorder(&mut inst);
        inst.set_memory_layout(complete_layout());

        assert!(inst.get_layout_for_checksum("0x12345678").is_none());
        assert!(!inst.is_ok());
        let events = events.borrow();
        match events.last() {
            Some(ProgressEvent::LayoutNotFound { checksum, supported }) => {
                assert_eq!(checksum, "0x12345678");
                assert_eq!(supported[0].1, "0xdeadbeef");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_layout_lookup_hit_is_case_insensitive() {
        let mut inst = instance(MockDriver::new());
        inst.set_memory_layout(incomplete_layout());
        inst.active_layout = None;

        assert!(inst.get_layout_for_checksum("0xDEADBEEF").is_some());
        assert!(inst.is_ok());
        assert!(inst.memory_layout().is_some());
    }

    #[test]
    fn test_find_running_copy_selects_layout_and_correction() {
        let mut driver = MockDriver::new().with_zeroed(0x8048000, 0x100);
        driver.plant_u32(0x8048018, 0x8049000);
        let mut registry = LayoutRegistry::default();
        registry.insert(complete_layout());
        let mut inst = ProcessInstance::new(driver, registry);

        inst.find_running_copy(false).unwrap();
        assert!(inst.is_ok());
        assert_eq!(inst.base_address(), 0x8049000);
        assert_eq!(inst.memory_correction(), 0x1000);
        assert_eq!(inst.corrected_address("creature_vector"), Some(0x2000));
        assert_eq!(inst.corrected_address("squad_vector"), None);
        assert_eq!(inst.memory_layout().unwrap().game_version(), "v0.31.25 (test)");
    }

    #[test]
    fn test_find_running_copy_unknown_version() {
        let mut driver = MockDriver::new().with_zeroed(0x8048000, 0x100);
        driver.plant_u32(0x8048018, 0x8049000);
        driver.checksum = 0x0badf00d;

        let mut inst = ProcessInstance::new(driver, LayoutRegistry::default());
        let err = inst.find_running_copy(false).unwrap_err();
        assert!(matches!(err, Error::LayoutNotFound(ref c) if c == "0x0badf00d"));

        assert!(inst.find_running_copy(true).is_ok());
        assert!(!inst.is_ok());
        assert!(inst.memory_layout().is_none());
    }

    #[test]
    fn test_reconnect_resets_memory_correction() {
        let mut driver = MockDriver::new().with_zeroed(0x8048000, 0x100);
        driver.plant_u32(0x8048018, 0x8049000);
        let mut registry = LayoutRegistry::default();
        registry.insert(complete_layout());
        let mut inst = ProcessInstance::new(driver, registry);
        inst.find_running_copy(false).unwrap();
        assert_eq!(inst.memory_correction(), 0x1000);

        // the new process has no readable base address
        inst.driver_mut().plant_u32(0x8048018, 0);
        assert!(matches!(inst.find_running_copy(false), Err(Error::NotConnected)));
        assert!(!inst.is_ok());
        assert_eq!(inst.memory_correction(), 0);
    }

    #[test]
    fn test_find_running_copy_without_process() {
        let mut driver = MockDriver::new();
        driver.pid = None;
        let mut inst = ProcessInstance::new(driver, LayoutRegistry::default());
        assert!(matches!(
            inst.find_running_copy(true),
            Err(Error::Driver(DriverError::ProcessNotFound))
        ));
        assert!(!inst.is_ok());
    }

    #[test]
    fn test_pprint_reads_memory() {
        let mut driver = MockDriver::new().with_zeroed(0x1000, 0x20);
        driver.plant(0x1000, b"DF");
        let mut inst = instance(driver);
        let out = inst.pprint(0x1000, 0x10);
        assert!(out.contains("0x00001000 | 44 46 00"));
    }
}
