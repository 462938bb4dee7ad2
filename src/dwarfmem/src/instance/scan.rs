//! Brute-force scans over every mapped segment
//!
//! All scans share one discipline: the periodic remap is suspended for the
//! duration, the process is attached once up front, progress is reported in
//! fixed units, and the cancel token is checked at every loop boundary. A
//! cancelled scan returns the hits found so far and emits nothing further.
//!
//! Vector headers are assumed to look like
//!
//! ```text
//! glibc++: START | END | END_ALLOCATOR
//! MSVC:    ALLOCATOR | START | END | END_ALLOCATOR
//! ```
//!
//! with the difference captured by the driver's `VECTOR_POINTER_OFFSET`.

use super::{decode_addr, ProcessInstance};
use crate::driver::MemoryDriver;
use crate::pattern::Pattern;
use crate::progress::{ProgressEvent, ScanRate};
use crate::VirtAddr;

use std::time::Instant;

/// Steps reported for address-space scans
const SCAN_STEPS: u64 = 1000;

/// Candidate sets report progress every this many entries
const SET_REPORT_EVERY: usize = 100;

/// How an element count is compared against the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryMatch {
    /// `|count - target| <= fuzz`
    Fuzzy { target: u64, fuzz: u64 },
    Equal(u64),
    Less(u64),
    Greater(u64),
}

impl EntryMatch {
    /// Comparison from an operator character: `=`, `<` or `>`
    pub fn from_op(op: char, target: u64) -> Option<Self> {
        match op {
            '=' => Some(Self::Equal(target)),
            '<' => Some(Self::Less(target)),
            '>' => Some(Self::Greater(target)),
            _ => None,
        }
    }

    pub fn accepts(&self, count: u64) -> bool {
        match *self {
            Self::Fuzzy { target, fuzz } => count.abs_diff(target) <= fuzz,
            Self::Equal(n) => count == n,
            Self::Less(n) => count < n,
            Self::Greater(n) => count > n,
        }
    }

    /// Cheap test on the count implied by a raw header. Operator scans only
    /// bother with plausibly sized vectors.
    fn prefilter(&self, entries: u64) -> bool {
        match self {
            Self::Fuzzy { .. } => self.accepts(entries),
            _ => entries > 0 && entries < 1000,
        }
    }
}

/// Structural test on a raw `{start, end}` pair
fn plausible_header(start: VirtAddr, end: VirtAddr) -> bool {
    start != 0 && end != 0 && end >= start && start % 4 == 0 && end % 4 == 0
}

impl<D: MemoryDriver> ProcessInstance<D> {
    /// Suspend remapping, clear the cancel flag and attach for a scan.
    /// Returns false (with the remap restored) if the target cannot be
    /// attached.
    pub(crate) fn begin_scan(&mut self, total_steps: u64) -> bool {
        self.remap_timer.suspend();
        self.cancel.reset();
        self.emit(ProgressEvent::ScanTotalSteps(total_steps));
        self.emit(ProgressEvent::ScanProgress(0));

        if self.attach() {
            return true;
        }
        self.remap_timer.resume();
        false
    }

    pub(crate) fn end_scan(&mut self, final_step: u64) {
        self.detach();
        self.remap_timer.resume();
        if !self.cancel.is_cancelled() {
            self.emit(ProgressEvent::ScanProgress(final_step));
        }
    }

    /// True while a scan holds the remap suspended
    pub fn is_scanning(&self) -> bool {
        self.remap_timer.is_suspended()
    }

    fn scan_tick(&self, rate: &mut ScanRate, bytes: u64) {
        rate.add(bytes);
        if let Some(message) = rate.poll() {
            self.emit(ProgressEvent::ScanMessage(message));
        }
    }

    /// Bytes of mapped memory inside `[start, end)`
    fn bytes_in_scope(&self, start: VirtAddr, end: VirtAddr) -> u64 {
        self.map
            .segments
            .iter()
            .map(|s| s.end.min(end).saturating_sub(s.start.max(start)))
            .sum()
    }

    /// Every address in `[start, end)` where `needle` occurs
    pub fn scan_for_bytes(&mut self, needle: &[u8], start: VirtAddr, end: VirtAddr) -> Vec<VirtAddr> {
        self.scan_for_pattern(&Pattern::exact(needle), start, end)
    }

    /// [`scan_for_bytes`](Self::scan_for_bytes) with wildcard support.
    ///
    /// Each step is searched together with the previous step's bytes so
    /// matches straddling a step boundary are found; a hit is only reported
    /// by the step it ends in, so nothing is reported twice.
    pub fn scan_for_pattern(
        &mut self,
        pattern: &Pattern,
        start: VirtAddr,
        end: VirtAddr,
    ) -> Vec<VirtAddr> {
        let mut hits = Vec::new();
        if pattern.is_empty() || end <= start {
            return hits;
        }

        let total = self.bytes_in_scope(start, end);
        let report_every = total.div_ceil(SCAN_STEPS).max(1);
        if !self.begin_scan(SCAN_STEPS) {
            return hits;
        }

        let timer = Instant::now();
        let mut rate = ScanRate::new(self.options.scan_rate_interval());
        let step_size = self.options.pattern_step.max(1);
        let complete = self.layout_is_complete();
        let segments = self.map.segments.clone();
        let mut scanned = 0u64;
        let mut window: Vec<u8> = Vec::with_capacity(step_size * 2);
        let mut buffer = vec![0u8; step_size];

        'segments: for seg in segments.iter().filter(|s| s.overlaps(start, end)) {
            window.clear();
            let seg_end = seg.end.min(end);
            let mut ptr = seg.start.max(start);

            while ptr < seg_end {
                if self.cancel.is_cancelled() {
                    break 'segments;
                }

                let step = step_size.min((seg_end - ptr) as usize);
                let got = self.read_raw_into(ptr, &mut buffer[..step]);
                if got < step {
                    if complete && !seg.guarded {
                        tracing::warn!(
                            "tried to read {} bytes starting at {:#x} but only got {}",
                            step,
                            ptr,
                            got
                        );
                    }
                    window.clear();
                    ptr += step as VirtAddr;
                    continue;
                }

                let carried = window.len();
                window.extend_from_slice(&buffer[..step]);
                let window_base = ptr - carried as VirtAddr;

                for idx in pattern.find_all(&window) {
                    let hit = window_base + idx as VirtAddr;
                    if idx + pattern.len() > carried && hit >= start {
                        tracing::debug!("FOUND needle at {:#x}", hit);
                        hits.push(hit);
                    }
                }

                window.drain(..carried);
                scanned += step as u64;
                self.scan_tick(&mut rate, step as u64);
                self.emit(ProgressEvent::ScanProgress(
                    (scanned / report_every).min(SCAN_STEPS),
                ));
                ptr += step as VirtAddr;
            }
        }

        self.end_scan(SCAN_STEPS);
        tracing::debug!(
            "Scanned {}MB in {}ms, {} hits",
            scanned / (1024 * 1024),
            timer.elapsed().as_millis(),
            hits.len()
        );
        hits
    }

    /// Vector headers anywhere in memory whose element count is within
    /// `fuzz` of `num_entries`, counting `entry_size`-byte elements
    pub fn find_vectors(&mut self, num_entries: u64, fuzz: u64, entry_size: usize) -> Vec<VirtAddr> {
        let matcher = EntryMatch::Fuzzy {
            target: num_entries,
            fuzz,
        };
        self.find_vectors_ext(matcher, 0, VirtAddr::MAX, entry_size)
    }

    /// Vector headers in `[start, end]` whose element count satisfies
    /// `matcher`
    pub fn find_vectors_ext(
        &mut self,
        matcher: EntryMatch,
        start: VirtAddr,
        end: VirtAddr,
        entry_size: usize,
    ) -> Vec<VirtAddr> {
        let mut vectors = Vec::new();
        let entry_size = entry_size.max(1);
        let ptr_size = self.driver.pointer_size();

        let total = self.bytes_in_scope(start, end.saturating_add(1));
        let report_every = total.div_ceil(SCAN_STEPS).max(1);
        if !self.begin_scan(SCAN_STEPS) {
            return vectors;
        }

        let timer = Instant::now();
        let mut rate = ScanRate::new(self.options.scan_rate_interval());
        let step_size = self.options.vector_step.max(1);
        let segments = self.map.segments.clone();
        let mut scanned = 0u64;
        let mut buffer = vec![0u8; step_size];

        // Words of every header in [start, end], and nothing else
        let lo_bound = start.saturating_add(D::VECTOR_POINTER_OFFSET);
        let hi_bound = end
            .saturating_add(D::VECTOR_POINTER_OFFSET)
            .saturating_add(2 * ptr_size as VirtAddr);
        let scope_end = end.saturating_add(1);
        let align = entry_size as VirtAddr;

        'segments: for seg in segments.iter() {
            if seg.start >= hi_bound {
                break;
            }
            let lo = seg.start.max(lo_bound);
            let hi = seg.end.min(hi_bound);
            if lo >= hi {
                continue;
            }

            // offsets stay aligned to the segment start
            let mut addr = seg.start + (lo - seg.start).div_ceil(align) * align;
            while addr < hi {
                if self.cancel.is_cancelled() {
                    break 'segments;
                }

                let step = step_size.min((hi - addr) as usize);
                let step_end = addr + step as VirtAddr;
                scanned += step_end.min(scope_end).saturating_sub(addr.max(start));

                if self.read_raw_into(addr, &mut buffer[..step]) == step {
                    let mut offset = 0;
                    while offset + 2 * ptr_size <= step {
                        if self.cancel.is_cancelled() {
                            break 'segments;
                        }

                        let header = (addr + offset as VirtAddr).checked_sub(D::VECTOR_POINTER_OFFSET);
                        match header {
                            Some(h) if h > end => break,
                            Some(h) if h >= start => {
                                let first = decode_addr(&buffer[offset..offset + ptr_size]);
                                let last =
                                    decode_addr(&buffer[offset + ptr_size..offset + 2 * ptr_size]);
                                if plausible_header(first, last)
                                    && matcher.prefilter((last - first) / entry_size as u64)
                                {
                                    let count = self.enumerate_vector(h).len() as u64;
                                    if matcher.accepts(count) {
                                        tracing::debug!("FOUND vector at {:#x} ({} entries)", h, count);
                                        vectors.push(h);
                                    }
                                }
                            }
                            _ => {}
                        }

                        offset += entry_size;
                    }
                }

                self.scan_tick(&mut rate, step as u64);
                self.emit(ProgressEvent::ScanProgress(
                    (scanned / report_every).min(SCAN_STEPS),
                ));
                addr = step_end;
            }
        }

        self.end_scan(SCAN_STEPS);
        tracing::debug!(
            "Scanned {}MB in {}ms, {} vectors",
            scanned / (1024 * 1024),
            timer.elapsed().as_millis(),
            vectors.len()
        );
        vectors
    }

    /// Vector headers among `candidates` whose element count is within
    /// `fuzz` of `num_entries`. Used to refine earlier scan results.
    pub fn find_vectors_in_set(
        &mut self,
        num_entries: u64,
        candidates: &[VirtAddr],
        fuzz: u64,
        entry_size: usize,
    ) -> Vec<VirtAddr> {
        let mut vectors = Vec::new();
        let entry_size = entry_size.max(1) as u64;
        let matcher = EntryMatch::Fuzzy {
            target: num_entries,
            fuzz,
        };
        if !self.begin_scan(candidates.len() as u64) {
            return vectors;
        }

        let timer = Instant::now();
        let ptr_size = self.driver.pointer_size();
        let header_size = D::VECTOR_POINTER_OFFSET as usize + 2 * ptr_size;
        let mut buffer = vec![0u8; header_size];
        let mut checked = 0usize;

        for &addr in candidates {
            if self.cancel.is_cancelled() {
                break;
            }

            if self.read_raw_into(addr, &mut buffer) == header_size {
                let at = D::VECTOR_POINTER_OFFSET as usize;
                let first = decode_addr(&buffer[at..at + ptr_size]);
                let last = decode_addr(&buffer[at + ptr_size..at + 2 * ptr_size]);
                if plausible_header(first, last)
                    && matcher.accepts((last - first) / entry_size)
                    && matcher.accepts(self.enumerate_vector(addr).len() as u64)
                {
                    vectors.push(addr);
                }
            }

            checked += 1;
            if checked % SET_REPORT_EVERY == 0 {
                self.emit(ProgressEvent::ScanProgress(checked as u64));
            }
        }

        self.end_scan(candidates.len() as u64);
        tracing::debug!("Scanned {} vectors in {}ms", checked, timer.elapsed().as_millis());
        vectors
    }

    /// Vector headers in `[start, start + len)` with at most `max_entries`
    /// elements, whose ends and elements all point into mapped memory
    pub fn find_vectors_in_range(
        &mut self,
        max_entries: u64,
        start: VirtAddr,
        len: usize,
    ) -> Vec<VirtAddr> {
        let mut vectors = Vec::new();
        let data = self.get_data(start, len);
        let ptr_size = self.driver.pointer_size();

        for offset in (0..data.len().saturating_sub(2 * ptr_size - 1)).step_by(4) {
            let first = decode_addr(&data[offset..offset + ptr_size]);
            let last = decode_addr(&data[offset + ptr_size..offset + 2 * ptr_size]);

            if last < first || !self.is_valid_address(first) || !self.is_valid_address(last) {
                continue;
            }
            let entries = (last - first) / ptr_size as u64;
            if entries == 0 || entries > max_entries {
                continue;
            }

            let Some(header) = (start + offset as VirtAddr).checked_sub(D::VECTOR_POINTER_OFFSET)
            else {
                continue;
            };
            let elements = self.enumerate_vector(header);
            if elements.iter().all(|&e| self.is_valid_address(e)) {
                vectors.push(header);
            }
        }

        vectors
    }
}
