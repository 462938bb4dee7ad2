//! Memory segments of the target process
//!
//! A segment is one contiguous region of the target's address space, as
//! reported by `/proc/<pid>/maps` (or synthesized by tests). The full set is
//! rebuilt on every remap and replaced wholesale.

use crate::VirtAddr;

/// One contiguous mapped region
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemorySegment {
    /// Backing path or pseudo-path (`[heap]`, `[stack]`), empty when anonymous
    pub path: String,
    pub start: VirtAddr,
    pub end: VirtAddr,
    pub perms: String,
    /// Region is not expected to be readable; short reads are not reported
    pub guarded: bool,
}

impl MemorySegment {
    pub fn new(path: impl Into<String>, start: VirtAddr, end: VirtAddr, perms: &str) -> Self {
        let perms = perms.to_string();
        let guarded = !perms.starts_with('r');
        Self {
            path: path.into(),
            start,
            end: end.max(start),
            perms,
            guarded,
        }
    }

    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    /// `start <= addr < end`
    pub fn contains(&self, addr: VirtAddr) -> bool {
        addr >= self.start && addr < self.end
    }

    /// True if the segment intersects `[start, end]`
    pub fn overlaps(&self, start: VirtAddr, end: VirtAddr) -> bool {
        self.end > start && self.start <= end
    }

    pub fn is_readable(&self) -> bool {
        self.perms.starts_with('r')
    }

    pub fn is_writable(&self) -> bool {
        self.perms.chars().nth(1) == Some('w')
    }

    pub fn is_executable(&self) -> bool {
        self.perms.chars().nth(2) == Some('x')
    }

    pub fn is_heap(&self) -> bool {
        self.path.contains("[heap]")
    }
}

impl std::fmt::Display for MemorySegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:#010x}-{:#010x} {} {:>10} {}",
            self.start,
            self.end,
            self.perms,
            self.size(),
            self.path
        )
    }
}

/// Snapshot of the target's address space
#[derive(Debug, Clone, Default)]
pub struct MemoryMap {
    pub segments: Vec<MemorySegment>,
    pub lowest_address: VirtAddr,
    pub highest_address: VirtAddr,
    pub heap_start_address: VirtAddr,
}

impl MemoryMap {
    /// Build a map from segments, computing bounds and the heap start
    pub fn from_segments(segments: Vec<MemorySegment>) -> Self {
        let lowest_address = segments.iter().map(|s| s.start).min().unwrap_or(0);
        let highest_address = segments.iter().map(|s| s.end).max().unwrap_or(0);
        let heap_start_address = segments
            .iter()
            .find(|s| s.is_heap())
            .map(|s| s.start)
            .unwrap_or(0);

        Self {
            segments,
            lowest_address,
            highest_address,
            heap_start_address,
        }
    }

    /// Total bytes across all segments
    pub fn total_bytes(&self) -> u64 {
        self.segments.iter().map(MemorySegment::size).sum()
    }

    pub fn find(&self, addr: VirtAddr) -> Option<&MemorySegment> {
        self.segments.iter().find(|s| s.contains(addr))
    }
}

/// Parse the text of a `/proc/<pid>/maps` file.
///
/// Every well-formed line with `end > start` is kept, whatever its
/// permissions or backing path.
pub fn parse_maps(contents: &str) -> MemoryMap {
    let mut segments = Vec::new();

    for line in contents.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.is_empty() {
            continue;
        }

        let Some((start, end)) = parts[0].split_once('-') else {
            continue;
        };
        let (Ok(start), Ok(end)) = (
            VirtAddr::from_str_radix(start, 16),
            VirtAddr::from_str_radix(end, 16),
        ) else {
            continue;
        };
        if end <= start {
            continue;
        }

        let perms = parts.get(1).copied().unwrap_or("----");
        // Paths may contain spaces
        let path = if parts.len() > 5 {
            parts[5..].join(" ")
        } else {
            String::new()
        };

        tracing::trace!("keeping {:#x}-{:#x} {} {}", start, end, perms, path);
        segments.push(MemorySegment::new(path, start, end, perms));
    }

    MemoryMap::from_segments(segments)
}
