//! Linux driver: ptrace for stop/resume and pokes, `/proc/<pid>/mem` for reads

use super::MemoryDriver;
use crate::error::DriverError;
use crate::segment::{parse_maps, MemoryMap};
use crate::VirtAddr;

use nix::libc;
use nix::sys::ptrace;
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::Pid;
use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use sysinfo::System;

/// Executable names of the game, old and new
pub const PROCESS_NAMES: [&str; 2] = ["dwarfort.exe", "Dwarf_Fortress"];

/// Live Dwarf Fortress process on Linux
#[derive(Debug, Default)]
pub struct LinuxDriver {
    pid: Option<u32>,
    mem: Option<File>,
    stopped: bool,
}

impl LinuxDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver for a known PID, skipping discovery
    pub fn with_pid(pid: u32) -> Self {
        Self {
            pid: Some(pid),
            mem: None,
            stopped: false,
        }
    }

    fn require_pid(&self) -> Result<u32, DriverError> {
        self.pid.ok_or(DriverError::NoProcess)
    }

    fn proc_path(&self, entry: &str) -> Result<PathBuf, DriverError> {
        Ok(PathBuf::from(format!("/proc/{}/{}", self.require_pid()?, entry)))
    }

    fn mem_file(&mut self) -> Option<&File> {
        if self.mem.is_none() {
            let path = self.proc_path("mem").ok()?;
            match File::open(&path) {
                Ok(file) => self.mem = Some(file),
                Err(e) => {
                    tracing::error!("Unable to open {}: {}", path.display(), e);
                    return None;
                }
            }
        }
        self.mem.as_ref()
    }
}

impl Drop for LinuxDriver {
    fn drop(&mut self) {
        if self.stopped {
            let _ = self.resume();
        }
    }
}

impl MemoryDriver for LinuxDriver {
    const VECTOR_POINTER_OFFSET: VirtAddr = 0;
    const STRING_BUFFER_OFFSET: VirtAddr = 0;
    const BASE_ADDRESS_OFFSET: VirtAddr = 0x18;

    fn word_size(&self) -> usize {
        std::mem::size_of::<libc::c_long>()
    }

    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn locate(&mut self) -> Result<u32, DriverError> {
        tracing::trace!("attempting to find running copy of DF by executable name");
        let pid = find_df_process()?;
        self.pid = Some(pid);
        self.mem = None;
        tracing::trace!("FOUND PID: {}", pid);
        Ok(pid)
    }

    fn stop(&mut self) -> Result<(), DriverError> {
        let raw = self.require_pid()?;
        let pid = Pid::from_raw(raw as i32);

        ptrace::attach(pid).map_err(|e| DriverError::AttachFailed {
            pid: raw,
            reason: e.to_string(),
        })?;

        loop {
            tracing::trace!("waiting for proc to stop");
            match waitpid(pid, None) {
                Ok(WaitStatus::Stopped(..)) => break,
                Ok(status) => {
                    tracing::trace!("waitpid returned {:?} but child wasn't stopped", status);
                }
                Err(e) => {
                    return Err(DriverError::WaitFailed {
                        pid: raw,
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.stopped = true;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), DriverError> {
        let raw = self.require_pid()?;
        self.stopped = false;
        self.mem = None;
        ptrace::detach(Pid::from_raw(raw as i32), None).map_err(|e| DriverError::DetachFailed {
            pid: raw,
            reason: e.to_string(),
        })
    }

    fn read_chunk(&mut self, address: VirtAddr, buf: &mut [u8]) -> usize {
        let Some(file) = self.mem_file() else {
            return 0;
        };
        match file.read_at(buf, address) {
            Ok(n) => n,
            Err(e) => {
                tracing::trace!("read of {} bytes at {:#x} failed: {}", buf.len(), address, e);
                0
            }
        }
    }

    fn poke_word(&mut self, address: VirtAddr, word: &[u8]) -> Result<(), DriverError> {
        let raw = self.require_pid()?;
        let write_failed = |reason: String| DriverError::WriteFailed { address, reason };

        let bytes: [u8; std::mem::size_of::<libc::c_long>()] = word
            .get(..std::mem::size_of::<libc::c_long>())
            .and_then(|w| w.try_into().ok())
            .ok_or_else(|| write_failed(format!("expected a word, got {} bytes", word.len())))?;

        ptrace::write(
            Pid::from_raw(raw as i32),
            address as ptrace::AddressType,
            libc::c_long::from_ne_bytes(bytes),
        )
        .map_err(|e| write_failed(e.to_string()))
    }

    fn memory_map(&mut self) -> Result<MemoryMap, DriverError> {
        let path = self.proc_path("maps")?;
        let contents =
            std::fs::read_to_string(&path).map_err(|source| DriverError::Proc { path, source })?;
        Ok(parse_maps(&contents))
    }

    fn executable_path(&self) -> Result<PathBuf, DriverError> {
        self.proc_path("exe")
    }

    fn working_dir(&self) -> Option<PathBuf> {
        std::fs::read_link(self.proc_path("cwd").ok()?).ok()
    }
}

/// Find the running game, preferring the largest matching process
pub fn find_df_process() -> Result<u32, DriverError> {
    let mut system = System::new_all();
    system.refresh_all();

    let mut candidates: Vec<(u32, u64)> = Vec::new();

    for process in system.processes().values() {
        let pid = process.pid().as_u32();
        let name = process.name().to_string_lossy();

        let by_name = PROCESS_NAMES.iter().any(|n| name.contains(n));
        let by_cmdline = std::fs::read_to_string(format!("/proc/{}/cmdline", pid))
            .map(|cmdline| PROCESS_NAMES.iter().any(|n| cmdline.contains(n)))
            .unwrap_or(false);

        if by_name || by_cmdline {
            let tgid = get_tgid(pid).unwrap_or(pid);
            candidates.push((tgid, process.memory()));
        }
    }

    candidates.sort_by(|a, b| b.1.cmp(&a.1));
    candidates.dedup_by(|a, b| a.0 == b.0);

    match candidates.first() {
        Some((pid, memory)) => {
            tracing::info!("Found DF process: PID {} (memory: {} MB)", pid, memory / 1_000_000);
            Ok(*pid)
        }
        None => {
            tracing::warn!("can't find running copy");
            Err(DriverError::ProcessNotFound)
        }
    }
}

/// Thread group ID (main process) for a given PID/TID
pub fn get_tgid(pid: u32) -> Option<u32> {
    let status = std::fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;
    status
        .lines()
        .find(|line| line.starts_with("Tgid:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|tgid| tgid.parse().ok())
}
