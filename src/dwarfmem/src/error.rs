//! Error types for the memory engine.

use crate::VirtAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the OS-level process access primitives.
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Dwarf Fortress process not found. Is the game running?")]
    ProcessNotFound,

    #[error("No process selected")]
    NoProcess,

    #[error("Failed to attach to PID {pid}: {reason}")]
    AttachFailed { pid: u32, reason: String },

    #[error("Failed to detach from PID {pid}: {reason}")]
    DetachFailed { pid: u32, reason: String },

    /// The wait-for-stop primitive failed with no recoverable status.
    #[error("Lost PID {pid} while waiting for it to stop: {reason}")]
    WaitFailed { pid: u32, reason: String },

    #[error("Failed to write word at {address:#x}: {reason}")]
    WriteFailed { address: VirtAddr, reason: String },

    #[error("Failed to read {path}: {source}")]
    Proc {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while loading or installing layout files.
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse layout {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Layout {0} is missing its checksum or version name")]
    Invalid(PathBuf),

    #[error("Layout file {0} does not exist")]
    Missing(PathBuf),

    #[error("No valid memory layouts found in: {0}")]
    NoValidLayouts(String),
}

/// Crate-level error.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Layout(#[from] LayoutError),

    #[error("No memory layout for checksum {0}")]
    LayoutNotFound(String),

    #[error("Not connected to a running game")]
    NotConnected,

    #[error("Layout does not define address '{0}'")]
    MissingAddress(String),

    #[error("Address {address:#x} for '{name}' is not inside any mapped segment")]
    InvalidAddress { name: String, address: VirtAddr },
}

pub type Result<T> = std::result::Result<T, Error>;
