//! Progress notifications and scan cancellation
//!
//! The engine writes one-way [`ProgressEvent`]s to a [`ProgressSink`] and
//! never reads anything back. Sinks must not block the engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Notifications for a presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Number of steps the current scan will report
    ScanTotalSteps(u64),
    /// Steps completed so far
    ScanProgress(u64),
    /// Free-form scan status, e.g. throughput
    ScanMessage(String),
    /// The game went away or unloaded its world
    ConnectionInterrupted,
    /// No layout matches the running executable
    LayoutNotFound {
        checksum: String,
        /// `(version, checksum)` of every supported build
        supported: Vec<(String, String)>,
    },
    ProgressMessage(String),
    ProgressRange(u64, u64),
    ProgressValue(u64),
}

/// Receiver of progress events. Closures work directly, so a channel is
/// `move |e| { let _ = tx.send(e); }`.
pub trait ProgressSink {
    fn emit(&self, event: ProgressEvent);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn emit(&self, _event: ProgressEvent) {}
}

impl<F: Fn(ProgressEvent)> ProgressSink for F {
    fn emit(&self, event: ProgressEvent) {
        self(event)
    }
}

/// Shared cancellation flag, checked by every scan loop
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Throughput meter reporting MB/s at a fixed interval
#[derive(Debug)]
pub(crate) struct ScanRate {
    interval: Duration,
    window_start: Instant,
    bytes: u64,
}

impl ScanRate {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            window_start: Instant::now(),
            bytes: 0,
        }
    }

    pub(crate) fn add(&mut self, bytes: u64) {
        self.bytes += bytes;
    }

    /// Returns a message once per interval
    pub(crate) fn poll(&mut self) -> Option<String> {
        let elapsed = self.window_start.elapsed();
        if elapsed < self.interval {
            return None;
        }
        let message = format_rate(self.bytes, elapsed);
        self.bytes = 0;
        self.window_start = Instant::now();
        Some(message)
    }
}

pub(crate) fn format_rate(bytes: u64, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64().max(f64::EPSILON);
    format!("{:.2}MB/s", bytes as f64 / 1024.0 / 1024.0 / secs)
}
