//! Cooperative timers driven by [`ProcessInstance::poll`](crate::ProcessInstance::poll)

use std::time::{Duration, Instant};

/// A restartable interval that can be suspended
#[derive(Debug, Clone)]
pub(crate) struct Interval {
    period: Duration,
    last: Instant,
    suspended: bool,
}

impl Interval {
    pub(crate) fn new(period: Duration) -> Self {
        Self {
            period,
            last: Instant::now(),
            suspended: false,
        }
    }

    /// Due when not suspended and a full period elapsed since the last restart
    pub(crate) fn is_due(&self, now: Instant) -> bool {
        !self.suspended && now.duration_since(self.last) >= self.period
    }

    pub(crate) fn restart(&mut self) {
        self.last = Instant::now();
    }

    pub(crate) fn suspend(&mut self) {
        self.suspended = true;
    }

    /// Resume and start a fresh period
    pub(crate) fn resume(&mut self) {
        self.suspended = false;
        self.restart();
    }

    pub(crate) fn is_suspended(&self) -> bool {
        self.suspended
    }
}
