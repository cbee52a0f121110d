//! Interval throttling for frame analysis.

use std::time::{Duration, Instant};

/// Decides whether the current frame should be analyzed at all.
///
/// Holds the last sample time as constructor state so independent
/// pipeline instances never interfere. The first call is always
/// eligible; afterwards a frame is eligible only when at least
/// `interval` has elapsed since the last eligible frame, and the
/// stored time advances exactly once per eligible call regardless of
/// what happens downstream.
pub struct CaptureScheduler {
    interval: Duration,
    last_sample: Option<Instant>,
}

impl CaptureScheduler {
    pub fn new(interval: Duration) -> CaptureScheduler {
        CaptureScheduler {
            interval,
            last_sample: None,
        }
    }

    /// Returns true and records `now` iff the frame is eligible.
    /// No side effects on a false return.
    pub fn should_sample(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_sample {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_sample = Some(now);
        true
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
