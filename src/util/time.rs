//! Time utilities for snapshot receipt and frame pacing

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Source of local receipt timestamps, in milliseconds.
///
/// Values must be non-decreasing between calls. Only differences matter, so the
/// epoch is up to the implementation.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// Monotonic clock measuring milliseconds since it was created
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Manually driven clock. Clones share the same time, so a simulation can hold
/// one handle while a registry holds another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now: Arc::new(Mutex::new(start_ms)),
        }
    }

    /// Move time forward. Negative steps are ignored.
    pub fn advance(&self, delta_ms: f64) {
        if delta_ms > 0.0 {
            *self.now.lock() += delta_ms;
        }
    }

    /// Jump to an absolute time, never backwards
    pub fn set(&self, now_ms: f64) {
        let mut now = self.now.lock();
        if now_ms > *now {
            *now = now_ms;
        }
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        *self.now.lock()
    }
}

/// Measures the wall time between consecutive rendered frames
#[derive(Debug, Clone)]
pub struct FrameTimer {
    last: Instant,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Seconds since the previous call (or since construction)
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let delta = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        delta
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = ManualClock::new(1000.0);
        let handle = clock.clone();
        handle.advance(50.0);
        assert_eq!(clock.now_ms(), 1050.0);
    }

    #[test]
    fn manual_clock_never_runs_backwards() {
        let clock = ManualClock::new(500.0);
        clock.advance(-100.0);
        clock.set(200.0);
        assert_eq!(clock.now_ms(), 500.0);
        clock.set(750.0);
        assert_eq!(clock.now_ms(), 750.0);
    }

    #[test]
    fn system_clock_is_non_decreasing() {
        let clock = SystemClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b >= a);
    }
}
