use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Millisecond tick source shared by the drivers, controllers and the runner.
///
/// - now_ms(): free-running u32 millisecond counter; wraps after ~49.7 days
/// - sleep(): blocks for the given duration (implementations may simulate)
///
/// Consumers must compare times with `now.wrapping_sub(then)` only.
pub trait Clock {
    fn now_ms(&self) -> u32;
    fn sleep(&self, d: Duration);
}

/// Real-time clock backed by `std::time::Instant`, counting from construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now_ms(&self) -> u32 {
        // Truncation is the wrap of a 32-bit tick counter.
        self.epoch.elapsed().as_millis() as u32
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

/// Deterministic clock whose time only moves when told to.
///
/// Clones share the same counter. `sleep(d)` advances the counter by `d`
/// without blocking, which turns blocking delays into virtual time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU32>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at an arbitrary counter value (e.g. just before wraparound).
    pub fn starting_at(ms: u32) -> Self {
        Self {
            now: Arc::new(AtomicU32::new(ms)),
        }
    }

    /// Advance the clock by `ms`, wrapping like the hardware counter.
    pub fn advance(&self, ms: u32) {
        // fetch_add on atomics wraps on overflow
        self.now.fetch_add(ms, Ordering::Relaxed);
    }

    pub fn set(&self, ms: u32) {
        self.now.store(ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.now.load(Ordering::Relaxed)
    }

    fn sleep(&self, d: Duration) {
        let ms = u32::try_from(d.as_millis()).unwrap_or(u32::MAX);
        self.advance(ms);
    }
}
