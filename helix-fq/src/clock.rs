//! Real-time clock sources.
//!
//! The scheduler only ever asks "how many nanoseconds have passed", so the
//! clock is a single-method trait. Production code uses [`SystemClock`];
//! simulations and tests substitute [`ManualClock`] or [`IntervalClock`]
//! so that every run is deterministic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A monotonic real-time clock.
///
/// Implementations must never go backwards. The scheduler treats a reading
/// that is earlier than the previous one as zero elapsed time.
pub trait Clock: Send + Sync {
    /// Returns nanoseconds elapsed since the clock's own epoch.
    fn now_ns(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_ns(&self) -> u64 {
        (**self).now_ns()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ns(&self) -> u64 {
        (**self).now_ns()
    }
}

/// Converts a duration to whole nanoseconds, saturating at `u64::MAX`.
#[must_use]
pub fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Clock backed by [`Instant`], with its epoch at construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a clock whose epoch is now.
    #[must_use]
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
    fn now_ns(&self) -> u64 {
        duration_to_nanos(self.origin.elapsed())
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same underlying time, so a test can hand one clone to
/// the scheduler and keep another to drive it.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ns: Arc<AtomicU64>,
}

impl ManualClock {
    /// Creates a clock reading `start_ns`.
    #[must_use]
    pub fn new(start_ns: u64) -> Self {
        Self {
            now_ns: Arc::new(AtomicU64::new(start_ns)),
        }
    }

    /// Moves the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        self.advance_ns(duration_to_nanos(duration));
    }

    /// Moves the clock forward by `nanos`, saturating at `u64::MAX`.
    pub fn advance_ns(&self, nanos: u64) {
        // fetch_update never fails when the closure always returns Some.
        let _ = self
            .now_ns
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |now| {
                Some(now.saturating_add(nanos))
            });
    }

    /// Sets the clock to `nanos` if that is not in the past.
    pub fn set_ns(&self, nanos: u64) {
        self.now_ns.fetch_max(nanos, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now_ns(&self) -> u64 {
        self.now_ns.load(Ordering::Acquire)
    }
}

/// A clock that advances by a fixed step every time it is read.
///
/// Useful for exercising the virtual-clock synchronization without any
/// explicit driving: each scheduler operation observes a little real time
/// passing.
#[derive(Debug)]
pub struct IntervalClock {
    now_ns: AtomicU64,
    step_ns: u64,
}

impl IntervalClock {
    /// Creates a clock starting at `start_ns` that steps by `step` per read.
    #[must_use]
    pub fn new(start_ns: u64, step: Duration) -> Self {
        Self {
            now_ns: AtomicU64::new(start_ns),
            step_ns: duration_to_nanos(step),
        }
    }

    /// Returns the step applied per read.
    #[must_use]
    pub const fn step_ns(&self) -> u64 {
        self.step_ns
    }
}

impl Clock for IntervalClock {
    fn now_ns(&self) -> u64 {
        let step = self.step_ns;
        self.now_ns
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |now| {
                Some(now.saturating_add(step))
            })
            .unwrap_or_else(|now| now)
    }
}
