//! Fixed-point virtual time.
//!
//! Virtual time is measured in nanoseconds of service, scaled by
//! 2^[`FRACTION_BITS`] so that fractional advance rates (`min(reqs, C) / NEQ`)
//! accumulate without drift. A float clock loses increments once it grows
//! large (`1e20 + 1e0 == 1e20`); a 128-bit fixed-point clock does not.
//!
//! Values are signed: completion corrections may move a queue's virtual
//! start below zero. All arithmetic saturates instead of wrapping.

use std::fmt;
use std::time::Duration;

/// Number of fractional bits in a [`VirtualTime`].
pub const FRACTION_BITS: u32 = 16;

/// One virtual nanosecond in raw fixed-point units.
const ONE: i128 = 1 << FRACTION_BITS;

/// A point (or span) on the virtual clock.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct VirtualTime(i128);

impl VirtualTime {
    /// The virtual epoch.
    pub const ZERO: Self = Self(0);

    /// The earliest representable virtual time.
    pub const MIN: Self = Self(i128::MIN);

    /// The latest representable virtual time.
    pub const MAX: Self = Self(i128::MAX);

    /// Creates a virtual time from whole nanoseconds.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        // u64::MAX << 16 fits comfortably in i128.
        Self((nanos as i128) * ONE)
    }

    /// Creates a virtual time from a duration, saturating at [`Self::MAX`].
    #[must_use]
    pub fn from_duration(duration: Duration) -> Self {
        i128::try_from(duration.as_nanos())
            .ok()
            .and_then(|nanos| nanos.checked_mul(ONE))
            .map_or(Self::MAX, Self)
    }

    /// Creates a virtual time from its raw fixed-point representation.
    #[must_use]
    pub const fn from_raw(raw: i128) -> Self {
        Self(raw)
    }

    /// Returns the raw fixed-point representation.
    #[must_use]
    pub const fn raw(self) -> i128 {
        self.0
    }

    /// Returns the value in (fractional) nanoseconds, for reporting only.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Reporting only.
    pub fn as_nanos_f64(self) -> f64 {
        self.0 as f64 / ONE as f64
    }

    /// Saturating addition.
    #[must_use]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction.
    #[must_use]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// Saturating multiplication by a count.
    #[must_use]
    pub const fn saturating_mul(self, count: u64) -> Self {
        Self(self.0.saturating_mul(count as i128))
    }
}

impl fmt::Debug for VirtualTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vt({:.3})", self.as_nanos_f64())
    }
}

impl fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}ns", self.as_nanos_f64())
    }
}

/// Rate at which virtual time advances relative to real time.
///
/// `ratio = min(reqs, C) / NEQ`, or zero when no queue is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualTimeRatio {
    /// `min(reqs, C)`: requests that can be in service at once.
    pub admitted: u64,
    /// `NEQ`: queues with pending or in-service packets.
    pub active_queues: u64,
}

impl VirtualTimeRatio {
    /// Computes the ratio from the raw scheduler counts.
    #[must_use]
    pub fn new(requests: u64, concurrency_limit: u64, active_queues: u64) -> Self {
        Self {
            admitted: requests.min(concurrency_limit),
            active_queues,
        }
    }

    /// Returns true if virtual time does not advance at this ratio.
    #[must_use]
    pub const fn is_frozen(&self) -> bool {
        self.active_queues == 0 || self.admitted == 0
    }

    /// Returns the virtual time that elapses over `elapsed_ns` of real time.
    #[must_use]
    pub fn advance(&self, elapsed_ns: u64) -> VirtualTime {
        if self.is_frozen() {
            return VirtualTime::ZERO;
        }
        let scaled = i128::from(elapsed_ns)
            .checked_mul(i128::from(self.admitted))
            .and_then(|v| v.checked_mul(ONE));
        scaled.map_or(VirtualTime::MAX, |v| {
            VirtualTime(v / i128::from(self.active_queues))
        })
    }

    /// Returns the ratio as a float, for reporting only.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Reporting only.
    pub fn as_f64(&self) -> f64 {
        if self.active_queues == 0 {
            return 0.0;
        }
        self.admitted as f64 / self.active_queues as f64
    }
}
