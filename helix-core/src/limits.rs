//! System limits and configuration bounds.
//!
//! Following TigerStyle: put limits on everything.
//! Every queue and every time quantity has an explicit maximum, so the
//! scheduler's memory and its virtual-time arithmetic stay bounded.

/// Hard upper bounds for a scheduler instance.
///
/// Configuration values are validated against these limits when a
/// scheduler is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of queues (flow slots) in one scheduler.
    pub max_queues: u32,
    /// Maximum number of pending packets held by a single queue.
    pub max_queue_depth: u32,
    /// Maximum value of the concurrency constant C.
    pub max_concurrency: u32,
    /// Maximum estimated service time charged per packet, in nanoseconds.
    pub max_service_quantum_ns: u64,
}

impl Limits {
    /// Creates limits with safe defaults.
    ///
    /// 64k queues, 1M packets per queue, 64k concurrency and a one hour
    /// service estimate keep every virtual-time product far inside `i128`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_queues: 65_536,
            max_queue_depth: 1_000_000,
            max_concurrency: 65_536,
            max_service_quantum_ns: 3_600 * 1_000_000_000,
        }
    }

    /// Validates that all limits are internally consistent.
    ///
    /// # Errors
    /// Returns an error if any limit is zero.
    pub const fn validate(&self) -> crate::Result<()> {
        if self.max_queues == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "max_queues",
                reason: "must be positive",
            });
        }

        if self.max_queue_depth == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "max_queue_depth",
                reason: "must be positive",
            });
        }

        if self.max_concurrency == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "max_concurrency",
                reason: "must be positive",
            });
        }

        if self.max_service_quantum_ns == 0 {
            return Err(crate::Error::InvalidArgument {
                name: "max_service_quantum_ns",
                reason: "must be positive",
            });
        }

        Ok(())
    }

    /// Checks a value against one of the limits.
    ///
    /// # Errors
    /// Returns `LimitExceeded` if `actual > max`.
    pub const fn check(limit: &'static str, max: u64, actual: u64) -> crate::Result<()> {
        if actual > max {
            return Err(crate::Error::LimitExceeded { limit, max, actual });
        }
        Ok(())
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_are_valid() {
        let limits = Limits::new();
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn test_zero_queues_rejected() {
        let mut limits = Limits::new();
        limits.max_queues = 0;
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_zero_quantum_rejected() {
        let mut limits = Limits::new();
        limits.max_service_quantum_ns = 0;
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_check() {
        assert!(Limits::check("queues", 10, 10).is_ok());
        let err = Limits::check("queues", 10, 11).unwrap_err();
        assert_eq!(
            err,
            crate::Error::LimitExceeded {
                limit: "queues",
                max: 10,
                actual: 11,
            }
        );
    }
}
