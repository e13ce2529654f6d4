//! Scheduler configuration.

use std::time::Duration;

use helix_core::Limits;

use crate::clock::duration_to_nanos;
use crate::error::FqResult;

/// When the virtual clock is synchronized with real time.
///
/// Every sync integrates the virtual-time ratio of the state *before* the
/// operation that triggered it, over the real time elapsed since the
/// previous sync. Syncing more often therefore never double-counts; it
/// only tracks ratio changes more precisely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    /// Sync at the start of every operation that changes queue occupancy:
    /// enqueue, dequeue of a packet, and finish.
    #[default]
    EveryOperation,
    /// Sync only at the start of enqueue.
    EnqueueOnly,
}

/// Configuration for the fair-queuing scheduler.
#[derive(Debug, Clone)]
pub struct FairQueueConfig {
    /// Assumed maximum number of concurrently served packets (`C`).
    pub concurrency_limit: u32,

    /// Default estimated service time charged per packet (`G`).
    pub service_quantum: Duration,

    /// Maximum pending packets per queue.
    pub max_queue_depth: usize,

    /// Virtual clock synchronization point.
    pub sync_policy: SyncPolicy,

    /// Hard bounds the other fields are validated against.
    pub limits: Limits,
}

impl FairQueueConfig {
    /// Creates a configuration with the given `C` and `G`.
    #[must_use]
    pub fn new(concurrency_limit: u32, service_quantum: Duration) -> Self {
        Self {
            concurrency_limit,
            service_quantum,
            ..Self::default()
        }
    }

    /// Sets the per-queue depth bound.
    #[must_use]
    pub const fn with_max_queue_depth(mut self, depth: usize) -> Self {
        self.max_queue_depth = depth;
        self
    }

    /// Sets the virtual clock synchronization point.
    #[must_use]
    pub const fn with_sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.sync_policy = policy;
        self
    }

    /// Sets the hard limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Creates a configuration for testing.
    ///
    /// `G` is 100ns, matching unit-sized simulated work items.
    #[must_use]
    pub const fn for_testing() -> Self {
        Self {
            concurrency_limit: 10,
            service_quantum: Duration::from_nanos(100),
            max_queue_depth: 100_000,
            sync_policy: SyncPolicy::EveryOperation,
            limits: Limits::new(),
        }
    }

    /// Returns `G` in nanoseconds.
    #[must_use]
    pub fn service_quantum_ns(&self) -> u64 {
        duration_to_nanos(self.service_quantum)
    }

    /// Validates the configuration against its limits.
    ///
    /// # Errors
    ///
    /// Returns `FqError::InvalidConfig` if `C` or `G` is zero, or any field
    /// exceeds its limit.
    pub fn validate(&self) -> FqResult<()> {
        self.limits.validate()?;

        if self.concurrency_limit == 0 {
            return Err(helix_core::Error::InvalidArgument {
                name: "concurrency_limit",
                reason: "must be positive",
            }
            .into());
        }
        Limits::check(
            "max_concurrency",
            u64::from(self.limits.max_concurrency),
            u64::from(self.concurrency_limit),
        )?;

        if self.service_quantum.is_zero() {
            return Err(helix_core::Error::InvalidArgument {
                name: "service_quantum",
                reason: "must be positive",
            }
            .into());
        }
        Limits::check(
            "max_service_quantum_ns",
            self.limits.max_service_quantum_ns,
            self.service_quantum_ns(),
        )?;

        if self.max_queue_depth == 0 {
            return Err(helix_core::Error::InvalidArgument {
                name: "max_queue_depth",
                reason: "must be positive",
            }
            .into());
        }
        Limits::check(
            "max_queue_depth",
            u64::from(self.limits.max_queue_depth),
            self.max_queue_depth as u64,
        )?;

        Ok(())
    }
}

impl Default for FairQueueConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 100,
            service_quantum: Duration::from_millis(1),
            max_queue_depth: 10_000,
            sync_policy: SyncPolicy::default(),
            limits: Limits::new(),
        }
    }
}
