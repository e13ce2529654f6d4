//! Thread-safe scheduler.
//!
//! [`FairQueueScheduler`] puts the [`FairQueue`] engine behind one mutex and
//! reads real time from an injected [`Clock`]. Enqueue, dequeue and finish
//! each take the lock once and hold it for a bounded amount of work; no
//! operation blocks on I/O.

use std::sync::Mutex;
use std::time::Duration;

use helix_core::{FlowKey, PacketId};

use crate::clock::{Clock, SystemClock};
use crate::config::FairQueueConfig;
use crate::error::FqResult;
use crate::fair_queue::{FairQueue, FairQueueStats};
use crate::packet::{Completion, Packet};
use crate::queue::QueueSnapshot;
use crate::virtual_time::VirtualTime;

/// Fair-queuing scheduler shared between enqueuers, dispatchers and workers.
#[derive(Debug)]
pub struct FairQueueScheduler<T, C = SystemClock> {
    inner: Mutex<FairQueue<T>>,
    clock: C,
}

impl<T> FairQueueScheduler<T, SystemClock> {
    /// Creates a scheduler on the system clock.
    ///
    /// # Errors
    ///
    /// See [`FairQueue::new`].
    pub fn new(
        flows: impl IntoIterator<Item = FlowKey>,
        config: FairQueueConfig,
    ) -> FqResult<Self> {
        Self::with_clock(flows, config, SystemClock::new())
    }
}

impl<T, C: Clock> FairQueueScheduler<T, C> {
    /// Creates a scheduler reading time from `clock`.
    ///
    /// # Errors
    ///
    /// See [`FairQueue::new`].
    pub fn with_clock(
        flows: impl IntoIterator<Item = FlowKey>,
        config: FairQueueConfig,
        clock: C,
    ) -> FqResult<Self> {
        let engine = FairQueue::new(flows, config, clock.now_ns())?;
        Ok(Self {
            inner: Mutex::new(engine),
            clock,
        })
    }

    /// Creates a scheduler with flows keyed `0..count`.
    ///
    /// # Errors
    ///
    /// See [`FairQueue::new`].
    pub fn with_flow_count(count: u64, config: FairQueueConfig, clock: C) -> FqResult<Self> {
        Self::with_clock((0..count).map(FlowKey::new), config, clock)
    }

    /// Returns the clock.
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Enqueues `payload` on `flow` with the default estimate.
    ///
    /// # Errors
    ///
    /// Returns `FqError::NoSuchQueue` for an unknown flow and
    /// `FqError::QueueFull` if the flow's queue is at capacity.
    pub fn enqueue(&self, flow: FlowKey, payload: T) -> FqResult<PacketId> {
        let mut engine = self.inner.lock().expect("fair queue lock poisoned");
        // Read the clock under the lock so readings reach the engine in order.
        let now = self.clock.now_ns();
        engine.enqueue(flow, payload, now)
    }

    /// Enqueues `payload` on `flow` with a per-packet service estimate.
    ///
    /// # Errors
    ///
    /// Returns `FqError::NoSuchQueue` for an unknown flow and
    /// `FqError::QueueFull` if the flow's queue is at capacity.
    pub fn enqueue_with_estimate(
        &self,
        flow: FlowKey,
        payload: T,
        estimate: Duration,
    ) -> FqResult<PacketId> {
        let mut engine = self.inner.lock().expect("fair queue lock poisoned");
        let now = self.clock.now_ns();
        engine.enqueue_with_estimate(flow, payload, estimate, now)
    }

    /// Dequeues the next packet, or `None` if nothing is pending.
    pub fn dequeue(&self) -> Option<Packet<T>> {
        let mut engine = self.inner.lock().expect("fair queue lock poisoned");
        let now = self.clock.now_ns();
        engine.dequeue(now)
    }

    /// Finishes a packet with an externally measured service time.
    ///
    /// # Errors
    ///
    /// Returns `FqError::NotInService` if the packet is not in service here.
    pub fn finish(&self, packet: Packet<T>, actual_service: Duration) -> FqResult<Completion<T>> {
        let mut engine = self.inner.lock().expect("fair queue lock poisoned");
        let now = self.clock.now_ns();
        engine.finish(packet, actual_service, now)
    }

    /// Finishes a packet, measuring its service time as the real time
    /// elapsed since it was dequeued.
    ///
    /// # Errors
    ///
    /// Returns `FqError::NotInService` if the packet is not in service here.
    pub fn complete(&self, packet: Packet<T>) -> FqResult<Completion<T>> {
        let mut engine = self.inner.lock().expect("fair queue lock poisoned");
        let now = self.clock.now_ns();
        let started = packet.dispatched_at_ns().unwrap_or(now);
        let actual = Duration::from_nanos(now.saturating_sub(started));
        engine.finish(packet, actual, now)
    }

    /// Returns the virtual time as of the last sync.
    pub fn virtual_time(&self) -> VirtualTime {
        self.inner
            .lock()
            .expect("fair queue lock poisoned")
            .virtual_time()
    }

    /// Returns scheduler statistics.
    pub fn stats(&self) -> FairQueueStats {
        self.inner.lock().expect("fair queue lock poisoned").stats()
    }

    /// Returns a consistent view of every queue; see [`FairQueue::snapshot`].
    pub fn snapshot(&self) -> Vec<QueueSnapshot> {
        self.inner
            .lock()
            .expect("fair queue lock poisoned")
            .snapshot()
    }

    /// Returns the number of pending packets.
    pub fn pending(&self) -> usize {
        self.inner
            .lock()
            .expect("fair queue lock poisoned")
            .total_pending()
    }

    /// Returns the number of in-service packets.
    pub fn in_service(&self) -> usize {
        self.inner
            .lock()
            .expect("fair queue lock poisoned")
            .total_in_service()
    }
}
