//! Virtual-time fair queue.
//!
//! Implements the fair-queuing engine: a fixed set of per-flow FIFOs, a
//! global virtual clock, and selection of the queue whose head packet has
//! the smallest virtual finish time.
//!
//! The virtual clock advances at `min(reqs, C) / NEQ` virtual nanoseconds
//! per real nanosecond, where `reqs` counts pending plus in-service packets,
//! `C` is the concurrency limit and `NEQ` the number of non-idle queues.
//! With no active queue the clock is frozen.
//!
//! This type is single-threaded and takes the current real time as an
//! explicit argument, so simulations can drive it deterministically. See
//! [`crate::FairQueueScheduler`] for the locked, clock-driven wrapper.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use helix_core::{FlowKey, Limits, PacketId};
use tracing::{debug, trace};

use crate::clock::duration_to_nanos;
use crate::config::{FairQueueConfig, SyncPolicy};
use crate::error::{FqError, FqResult};
use crate::packet::{Completion, Packet};
use crate::queue::{FlowQueue, QueueSnapshot};
use crate::virtual_time::{VirtualTime, VirtualTimeRatio};

/// Source of engine instance numbers. Zero is never issued.
static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// The fair-queuing engine.
#[derive(Debug)]
pub struct FairQueue<T> {
    /// Process-unique instance number, stamped on every packet issued.
    instance: u64,

    /// Per-flow queues, fixed at construction.
    queues: Vec<FlowQueue<T>>,

    /// Flow key -> index into `queues`.
    index: HashMap<FlowKey, usize>,

    /// Configuration.
    config: FairQueueConfig,

    /// Global virtual clock.
    virtual_time: VirtualTime,

    /// Real time of the last sync, in clock nanoseconds.
    last_real_ns: u64,

    /// Index of the queue visited first by the next selection scan.
    cursor: usize,

    /// Next packet ID to assign.
    next_packet: PacketId,

    /// Pending packets across all queues.
    pending: usize,

    /// In-service packets across all queues.
    in_service: usize,

    /// Non-idle queues (`NEQ`).
    active_queues: usize,

    /// Total packets enqueued.
    total_enqueued: u64,

    /// Total packets dequeued.
    total_dequeued: u64,

    /// Total packets finished.
    total_finished: u64,

    /// Total enqueues rejected.
    total_rejected: u64,
}

impl<T> FairQueue<T> {
    /// Creates a fair queue with one queue per flow key.
    ///
    /// # Arguments
    ///
    /// * `flows` - The fixed set of flow keys, one queue each.
    /// * `config` - Scheduler configuration.
    /// * `now_ns` - Current real time; the virtual clock starts at zero here.
    ///
    /// # Errors
    ///
    /// Returns `FqError::InvalidConfig` if the configuration is invalid or
    /// there are more flows than `limits.max_queues`, and
    /// `FqError::DuplicateQueue` if a key is repeated.
    pub fn new(
        flows: impl IntoIterator<Item = FlowKey>,
        config: FairQueueConfig,
        now_ns: u64,
    ) -> FqResult<Self> {
        config.validate()?;

        let mut queues = Vec::new();
        let mut index = HashMap::new();
        for flow in flows {
            if index.insert(flow, queues.len()).is_some() {
                return Err(FqError::DuplicateQueue { flow });
            }
            queues.push(FlowQueue::new(flow));
        }
        Limits::check(
            "max_queues",
            u64::from(config.limits.max_queues),
            queues.len() as u64,
        )?;

        debug!(
            queues = queues.len(),
            concurrency_limit = config.concurrency_limit,
            service_quantum_ns = config.service_quantum_ns(),
            "fair queue created"
        );

        Ok(Self {
            instance: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            queues,
            index,
            config,
            virtual_time: VirtualTime::ZERO,
            last_real_ns: now_ns,
            cursor: 0,
            next_packet: PacketId::new(0),
            pending: 0,
            in_service: 0,
            active_queues: 0,
            total_enqueued: 0,
            total_dequeued: 0,
            total_finished: 0,
            total_rejected: 0,
        })
    }

    /// Creates a fair queue with flows keyed `0..count`.
    ///
    /// # Errors
    ///
    /// See [`FairQueue::new`].
    pub fn with_flow_count(count: u64, config: FairQueueConfig, now_ns: u64) -> FqResult<Self> {
        Self::new((0..count).map(FlowKey::new), config, now_ns)
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &FairQueueConfig {
        &self.config
    }

    /// Returns the current virtual time (as of the last sync).
    #[must_use]
    pub const fn virtual_time(&self) -> VirtualTime {
        self.virtual_time
    }

    /// Returns the current virtual-time ratio `min(reqs, C) / NEQ`.
    #[must_use]
    pub fn virtual_time_ratio(&self) -> VirtualTimeRatio {
        VirtualTimeRatio::new(
            (self.pending + self.in_service) as u64,
            u64::from(self.config.concurrency_limit),
            self.active_queues as u64,
        )
    }

    /// Advances the virtual clock to real time `now_ns`.
    ///
    /// Integrates the current ratio over the real time elapsed since the
    /// previous sync. A reading earlier than the previous one counts as
    /// zero elapsed time.
    pub fn sync(&mut self, now_ns: u64) {
        let elapsed = now_ns.saturating_sub(self.last_real_ns);
        self.last_real_ns = self.last_real_ns.max(now_ns);

        let ratio = self.virtual_time_ratio();
        if elapsed == 0 || ratio.is_frozen() {
            return;
        }
        self.virtual_time = self.virtual_time.saturating_add(ratio.advance(elapsed));
        trace!(
            elapsed_ns = elapsed,
            ratio = ratio.as_f64(),
            virtual_time = %self.virtual_time,
            "virtual clock synced"
        );
    }

    /// Enqueues `payload` on `flow`, charging the default estimate `G`.
    ///
    /// # Errors
    ///
    /// Returns `FqError::NoSuchQueue` if `flow` has no queue and
    /// `FqError::QueueFull` if the queue is at capacity. Nothing is
    /// modified on error.
    pub fn enqueue(&mut self, flow: FlowKey, payload: T, now_ns: u64) -> FqResult<PacketId> {
        let estimate = self.config.service_quantum;
        self.enqueue_with_estimate(flow, payload, estimate, now_ns)
    }

    /// Enqueues `payload` on `flow` with a per-packet service estimate.
    ///
    /// A zero estimate is replaced by `G`; estimates are capped at
    /// `limits.max_service_quantum_ns`.
    ///
    /// # Errors
    ///
    /// Returns `FqError::NoSuchQueue` if `flow` has no queue and
    /// `FqError::QueueFull` if the queue is at capacity. Nothing is
    /// modified on error.
    pub fn enqueue_with_estimate(
        &mut self,
        flow: FlowKey,
        payload: T,
        estimate: Duration,
        now_ns: u64,
    ) -> FqResult<PacketId> {
        let Some(&slot) = self.index.get(&flow) else {
            self.total_rejected += 1;
            return Err(FqError::NoSuchQueue { flow });
        };
        let depth = self.queues[slot].pending_len();
        if depth >= self.config.max_queue_depth {
            self.total_rejected += 1;
            return Err(FqError::QueueFull {
                flow,
                size: depth,
                max_size: self.config.max_queue_depth,
            });
        }

        // Sync before the occupancy change so the elapsed interval is
        // integrated at the ratio that was in effect during it.
        self.sync(now_ns);

        let estimate = self.clamp_estimate(estimate);
        let id = self.next_packet;
        self.next_packet = id.next();
        let virtual_time = self.virtual_time;

        let queue = &mut self.queues[slot];
        let was_idle = queue.is_idle();
        if was_idle {
            // Idle flows do not inherit stale backlog credit or debt.
            queue.restart_at(virtual_time);
        }
        let sequence = queue.next_sequence();
        let packet = Packet::new(id, flow, sequence, payload, estimate, now_ns, virtual_time)
            .issued_by(self.instance);
        queue.push(packet);

        if was_idle {
            self.active_queues += 1;
        }
        self.pending += 1;
        self.total_enqueued += 1;

        trace!(%flow, packet = %id, sequence, virtual_time = %virtual_time, "enqueued");
        Ok(id)
    }

    /// Dequeues the packet whose head virtual finish is globally smallest.
    ///
    /// Queues are scanned in round-robin order starting at the cursor; on
    /// a tie the first queue visited wins, and the cursor then moves past
    /// the winner so repeated ties rotate across flows.
    ///
    /// Returns `None`, without touching the virtual clock, if nothing is
    /// pending.
    pub fn dequeue(&mut self, now_ns: u64) -> Option<Packet<T>> {
        if self.pending == 0 {
            return None;
        }
        if self.config.sync_policy == SyncPolicy::EveryOperation {
            self.sync(now_ns);
        }

        let slot = self.select_queue()?;
        let queue = &mut self.queues[slot];
        let virtual_finish = queue.head_virtual_finish()?;
        let mut packet = queue.pop_for_service()?;
        packet.mark_dispatched(now_ns, virtual_finish);

        self.cursor = (slot + 1) % self.queues.len();
        self.pending -= 1;
        self.in_service += 1;
        self.total_dequeued += 1;

        trace!(
            flow = %packet.flow(),
            packet = %packet.id(),
            sequence = packet.sequence(),
            virtual_finish = %virtual_finish,
            "dequeued"
        );
        Some(packet)
    }

    /// Round-robin scan for the queue with the smallest head virtual finish.
    fn select_queue(&self) -> Option<usize> {
        let count = self.queues.len();
        let mut best: Option<(usize, VirtualTime)> = None;

        for offset in 0..count {
            let slot = (self.cursor + offset) % count;
            let Some(finish) = self.queues[slot].head_virtual_finish() else {
                continue;
            };
            // Strict comparison: the first minimum visited wins ties.
            if best.map_or(true, |(_, min)| finish < min) {
                best = Some((slot, finish));
            }
        }

        best.map(|(slot, _)| slot)
    }

    /// Finishes an in-service packet with its measured service time.
    ///
    /// The packet's queue has its virtual start corrected by
    /// `actual - estimate`: a packet that ran shorter than estimated gives
    /// its flow credit back, a longer one charges the difference.
    ///
    /// # Errors
    ///
    /// Returns `FqError::NoSuchQueue` if the packet's flow has no queue here
    /// and `FqError::NotInService` if the packet is not in service here (it
    /// was already finished, or was issued by another engine, even one whose
    /// packet with the same ID is in service). Nothing is modified on error.
    pub fn finish(
        &mut self,
        packet: Packet<T>,
        actual_service: Duration,
        now_ns: u64,
    ) -> FqResult<Completion<T>> {
        let flow = packet.flow();
        let id = packet.id();
        let slot = *self
            .index
            .get(&flow)
            .ok_or(FqError::NoSuchQueue { flow })?;
        if packet.origin() != self.instance || !self.queues[slot].is_in_service(id) {
            return Err(FqError::NotInService { flow, packet: id });
        }

        if self.config.sync_policy == SyncPolicy::EveryOperation {
            self.sync(now_ns);
        }

        let queue = &mut self.queues[slot];
        let estimated_service = queue
            .retire(id, actual_service)
            .ok_or(FqError::NotInService { flow, packet: id })?;
        if queue.is_idle() {
            self.active_queues -= 1;
        }
        self.in_service -= 1;
        self.total_finished += 1;

        let queueing_delay = packet.queueing_delay().unwrap_or_default();
        let sequence = packet.sequence();
        trace!(
            %flow,
            packet = %id,
            estimated_ns = duration_to_nanos(estimated_service),
            actual_ns = duration_to_nanos(actual_service),
            virtual_start = %self.queues[slot].virtual_start(),
            "finished"
        );

        Ok(Completion {
            packet: id,
            flow,
            sequence,
            estimated_service,
            actual_service,
            queueing_delay,
            payload: packet.into_payload(),
        })
    }

    /// Caps an estimate to the configured limit; zero means "use `G`".
    fn clamp_estimate(&self, estimate: Duration) -> Duration {
        if estimate.is_zero() {
            return self.config.service_quantum;
        }
        estimate.min(Duration::from_nanos(self.config.limits.max_service_quantum_ns))
    }

    /// Returns the queue for `flow`, if configured.
    #[must_use]
    pub fn queue(&self, flow: FlowKey) -> Option<&FlowQueue<T>> {
        self.index.get(&flow).map(|&slot| &self.queues[slot])
    }

    /// Returns the configured flow keys in slot order.
    pub fn flows(&self) -> impl Iterator<Item = FlowKey> + '_ {
        self.queues.iter().map(FlowQueue::key)
    }

    /// Returns the number of queues.
    #[must_use]
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// Returns the total number of pending packets.
    #[must_use]
    pub const fn total_pending(&self) -> usize {
        self.pending
    }

    /// Returns the total number of in-service packets.
    #[must_use]
    pub const fn total_in_service(&self) -> usize {
        self.in_service
    }

    /// Returns whether nothing is pending anywhere.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.pending == 0
    }

    /// Returns statistics about the fair queue.
    #[must_use]
    pub fn stats(&self) -> FairQueueStats {
        FairQueueStats {
            queues: self.queues.len(),
            active_queues: self.active_queues,
            pending: self.pending,
            in_service: self.in_service,
            virtual_time: self.virtual_time,
            total_enqueued: self.total_enqueued,
            total_dequeued: self.total_dequeued,
            total_finished: self.total_finished,
            total_rejected: self.total_rejected,
        }
    }

    /// Returns a view of every queue, ordered by head virtual finish.
    ///
    /// Queues without pending packets sort first (the virtual past), then
    /// the rest by ascending head virtual finish.
    #[must_use]
    pub fn snapshot(&self) -> Vec<QueueSnapshot> {
        let mut queues: Vec<QueueSnapshot> = self.queues.iter().map(FlowQueue::snapshot).collect();
        queues.sort_by_key(|q| (q.head_virtual_finish.is_some(), q.head_virtual_finish));
        queues
    }
}

/// Statistics about the fair queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FairQueueStats {
    /// Configured queues.
    pub queues: usize,
    /// Queues with pending or in-service packets (`NEQ`).
    pub active_queues: usize,
    /// Pending packets.
    pub pending: usize,
    /// In-service packets.
    pub in_service: usize,
    /// Virtual time as of the last sync.
    pub virtual_time: VirtualTime,
    /// Total packets enqueued.
    pub total_enqueued: u64,
    /// Total packets dequeued.
    pub total_dequeued: u64,
    /// Total packets finished.
    pub total_finished: u64,
    /// Total enqueues rejected.
    pub total_rejected: u64,
}
