//! Work items travelling through the scheduler.
//!
//! A [`Packet`] is owned by its queue while pending, by the caller of
//! `dequeue` while in service, and is consumed by `finish`. Packets carry
//! their flow key rather than a reference to their queue; the scheduler
//! resolves the queue by key whenever it needs queue state.

use std::time::Duration;

use helix_core::{FlowKey, PacketId};

use crate::virtual_time::VirtualTime;

/// A work item waiting for or undergoing service.
///
/// Packets are only created by the scheduler and are deliberately not
/// `Clone`: a packet handed out by `dequeue` can be finished at most once.
#[derive(Debug)]
pub struct Packet<T> {
    /// Instance number of the engine that issued the packet.
    origin: u64,
    id: PacketId,
    flow: FlowKey,
    sequence: u64,
    payload: T,
    estimated_service: Duration,
    enqueued_at_ns: u64,
    virtual_enqueue: VirtualTime,
    dispatched_at_ns: Option<u64>,
    virtual_finish: Option<VirtualTime>,
}

impl<T> Packet<T> {
    pub(crate) const fn new(
        id: PacketId,
        flow: FlowKey,
        sequence: u64,
        payload: T,
        estimated_service: Duration,
        enqueued_at_ns: u64,
        virtual_enqueue: VirtualTime,
    ) -> Self {
        Self {
            origin: 0,
            id,
            flow,
            sequence,
            payload,
            estimated_service,
            enqueued_at_ns,
            virtual_enqueue,
            dispatched_at_ns: None,
            virtual_finish: None,
        }
    }

    /// Stamps the packet with the issuing engine's instance number.
    pub(crate) fn issued_by(mut self, origin: u64) -> Self {
        self.origin = origin;
        self
    }

    pub(crate) const fn origin(&self) -> u64 {
        self.origin
    }

    /// Scheduler-assigned packet ID.
    #[must_use]
    pub const fn id(&self) -> PacketId {
        self.id
    }

    /// The flow this packet belongs to.
    #[must_use]
    pub const fn flow(&self) -> FlowKey {
        self.flow
    }

    /// Per-flow arrival number, starting at 1.
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Borrows the payload.
    #[must_use]
    pub const fn payload(&self) -> &T {
        &self.payload
    }

    /// Mutably borrows the payload.
    pub fn payload_mut(&mut self) -> &mut T {
        &mut self.payload
    }

    /// Service time assumed for fairness accounting before the actual
    /// duration is known.
    #[must_use]
    pub const fn estimated_service(&self) -> Duration {
        self.estimated_service
    }

    /// Real time (clock nanoseconds) at which the packet was enqueued.
    #[must_use]
    pub const fn enqueued_at_ns(&self) -> u64 {
        self.enqueued_at_ns
    }

    /// Virtual time at which the packet was enqueued.
    #[must_use]
    pub const fn virtual_enqueue(&self) -> VirtualTime {
        self.virtual_enqueue
    }

    /// Real time at which the packet was dequeued, if it has been.
    #[must_use]
    pub const fn dispatched_at_ns(&self) -> Option<u64> {
        self.dispatched_at_ns
    }

    /// Virtual finish time the packet was selected with, if dequeued.
    #[must_use]
    pub const fn virtual_finish(&self) -> Option<VirtualTime> {
        self.virtual_finish
    }

    pub(crate) fn mark_dispatched(&mut self, now_ns: u64, virtual_finish: VirtualTime) {
        self.dispatched_at_ns = Some(now_ns);
        self.virtual_finish = Some(virtual_finish);
    }

    /// Real time spent queued before dispatch, if dispatched.
    #[must_use]
    pub fn queueing_delay(&self) -> Option<Duration> {
        self.dispatched_at_ns
            .map(|at| Duration::from_nanos(at.saturating_sub(self.enqueued_at_ns)))
    }

    pub(crate) fn into_payload(self) -> T {
        self.payload
    }
}

/// The result of finishing a packet.
#[derive(Debug)]
pub struct Completion<T> {
    /// The finished packet's ID.
    pub packet: PacketId,
    /// The packet's flow.
    pub flow: FlowKey,
    /// The packet's per-flow arrival number.
    pub sequence: u64,
    /// Estimate charged when the packet was dequeued.
    pub estimated_service: Duration,
    /// Actual service time the flow was corrected to.
    pub actual_service: Duration,
    /// Real time spent queued before dispatch.
    pub queueing_delay: Duration,
    /// The payload, handed back to the caller.
    pub payload: T,
}
