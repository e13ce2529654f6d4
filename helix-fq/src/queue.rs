//! Per-flow queues.
//!
//! Each flow owns one FIFO of pending packets plus the set of its packets
//! currently in service. The queue's virtual start is the virtual time at
//! which its head packet starts service for fairness accounting; the head
//! packet's virtual finish is `virtual_start + estimate(head)`.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use helix_core::{FlowKey, PacketId};

use crate::packet::Packet;
use crate::virtual_time::VirtualTime;

/// The last virtual finish time of a queue.
///
/// A queue with nothing pending and nothing in service is in the virtual
/// past: it sorts before every live value, and it can never claim capacity
/// because it was busy earlier. Variant order gives that ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LastFinish {
    /// Fully idle queue.
    VirtualPast,
    /// Finish time of the last pending packet, or the virtual start when
    /// only in-service packets remain.
    At(VirtualTime),
}

/// One FIFO per flow.
#[derive(Debug)]
pub struct FlowQueue<T> {
    key: FlowKey,
    pending: VecDeque<Packet<T>>,
    /// Dequeued but not finished: packet -> estimate charged at dequeue.
    in_service: HashMap<PacketId, Duration>,
    virtual_start: VirtualTime,
    /// Sum of the pending packets' estimates.
    pending_estimate: VirtualTime,
    last_sequence: u64,
}

impl<T> FlowQueue<T> {
    /// Creates an idle queue for `key`.
    #[must_use]
    pub fn new(key: FlowKey) -> Self {
        Self {
            key,
            pending: VecDeque::new(),
            in_service: HashMap::new(),
            virtual_start: VirtualTime::ZERO,
            pending_estimate: VirtualTime::ZERO,
            last_sequence: 0,
        }
    }

    /// The flow served by this queue.
    #[must_use]
    pub const fn key(&self) -> FlowKey {
        self.key
    }

    /// Number of pending packets.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Number of packets dequeued but not yet finished.
    #[must_use]
    pub fn in_service_len(&self) -> usize {
        self.in_service.len()
    }

    /// Returns true if the queue has pending packets.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Returns true if the queue has neither pending nor in-service packets.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_service.is_empty()
    }

    /// Returns true if `packet` is in service from this queue.
    #[must_use]
    pub fn is_in_service(&self, packet: PacketId) -> bool {
        self.in_service.contains_key(&packet)
    }

    /// The queue's virtual start.
    #[must_use]
    pub const fn virtual_start(&self) -> VirtualTime {
        self.virtual_start
    }

    /// Virtual finish of the pending packet at `position` (0 = head).
    ///
    /// This is the virtual start plus the estimates of every packet up to
    /// and including `position`; for a uniform estimate `G` it is
    /// `(position + 1) * G + virtual_start`.
    #[must_use]
    pub fn virtual_finish(&self, position: usize) -> Option<VirtualTime> {
        if position >= self.pending.len() {
            return None;
        }
        let finish = self
            .pending
            .iter()
            .take(position + 1)
            .fold(self.virtual_start, |acc, packet| {
                acc.saturating_add(VirtualTime::from_duration(packet.estimated_service()))
            });
        Some(finish)
    }

    /// Virtual finish of the head packet, the only selection candidate.
    #[must_use]
    pub fn head_virtual_finish(&self) -> Option<VirtualTime> {
        self.pending.front().map(|head| {
            self.virtual_start
                .saturating_add(VirtualTime::from_duration(head.estimated_service()))
        })
    }

    /// The queue's last virtual finish. Constant time.
    #[must_use]
    pub fn last_virtual_finish(&self) -> LastFinish {
        if self.is_idle() {
            return LastFinish::VirtualPast;
        }
        LastFinish::At(self.virtual_start.saturating_add(self.pending_estimate))
    }

    /// Allocates the next per-flow sequence number.
    pub(crate) fn next_sequence(&mut self) -> u64 {
        self.last_sequence += 1;
        self.last_sequence
    }

    /// Restarts an idle queue at the current virtual time.
    pub(crate) fn restart_at(&mut self, virtual_time: VirtualTime) {
        debug_assert!(self.is_idle(), "only an idle queue may be restarted");
        self.virtual_start = virtual_time;
    }

    /// Appends a packet to the tail.
    pub(crate) fn push(&mut self, packet: Packet<T>) {
        self.pending_estimate = self
            .pending_estimate
            .saturating_add(VirtualTime::from_duration(packet.estimated_service()));
        self.pending.push_back(packet);
    }

    /// Pops the head packet into service.
    ///
    /// The packet's estimate is charged immediately: the virtual start
    /// advances by it, pre-paying the virtual cost of service.
    pub(crate) fn pop_for_service(&mut self) -> Option<Packet<T>> {
        let packet = self.pending.pop_front()?;
        let estimate = packet.estimated_service();
        self.pending_estimate = if self.pending.is_empty() {
            VirtualTime::ZERO
        } else {
            self.pending_estimate.saturating_sub(VirtualTime::from_duration(estimate))
        };
        self.in_service.insert(packet.id(), estimate);
        self.virtual_start = self
            .virtual_start
            .saturating_add(VirtualTime::from_duration(estimate));
        Some(packet)
    }

    /// Retires an in-service packet, correcting the virtual start from the
    /// estimate to the actual service time.
    ///
    /// Returns the estimate that was charged, or `None` if the packet was
    /// not in service.
    pub(crate) fn retire(&mut self, packet: PacketId, actual: Duration) -> Option<Duration> {
        let estimate = self.in_service.remove(&packet)?;
        // virtual_start -= (estimate - actual)
        self.virtual_start = self
            .virtual_start
            .saturating_sub(VirtualTime::from_duration(estimate))
            .saturating_add(VirtualTime::from_duration(actual));
        Some(estimate)
    }

    /// Returns a point-in-time view of the queue.
    #[must_use]
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            flow: self.key,
            pending: self.pending.len(),
            in_service: self.in_service.len(),
            virtual_start: self.virtual_start,
            head_virtual_finish: self.head_virtual_finish(),
            last_virtual_finish: self.last_virtual_finish(),
        }
    }
}

/// Point-in-time view of one queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSnapshot {
    /// The flow served by the queue.
    pub flow: FlowKey,
    /// Pending packets.
    pub pending: usize,
    /// In-service packets.
    pub in_service: usize,
    /// Virtual start.
    pub virtual_start: VirtualTime,
    /// Virtual finish of the head packet, if any.
    pub head_virtual_finish: Option<VirtualTime>,
    /// Last virtual finish.
    pub last_virtual_finish: LastFinish,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(queue: &mut FlowQueue<u32>, id: u64, estimate_ns: u64) -> Packet<u32> {
        let sequence = queue.next_sequence();
        Packet::new(
            PacketId::new(id),
            queue.key(),
            sequence,
            0,
            Duration::from_nanos(estimate_ns),
            0,
            VirtualTime::ZERO,
        )
    }

    #[test]
    fn test_new_queue_is_in_virtual_past() {
        let queue: FlowQueue<u32> = FlowQueue::new(FlowKey::new(1));
        assert!(queue.is_idle());
        assert_eq!(queue.last_virtual_finish(), LastFinish::VirtualPast);
        assert_eq!(queue.head_virtual_finish(), None);
    }

    #[test]
    fn test_virtual_finish_by_position() {
        let mut queue = FlowQueue::new(FlowKey::new(1));
        for id in 0..3 {
            let p = packet(&mut queue, id, 100);
            queue.push(p);
        }

        assert_eq!(queue.virtual_finish(0), Some(VirtualTime::from_nanos(100)));
        assert_eq!(queue.virtual_finish(2), Some(VirtualTime::from_nanos(300)));
        assert_eq!(queue.virtual_finish(3), None);
        assert_eq!(queue.head_virtual_finish(), queue.virtual_finish(0));
        assert_eq!(
            queue.last_virtual_finish(),
            LastFinish::At(VirtualTime::from_nanos(300))
        );
    }

    #[test]
    fn test_mixed_estimates_sum() {
        let mut queue = FlowQueue::new(FlowKey::new(1));
        let a = packet(&mut queue, 0, 100);
        let b = packet(&mut queue, 1, 40);
        queue.push(a);
        queue.push(b);

        assert_eq!(queue.virtual_finish(1), Some(VirtualTime::from_nanos(140)));
    }

    #[test]
    fn test_pop_charges_estimate_and_tracks_service() {
        let mut queue = FlowQueue::new(FlowKey::new(1));
        let p = packet(&mut queue, 7, 100);
        queue.push(p);

        let popped = queue.pop_for_service().unwrap();
        assert_eq!(popped.sequence(), 1);
        assert_eq!(queue.virtual_start(), VirtualTime::from_nanos(100));
        assert!(queue.is_in_service(PacketId::new(7)));
        assert!(!queue.is_idle());

        // Empty but executing: last finish is the virtual start itself.
        assert_eq!(
            queue.last_virtual_finish(),
            LastFinish::At(VirtualTime::from_nanos(100))
        );
    }

    #[test]
    fn test_retire_corrects_virtual_start() {
        let mut queue = FlowQueue::new(FlowKey::new(1));
        let p = packet(&mut queue, 0, 100);
        queue.push(p);
        queue.pop_for_service().unwrap();

        // Took 30ns instead of 100ns: the flow gets 70ns of credit back.
        let charged = queue.retire(PacketId::new(0), Duration::from_nanos(30));
        assert_eq!(charged, Some(Duration::from_nanos(100)));
        assert_eq!(queue.virtual_start(), VirtualTime::from_nanos(30));
        assert!(queue.is_idle());

        // Second retire of the same packet is rejected.
        assert_eq!(queue.retire(PacketId::new(0), Duration::from_nanos(30)), None);
        assert_eq!(queue.virtual_start(), VirtualTime::from_nanos(30));
    }

    #[test]
    fn test_overrun_pushes_virtual_start_forward() {
        let mut queue = FlowQueue::new(FlowKey::new(1));
        let p = packet(&mut queue, 0, 100);
        queue.push(p);
        queue.pop_for_service().unwrap();

        queue.retire(PacketId::new(0), Duration::from_nanos(250));
        assert_eq!(queue.virtual_start(), VirtualTime::from_nanos(250));
    }

    #[test]
    fn test_last_finish_tracks_pops_and_pushes() {
        let mut queue = FlowQueue::new(FlowKey::new(1));
        for (id, estimate) in [(0, 100), (1, 40), (2, 60)] {
            let p = packet(&mut queue, id, estimate);
            queue.push(p);
        }
        assert_eq!(
            queue.last_virtual_finish(),
            LastFinish::At(VirtualTime::from_nanos(200))
        );

        queue.pop_for_service().unwrap();
        // Start moved by 100, remaining estimates sum to 100.
        assert_eq!(
            queue.last_virtual_finish(),
            LastFinish::At(VirtualTime::from_nanos(200))
        );
        assert_eq!(
            queue.last_virtual_finish(),
            LastFinish::At(queue.virtual_finish(queue.pending_len() - 1).unwrap())
        );

        queue.pop_for_service().unwrap();
        queue.pop_for_service().unwrap();
        assert_eq!(
            queue.last_virtual_finish(),
            LastFinish::At(VirtualTime::from_nanos(200))
        );
        let p = packet(&mut queue, 3, 10);
        queue.push(p);
        assert_eq!(
            queue.last_virtual_finish(),
            LastFinish::At(VirtualTime::from_nanos(210))
        );
    }

    #[test]
    fn test_virtual_past_sorts_first() {
        assert!(LastFinish::VirtualPast < LastFinish::At(VirtualTime::MIN));
    }

    #[test]
    fn test_sequences_increase() {
        let mut queue: FlowQueue<u32> = FlowQueue::new(FlowKey::new(1));
        assert_eq!(queue.next_sequence(), 1);
        assert_eq!(queue.next_sequence(), 2);
    }
}
