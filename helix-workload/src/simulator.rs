//! Discrete-event simulator.
//!
//! Drives a [`FairQueueScheduler`] on a [`ManualClock`]: packets arrive at
//! their generated times, up to `servers` packets are in service at once,
//! and the clock jumps straight to the next arrival or completion. Every
//! run with the same arrivals is identical.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use helix_fq::{Clock, FairQueueScheduler, FqError, ManualClock, Packet, VirtualTime};
use tracing::{debug, trace};

use crate::history::History;
use crate::workload::{Arrival, WorkItem, WorkloadConfig};

/// Simulation errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    /// The scheduler rejected an operation.
    #[error("scheduler error: {0}")]
    Scheduler(#[from] FqError),
    /// The workload asks for zero servers.
    #[error("at least one server is required")]
    NoServers,
}

/// Result of a simulation run.
#[derive(Debug)]
pub struct SimulationOutcome {
    /// Dispatch history.
    pub history: History,
    /// Virtual time when the last packet finished.
    pub virtual_time: VirtualTime,
}

/// A packet in service, ordered by completion time.
struct Running {
    end_ns: u64,
    slot: u64,
    record: usize,
    packet: Packet<WorkItem>,
}

impl PartialEq for Running {
    fn eq(&self, other: &Self) -> bool {
        (self.end_ns, self.slot) == (other.end_ns, other.slot)
    }
}

impl Eq for Running {}

impl PartialOrd for Running {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Running {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.end_ns, self.slot).cmp(&(other.end_ns, other.slot))
    }
}

/// Discrete-event executor over a manual clock.
pub struct Simulator {
    scheduler: FairQueueScheduler<WorkItem, ManualClock>,
    clock: ManualClock,
    servers: usize,
    running: BinaryHeap<Reverse<Running>>,
    next_slot: u64,
    history: History,
}

impl Simulator {
    /// Creates a simulator for `config`, starting at time zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler configuration is invalid or no
    /// servers are configured.
    pub fn new(config: &WorkloadConfig) -> Result<Self, SimulationError> {
        if config.servers == 0 {
            return Err(SimulationError::NoServers);
        }
        let clock = ManualClock::new(0);
        let scheduler = FairQueueScheduler::with_flow_count(
            config.queue_count(),
            config.scheduler.clone(),
            clock.clone(),
        )?;

        Ok(Self {
            scheduler,
            clock,
            servers: config.servers,
            running: BinaryHeap::new(),
            next_slot: 0,
            history: History::new(),
        })
    }

    /// Returns the scheduler under simulation.
    #[must_use]
    pub const fn scheduler(&self) -> &FairQueueScheduler<WorkItem, ManualClock> {
        &self.scheduler
    }

    /// Runs until every arrival has been served.
    ///
    /// `arrivals` must be sorted by arrival time.
    ///
    /// # Errors
    ///
    /// Returns the scheduler's error if it rejects an enqueue or finish.
    pub fn run(mut self, arrivals: &[Arrival]) -> Result<SimulationOutcome, SimulationError> {
        let mut next_arrival = 0;

        loop {
            let now = self.clock.now_ns();

            while let Some(arrival) = arrivals.get(next_arrival).filter(|a| a.at_ns <= now) {
                self.scheduler.enqueue(arrival.flow, arrival.item)?;
                self.history.record_enqueue(arrival.flow, arrival.item.units);
                next_arrival += 1;
            }

            self.dispatch(now);

            let upcoming_arrival = arrivals.get(next_arrival).map(|a| a.at_ns);
            let upcoming_completion = self.running.peek().map(|Reverse(r)| r.end_ns);
            let next = match (upcoming_arrival, upcoming_completion) {
                (Some(a), Some(c)) => a.min(c),
                (Some(t), None) | (None, Some(t)) => t,
                (None, None) => break,
            };

            self.clock.set_ns(next);
            self.complete_due(next)?;
        }

        let virtual_time = self.scheduler.virtual_time();
        debug!(
            dispatched = self.history.records().len(),
            end_ns = self.clock.now_ns(),
            virtual_time = %virtual_time,
            "simulation finished"
        );
        Ok(SimulationOutcome {
            history: self.history,
            virtual_time,
        })
    }

    /// Fills free servers from the scheduler.
    fn dispatch(&mut self, now: u64) {
        while self.running.len() < self.servers {
            let Some(packet) = self.scheduler.dequeue() else {
                break;
            };
            let record = self.history.record_dispatch(&packet, now);
            let end_ns = now.saturating_add(packet.payload().units);
            trace!(flow = %packet.flow(), ordinal = packet.payload().ordinal, end_ns, "dispatch");

            self.running.push(Reverse(Running {
                end_ns,
                slot: self.next_slot,
                record,
                packet,
            }));
            self.next_slot += 1;
        }
    }

    /// Finishes every packet whose service ends at or before `now`.
    fn complete_due(&mut self, now: u64) -> Result<(), SimulationError> {
        while self.running.peek().is_some_and(|Reverse(r)| r.end_ns <= now) {
            let Some(Reverse(running)) = self.running.pop() else {
                break;
            };
            // Service time is measured by the scheduler from its clock.
            self.scheduler.complete(running.packet)?;
            self.history.record_completion(running.record, now);
        }
        Ok(())
    }
}
