//! History recording for workload verification.
//!
//! Tracks every packet the simulator enqueued and every dispatch, in
//! dispatch order, indexed for the fairness and ordering checks.

use std::collections::BTreeMap;

use helix_core::FlowKey;
use helix_fq::{Packet, VirtualTime};

use crate::workload::WorkItem;

/// One dispatched packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    /// Flow the packet belongs to.
    pub flow: FlowKey,
    /// Generator-assigned ordinal within the flow, starting at 1.
    pub ordinal: u64,
    /// Units of work (simulated service nanoseconds).
    pub units: u64,
    /// Simulated time of enqueue.
    pub enqueued_at_ns: u64,
    /// Simulated time of dispatch.
    pub dispatched_at_ns: u64,
    /// Virtual finish the packet was selected with.
    pub virtual_finish: VirtualTime,
    /// Simulated time of completion, once finished.
    pub finished_at_ns: Option<u64>,
}

/// Per-flow totals at enqueue time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowTotals {
    /// Packets enqueued.
    pub packets: u64,
    /// Units enqueued.
    pub units: u64,
}

/// Summary counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    /// Packets enqueued.
    pub enqueued: u64,
    /// Packets dispatched.
    pub dispatched: u64,
    /// Packets finished.
    pub finished: u64,
    /// Units enqueued.
    pub units: u64,
}

/// Complete history of a workload execution.
#[derive(Debug, Default)]
pub struct History {
    /// Dispatches in order.
    records: Vec<DispatchRecord>,
    /// Enqueued totals per flow.
    enqueued: BTreeMap<FlowKey, FlowTotals>,
}

impl History {
    /// Creates a new empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an enqueue.
    pub fn record_enqueue(&mut self, flow: FlowKey, units: u64) {
        let totals = self.enqueued.entry(flow).or_default();
        totals.packets += 1;
        totals.units += units;
    }

    /// Records a dispatch and returns its index.
    pub fn record_dispatch(&mut self, packet: &Packet<WorkItem>, now_ns: u64) -> usize {
        let item = packet.payload();
        self.records.push(DispatchRecord {
            flow: packet.flow(),
            ordinal: item.ordinal,
            units: item.units,
            enqueued_at_ns: packet.enqueued_at_ns(),
            dispatched_at_ns: now_ns,
            virtual_finish: packet.virtual_finish().unwrap_or(VirtualTime::ZERO),
            finished_at_ns: None,
        });
        self.records.len() - 1
    }

    /// Records the completion of the dispatch at `index`.
    pub fn record_completion(&mut self, index: usize, now_ns: u64) {
        if let Some(record) = self.records.get_mut(index) {
            record.finished_at_ns = Some(now_ns);
        }
    }

    /// Dispatches in order.
    #[must_use]
    pub fn records(&self) -> &[DispatchRecord] {
        &self.records
    }

    /// Flows that enqueued work, with their totals, in key order.
    pub fn flows(&self) -> impl Iterator<Item = (FlowKey, FlowTotals)> + '_ {
        self.enqueued.iter().map(|(flow, totals)| (*flow, *totals))
    }

    /// Totals enqueued for `flow`.
    #[must_use]
    pub fn enqueued(&self, flow: FlowKey) -> FlowTotals {
        self.enqueued.get(&flow).copied().unwrap_or_default()
    }

    /// Number of flows that enqueued work.
    #[must_use]
    pub fn flow_count(&self) -> usize {
        self.enqueued.len()
    }

    /// Simulated time of the last completion.
    #[must_use]
    pub fn last_finish_ns(&self) -> u64 {
        self.records
            .iter()
            .filter_map(|r| r.finished_at_ns)
            .max()
            .unwrap_or(0)
    }

    /// Returns summary counts.
    #[must_use]
    pub fn stats(&self) -> HistoryStats {
        let totals = self.enqueued.values().fold(FlowTotals::default(), |acc, t| FlowTotals {
            packets: acc.packets + t.packets,
            units: acc.units + t.units,
        });
        HistoryStats {
            enqueued: totals.packets,
            dispatched: self.records.len() as u64,
            finished: self
                .records
                .iter()
                .filter(|r| r.finished_at_ns.is_some())
                .count() as u64,
            units: totals.units,
        }
    }

    /// Builds a history directly from records, for checker tests.
    #[cfg(test)]
    pub(crate) fn from_records(records: Vec<DispatchRecord>) -> Self {
        let mut history = Self::new();
        for record in &records {
            history.record_enqueue(record.flow, record.units);
        }
        history.records = records;
        history
    }
}

#[cfg(test)]
pub(crate) fn record(flow: u64, ordinal: u64, units: u64) -> DispatchRecord {
    DispatchRecord {
        flow: FlowKey::new(flow),
        ordinal,
        units,
        enqueued_at_ns: 0,
        dispatched_at_ns: 0,
        virtual_finish: VirtualTime::ZERO,
        finished_at_ns: Some(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enqueue_totals() {
        let mut history = History::new();
        history.record_enqueue(FlowKey::new(1), 3);
        history.record_enqueue(FlowKey::new(1), 4);
        history.record_enqueue(FlowKey::new(0), 1);

        assert_eq!(
            history.enqueued(FlowKey::new(1)),
            FlowTotals {
                packets: 2,
                units: 7
            }
        );
        assert_eq!(history.flow_count(), 2);
        let keys: Vec<u64> = history.flows().map(|(f, _)| f.get()).collect();
        assert_eq!(keys, vec![0, 1]);
        assert_eq!(history.stats().units, 8);
    }

    #[test]
    fn test_from_records_stats() {
        let mut records = vec![record(0, 1, 5), record(1, 1, 5)];
        records[1].finished_at_ns = None;
        let history = History::from_records(records);

        let stats = history.stats();
        assert_eq!(stats.enqueued, 2);
        assert_eq!(stats.dispatched, 2);
        assert_eq!(stats.finished, 1);
    }
}
