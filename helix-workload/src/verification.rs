//! Verification logic for detecting ordering and fairness violations.
//!
//! Implements checks over a dispatch [`History`]:
//! - Ordering violations (a flow's packets dispatched out of arrival order)
//! - Lost work (enqueued units never dispatched)
//! - Unfinished packets (dispatched but never completed)
//!
//! and measures fair share: each flow's share of the units served while
//! every flow had work outstanding, against the equal ideal share.

use std::collections::{BTreeMap, BTreeSet};

use helix_core::FlowKey;

use crate::history::History;

/// A violation of an expected property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A flow's packet was dispatched out of arrival order.
    OutOfOrder {
        /// The flow.
        flow: FlowKey,
        /// Ordinal expected next.
        expected: u64,
        /// Ordinal actually dispatched.
        actual: u64,
    },

    /// Units were enqueued but never dispatched.
    LostWork {
        /// The flow.
        flow: FlowKey,
        /// Units enqueued.
        enqueued_units: u64,
        /// Units dispatched.
        dispatched_units: u64,
    },

    /// A dispatched packet never finished.
    Unfinished {
        /// The flow.
        flow: FlowKey,
        /// The packet's ordinal.
        ordinal: u64,
    },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OutOfOrder {
                flow,
                expected,
                actual,
            } => write!(
                f,
                "Out of order: {flow} dispatched #{actual}, expected #{expected}"
            ),
            Self::LostWork {
                flow,
                enqueued_units,
                dispatched_units,
            } => write!(
                f,
                "Lost work: {flow} enqueued {enqueued_units} units, dispatched {dispatched_units}"
            ),
            Self::Unfinished { flow, ordinal } => {
                write!(f, "Unfinished: {flow} #{ordinal} was dispatched but never finished")
            }
        }
    }
}

/// One flow's share of the measurement window.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowShare {
    /// The flow.
    pub flow: FlowKey,
    /// Units served inside the window.
    pub window_units: u64,
    /// Ideal share in percent.
    pub ideal_percent: f64,
    /// Actual share in percent.
    pub actual_percent: f64,
}

/// Fair-share measurement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FairnessReport {
    /// Units served while every flow was active.
    pub window_units: u64,
    /// Per-flow shares, in flow key order.
    pub flows: Vec<FlowShare>,
    /// Root of the summed squared differences between actual and ideal
    /// share, in percentage points.
    pub deviation: f64,
}

impl FairnessReport {
    /// Returns true if the window contained any work.
    #[must_use]
    pub const fn is_measurable(&self) -> bool {
        self.window_units > 0
    }

    /// Returns the share of `flow`, if it took part.
    #[must_use]
    pub fn share(&self, flow: FlowKey) -> Option<&FlowShare> {
        self.flows.iter().find(|s| s.flow == flow)
    }
}

/// Verification engine.
pub struct Verification;

impl Verification {
    /// Runs the ordering and completeness checks.
    #[must_use]
    pub fn verify(history: &History) -> Vec<Violation> {
        let mut violations = Vec::new();
        violations.extend(Self::check_ordering(history));
        violations.extend(Self::check_lost_work(history));
        violations.extend(Self::check_unfinished(history));
        violations
    }

    /// Checks that each flow's ordinals are dispatched as 1, 2, 3, ...
    fn check_ordering(history: &History) -> Vec<Violation> {
        let mut violations = Vec::new();
        let mut last: BTreeMap<FlowKey, u64> = BTreeMap::new();

        for record in history.records() {
            let previous = last.entry(record.flow).or_insert(0);
            if record.ordinal != *previous + 1 {
                violations.push(Violation::OutOfOrder {
                    flow: record.flow,
                    expected: *previous + 1,
                    actual: record.ordinal,
                });
            }
            *previous = record.ordinal;
        }

        violations
    }

    /// Checks that every enqueued unit was dispatched.
    fn check_lost_work(history: &History) -> Vec<Violation> {
        let mut dispatched: BTreeMap<FlowKey, u64> = BTreeMap::new();
        for record in history.records() {
            *dispatched.entry(record.flow).or_insert(0) += record.units;
        }

        history
            .flows()
            .filter_map(|(flow, totals)| {
                let units = dispatched.get(&flow).copied().unwrap_or(0);
                (units != totals.units).then_some(Violation::LostWork {
                    flow,
                    enqueued_units: totals.units,
                    dispatched_units: units,
                })
            })
            .collect()
    }

    /// Checks that every dispatch finished.
    fn check_unfinished(history: &History) -> Vec<Violation> {
        history
            .records()
            .iter()
            .filter(|r| r.finished_at_ns.is_none())
            .map(|r| Violation::Unfinished {
                flow: r.flow,
                ordinal: r.ordinal,
            })
            .collect()
    }

    /// Measures each flow's share of the units served while all flows were
    /// active.
    ///
    /// A flow becomes active at its first dispatch and stops being active
    /// once its dispatched units reach its enqueued total. Units are counted
    /// only while every flow is active, so start-up and drain-down phases
    /// (where fewer flows compete) do not skew the result. All flows have
    /// equal weight, so the ideal share is `100 / flows` percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Reporting only.
    pub fn fairness(history: &History) -> FairnessReport {
        let flow_count = history.flow_count();
        if flow_count == 0 {
            return FairnessReport::default();
        }

        let mut active: BTreeSet<FlowKey> = BTreeSet::new();
        let mut served: BTreeMap<FlowKey, u64> = BTreeMap::new();
        let mut window: BTreeMap<FlowKey, u64> = BTreeMap::new();
        let mut window_units = 0;

        for record in history.records() {
            let served_units = served.entry(record.flow).or_insert(0);
            if *served_units == 0 {
                active.insert(record.flow);
            }
            *served_units += record.units;

            if active.len() == flow_count {
                *window.entry(record.flow).or_insert(0) += record.units;
                window_units += record.units;
            }

            if *served_units >= history.enqueued(record.flow).units {
                active.remove(&record.flow);
            }
        }

        let ideal_percent = 100.0 / flow_count as f64;
        let flows: Vec<FlowShare> = history
            .flows()
            .map(|(flow, _)| {
                let units = window.get(&flow).copied().unwrap_or(0);
                let actual_percent = if window_units == 0 {
                    0.0
                } else {
                    units as f64 / window_units as f64 * 100.0
                };
                FlowShare {
                    flow,
                    window_units: units,
                    ideal_percent,
                    actual_percent,
                }
            })
            .collect();

        let deviation = flows
            .iter()
            .map(|s| (s.ideal_percent - s.actual_percent).powi(2))
            .sum::<f64>()
            .sqrt();

        FairnessReport {
            window_units,
            flows,
            deviation,
        }
    }
}
