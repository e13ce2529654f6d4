//! Property definitions and checkers for fair-queue simulation tests.
//!
//! Properties are invariants that must hold after every engine operation.
//! The checker keeps its own model of per-flow occupancy and compares it
//! with what the engine reports.

use std::collections::BTreeMap;
use std::time::Duration;

use helix_core::FlowKey;
use helix_fq::{FairQueue, Packet, VirtualTime};

// ============================================================================
// Property Violation Types
// ============================================================================

/// A violation of a fair-queue property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyViolation {
    /// The virtual clock moved backwards.
    VirtualTimeRegressed {
        /// Virtual time before the operation.
        before: VirtualTime,
        /// Virtual time after the operation.
        after: VirtualTime,
    },
    /// An engine counter disagrees with the model.
    AccountingMismatch {
        /// Which counter.
        counter: &'static str,
        /// Value from the model.
        expected: usize,
        /// Value reported by the engine.
        actual: usize,
    },
    /// A flow's packets left the queue out of arrival order.
    OutOfOrder {
        /// The flow.
        flow: FlowKey,
        /// Expected per-flow sequence.
        expected: u64,
        /// Dequeued per-flow sequence.
        actual: u64,
    },
    /// Dequeue did not pick the smallest head virtual finish.
    SelectionNotMinimal {
        /// Smallest head virtual finish before the dequeue.
        expected: Option<VirtualTime>,
        /// Virtual finish of the dequeued packet.
        actual: Option<VirtualTime>,
    },
    /// A flow leaving the idle state did not restart at the virtual clock.
    IdleRestartMissed {
        /// The flow.
        flow: FlowKey,
        /// The queue's virtual start after the enqueue.
        virtual_start: VirtualTime,
        /// The virtual clock after the enqueue.
        virtual_time: VirtualTime,
    },
    /// Finishing a packet did not replace its estimate with the actual time.
    EstimateNotCorrected {
        /// The flow.
        flow: FlowKey,
        /// Expected virtual start after the finish.
        expected: VirtualTime,
        /// Virtual start after the finish.
        actual: VirtualTime,
    },
}

impl std::fmt::Display for PropertyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VirtualTimeRegressed { before, after } => {
                write!(f, "Virtual time regressed from {before} to {after}")
            }
            Self::AccountingMismatch {
                counter,
                expected,
                actual,
            } => {
                write!(f, "Counter {counter} is {actual}, expected {expected}")
            }
            Self::OutOfOrder {
                flow,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Flow {flow} dequeued sequence {actual}, expected {expected}"
                )
            }
            Self::SelectionNotMinimal { expected, actual } => {
                write!(
                    f,
                    "Dequeue selected finish {actual:?}, smallest was {expected:?}"
                )
            }
            Self::IdleRestartMissed {
                flow,
                virtual_start,
                virtual_time,
            } => {
                write!(
                    f,
                    "Flow {flow} restarted at {virtual_start}, virtual time is {virtual_time}"
                )
            }
            Self::EstimateNotCorrected {
                flow,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Flow {flow} virtual start is {actual} after finish, expected {expected}"
                )
            }
        }
    }
}

// ============================================================================
// Property Checker
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
struct FlowModel {
    pending: usize,
    in_service: usize,
    last_sequence: u64,
}

#[derive(Debug, Clone, Copy)]
struct FinishExpectation {
    flow: FlowKey,
    virtual_start: VirtualTime,
    estimate: Duration,
}

/// Tracks state across simulation for property verification.
///
/// Wrap each engine call with the matching `before_*`/`after_*` pair.
#[derive(Debug, Default)]
pub struct PropertyChecker {
    flows: BTreeMap<FlowKey, FlowModel>,
    last_virtual_time: VirtualTime,
    smallest_head_finish: Option<VirtualTime>,
    finishing: Option<FinishExpectation>,
    violations: Vec<PropertyViolation>,
}

impl PropertyChecker {
    /// Creates a new property checker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a successful enqueue on `flow`.
    ///
    /// `was_idle` is whether the flow had neither pending nor in-service
    /// packets before the enqueue.
    pub fn after_enqueue<T>(&mut self, engine: &FairQueue<T>, flow: FlowKey, was_idle: bool) {
        self.flows.entry(flow).or_default().pending += 1;

        if was_idle {
            if let Some(queue) = engine.queue(flow) {
                if queue.virtual_start() != engine.virtual_time() {
                    self.violations.push(PropertyViolation::IdleRestartMissed {
                        flow,
                        virtual_start: queue.virtual_start(),
                        virtual_time: engine.virtual_time(),
                    });
                }
            }
        }
        self.check_state(engine);
    }

    /// Captures the smallest head virtual finish ahead of a dequeue.
    pub fn before_dequeue<T>(&mut self, engine: &FairQueue<T>) {
        self.smallest_head_finish = engine
            .snapshot()
            .iter()
            .filter_map(|q| q.head_virtual_finish)
            .min();
    }

    /// Records the result of a dequeue.
    pub fn after_dequeue<T>(&mut self, engine: &FairQueue<T>, packet: Option<&Packet<T>>) {
        let expected = self.smallest_head_finish.take();
        let actual = packet.and_then(Packet::virtual_finish);
        if expected != actual {
            self.violations
                .push(PropertyViolation::SelectionNotMinimal { expected, actual });
        }

        if let Some(packet) = packet {
            let model = self.flows.entry(packet.flow()).or_default();
            if packet.sequence() != model.last_sequence + 1 {
                self.violations.push(PropertyViolation::OutOfOrder {
                    flow: packet.flow(),
                    expected: model.last_sequence + 1,
                    actual: packet.sequence(),
                });
            }
            model.last_sequence = packet.sequence();
            model.pending = model.pending.saturating_sub(1);
            model.in_service += 1;
        }
        self.check_state(engine);
    }

    /// Captures the packet's queue state ahead of a finish.
    pub fn before_finish<T>(&mut self, engine: &FairQueue<T>, packet: &Packet<T>) {
        self.finishing = engine.queue(packet.flow()).map(|queue| FinishExpectation {
            flow: packet.flow(),
            virtual_start: queue.virtual_start(),
            estimate: packet.estimated_service(),
        });
    }

    /// Records a successful finish measured at `actual`.
    pub fn after_finish<T>(&mut self, engine: &FairQueue<T>, actual: Duration) {
        if let Some(expectation) = self.finishing.take() {
            let expected = expectation
                .virtual_start
                .saturating_sub(VirtualTime::from_duration(expectation.estimate))
                .saturating_add(VirtualTime::from_duration(actual));
            if let Some(queue) = engine.queue(expectation.flow) {
                if queue.virtual_start() != expected {
                    self.violations.push(PropertyViolation::EstimateNotCorrected {
                        flow: expectation.flow,
                        expected,
                        actual: queue.virtual_start(),
                    });
                }
            }
            let model = self.flows.entry(expectation.flow).or_default();
            model.in_service = model.in_service.saturating_sub(1);
        }
        self.check_state(engine);
    }

    /// Checks clock monotonicity and occupancy accounting.
    pub fn check_state<T>(&mut self, engine: &FairQueue<T>) {
        let now = engine.virtual_time();
        if now < self.last_virtual_time {
            self.violations.push(PropertyViolation::VirtualTimeRegressed {
                before: self.last_virtual_time,
                after: now,
            });
        }
        self.last_virtual_time = now;

        let pending: usize = self.flows.values().map(|m| m.pending).sum();
        let in_service: usize = self.flows.values().map(|m| m.in_service).sum();
        let active = self
            .flows
            .values()
            .filter(|m| m.pending + m.in_service > 0)
            .count();
        let stats = engine.stats();

        self.compare("pending", pending, stats.pending);
        self.compare("in_service", in_service, stats.in_service);
        self.compare("active_queues", active, stats.active_queues);

        for (&flow, model) in &self.flows {
            if let Some(queue) = engine.queue(flow) {
                if queue.pending_len() != model.pending {
                    self.violations.push(PropertyViolation::AccountingMismatch {
                        counter: "queue.pending",
                        expected: model.pending,
                        actual: queue.pending_len(),
                    });
                }
                if queue.in_service_len() != model.in_service {
                    self.violations.push(PropertyViolation::AccountingMismatch {
                        counter: "queue.in_service",
                        expected: model.in_service,
                        actual: queue.in_service_len(),
                    });
                }
            }
        }
    }

    fn compare(&mut self, counter: &'static str, expected: usize, actual: usize) {
        if expected != actual {
            self.violations.push(PropertyViolation::AccountingMismatch {
                counter,
                expected,
                actual,
            });
        }
    }

    /// Returns all violations recorded so far.
    #[must_use]
    pub fn violations(&self) -> &[PropertyViolation] {
        &self.violations
    }

    /// Returns true if no violation has been recorded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}
