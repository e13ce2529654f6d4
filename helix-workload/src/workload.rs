//! Workload generation and execution.
//!
//! Provides deterministic generation of per-flow work from a seed and runs
//! it through the [`Simulator`].

use std::time::Duration;

use hdrhistogram::Histogram;
use helix_core::FlowKey;
use helix_fq::{FairQueueConfig, SyncPolicy};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::history::History;
use crate::simulator::{SimulationError, Simulator};
use crate::verification::{FairnessReport, Verification, Violation};

/// Description of one flow's work.
///
/// A flow generates packets until `total_units` units of service have been
/// produced. Each packet's service time is drawn from
/// `min_service..max_service` (or is exactly `min_service` when the two are
/// equal); the last packet is trimmed so the total is exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowSpec {
    /// Total units of service the flow asks for.
    pub total_units: u64,
    /// Minimum service units per packet.
    pub min_service: u64,
    /// Maximum service units per packet (exclusive unless equal to min).
    pub max_service: u64,
    /// Simulated time at which the flow's packets arrive.
    pub start_ns: u64,
}

impl FlowSpec {
    /// A flow of same-sized packets.
    #[must_use]
    pub const fn uniform(total_units: u64, service: u64) -> Self {
        Self {
            total_units,
            min_service: service,
            max_service: service,
            start_ns: 0,
        }
    }

    /// A flow of packets with random service times.
    #[must_use]
    pub const fn random(total_units: u64, min_service: u64, max_service: u64) -> Self {
        Self {
            total_units,
            min_service,
            max_service,
            start_ns: 0,
        }
    }

    /// Delays the flow's arrival to `start_ns`.
    #[must_use]
    pub const fn starting_at(mut self, start_ns: u64) -> Self {
        self.start_ns = start_ns;
        self
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> u64 {
        if self.min_service >= self.max_service {
            self.min_service
        } else {
            rng.gen_range(self.min_service..self.max_service)
        }
    }
}

/// A simulated work item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkItem {
    /// Generator-assigned ordinal within the flow, starting at 1.
    pub ordinal: u64,
    /// Service units (simulated nanoseconds of service).
    pub units: u64,
}

/// A generated packet and its arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arrival {
    /// Simulated arrival time.
    pub at_ns: u64,
    /// Flow the packet is enqueued on.
    pub flow: FlowKey,
    /// The work.
    pub item: WorkItem,
}

/// Workload configuration.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Random seed for deterministic generation.
    pub seed: u64,
    /// Flows; flow `i` is enqueued on key `i`.
    pub flows: Vec<FlowSpec>,
    /// Queues configured on the scheduler; never fewer than `flows`.
    pub queues: u64,
    /// Simulated backend servers (packets served at once).
    pub servers: usize,
    /// Scheduler configuration; its concurrency limit normally equals
    /// `servers`.
    pub scheduler: FairQueueConfig,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            flows: Vec::new(),
            queues: 0,
            servers: 1,
            scheduler: FairQueueConfig {
                concurrency_limit: 1,
                ..FairQueueConfig::for_testing()
            },
        }
    }
}

impl WorkloadConfig {
    /// Number of queues the scheduler is built with.
    #[must_use]
    pub fn queue_count(&self) -> u64 {
        self.queues.max(self.flows.len() as u64)
    }
}

/// Builder for creating workloads.
#[derive(Debug, Default)]
pub struct WorkloadBuilder {
    config: WorkloadConfig,
}

impl WorkloadBuilder {
    /// Creates a new workload builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the random seed.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Adds a flow.
    #[must_use]
    pub fn flow(mut self, flow: FlowSpec) -> Self {
        self.config.flows.push(flow);
        self
    }

    /// Adds `count` copies of a flow.
    #[must_use]
    pub fn flows(mut self, count: usize, flow: FlowSpec) -> Self {
        self.config
            .flows
            .extend(std::iter::repeat(flow).take(count));
        self
    }

    /// Sets the number of configured queues.
    #[must_use]
    pub const fn queues(mut self, queues: u64) -> Self {
        self.config.queues = queues;
        self
    }

    /// Sets the number of simulated servers.
    ///
    /// Also sets the concurrency limit C to match, so virtual time advances
    /// at the rate work is really served. Call
    /// [`WorkloadBuilder::concurrency_limit`] afterwards to model a mismatch.
    #[must_use]
    pub fn servers(mut self, servers: usize) -> Self {
        self.config.servers = servers;
        self.config.scheduler.concurrency_limit = u32::try_from(servers).unwrap_or(u32::MAX);
        self
    }

    /// Sets the service quantum G.
    #[must_use]
    pub const fn service_quantum(mut self, quantum: Duration) -> Self {
        self.config.scheduler.service_quantum = quantum;
        self
    }

    /// Sets the concurrency limit C.
    #[must_use]
    pub const fn concurrency_limit(mut self, limit: u32) -> Self {
        self.config.scheduler.concurrency_limit = limit;
        self
    }

    /// Sets the virtual clock sync policy.
    #[must_use]
    pub const fn sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.config.scheduler.sync_policy = policy;
        self
    }

    /// Builds the workload.
    #[must_use]
    pub fn build(self) -> Workload {
        Workload::new(self.config)
    }
}

/// A verifiable workload.
pub struct Workload {
    config: WorkloadConfig,
    rng: ChaCha8Rng,
    history: History,
}

impl Workload {
    /// Creates a new workload from configuration.
    #[must_use]
    pub fn new(config: WorkloadConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            history: History::new(),
        }
    }

    /// Creates a workload builder.
    #[must_use]
    pub fn builder() -> WorkloadBuilder {
        WorkloadBuilder::new()
    }

    /// Returns the workload configuration.
    #[must_use]
    pub const fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    /// Returns the history of the last run.
    #[must_use]
    pub const fn history(&self) -> &History {
        &self.history
    }

    /// Generates every flow's packets, ordered by arrival time then flow.
    pub fn generate(&mut self) -> Vec<Arrival> {
        let mut arrivals = Vec::new();
        for (index, spec) in self.config.flows.iter().enumerate() {
            let flow = FlowKey::new(index as u64);
            let mut produced = 0;
            let mut ordinal = 0;
            while produced < spec.total_units {
                let units = spec.sample(&mut self.rng).min(spec.total_units - produced).max(1);
                produced += units;
                ordinal += 1;
                arrivals.push(Arrival {
                    at_ns: spec.start_ns,
                    flow,
                    item: WorkItem { ordinal, units },
                });
            }
        }
        // Stable: within a flow, generation order is arrival order.
        arrivals.sort_by_key(|a| a.at_ns);
        arrivals
    }

    /// Runs the workload through a fresh simulator.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler configuration is invalid or the
    /// scheduler rejects an operation.
    ///
    /// # Panics
    ///
    /// Panics if histogram creation fails (should not happen with valid parameters).
    #[allow(clippy::cast_precision_loss)]
    pub fn run(&mut self) -> Result<WorkloadStats, SimulationError> {
        let arrivals = self.generate();
        let simulator = Simulator::new(&self.config)?;
        let outcome = simulator.run(&arrivals)?;
        self.history = outcome.history;

        let mut delays = Histogram::<u64>::new(3).expect("histogram creation");
        for record in self.history.records() {
            let _ = delays.record(record.dispatched_at_ns.saturating_sub(record.enqueued_at_ns));
        }

        let stats = self.history.stats();
        Ok(WorkloadStats {
            packets_total: stats.enqueued,
            packets_finished: stats.finished,
            units_total: stats.units,
            makespan_ns: self.history.last_finish_ns(),
            virtual_time_end: outcome.virtual_time.as_nanos_f64(),
            queueing_delay_p50_ns: delays.value_at_percentile(50.0),
            queueing_delay_p99_ns: delays.value_at_percentile(99.0),
            queueing_delay_max_ns: delays.max(),
            fairness: Verification::fairness(&self.history),
            violations: Verification::verify(&self.history),
        })
    }
}

/// Statistics from a workload run.
#[derive(Debug, Clone)]
pub struct WorkloadStats {
    /// Packets generated and enqueued.
    pub packets_total: u64,
    /// Packets finished.
    pub packets_finished: u64,
    /// Units of service generated.
    pub units_total: u64,

    /// Simulated time of the last completion.
    pub makespan_ns: u64,
    /// Virtual time at the end of the run.
    pub virtual_time_end: f64,

    /// Queueing delay p50 in simulated nanoseconds.
    pub queueing_delay_p50_ns: u64,
    /// Queueing delay p99 in simulated nanoseconds.
    pub queueing_delay_p99_ns: u64,
    /// Queueing delay max in simulated nanoseconds.
    pub queueing_delay_max_ns: u64,

    /// Fair-share measurement.
    pub fairness: FairnessReport,
    /// Verification violations found.
    pub violations: Vec<Violation>,
}
