//! Reusable test scenarios for fair-queue simulation.
//!
//! Scenarios describe seeded operation sequences against the engine so the
//! same sequence can be replayed from a failing seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use helix_core::FlowKey;

/// Seeds for reproducible testing.
pub mod seeds {
    /// Standard test seeds that have historically found bugs.
    pub const REGRESSION_SEEDS: &[u64] = &[
        42,
        12345,
        0xDEAD_BEEF,
        999,
        7777,
        0x1337,
        0xCAFE_BABE,
        1,
        u64::MAX,
        0,
    ];

    /// Number of random seeds to test in CI.
    pub const CI_SEED_COUNT: u32 = 100;
}

/// One step applied to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Enqueue on `flow`; an estimate of zero means the default quantum.
    Enqueue {
        /// Target flow.
        flow: FlowKey,
        /// Per-packet estimate in nanoseconds.
        estimate_ns: u64,
    },
    /// Dequeue the next packet, if any.
    Dequeue,
    /// Finish one in-service packet chosen by `pick` modulo the in-service count.
    Finish {
        /// Selector into the in-service set.
        pick: usize,
        /// Measured service time in nanoseconds.
        actual_ns: u64,
    },
    /// Advance real time.
    Advance {
        /// Nanoseconds to advance.
        ns: u64,
    },
}

/// Relative weights of each operation kind.
#[derive(Debug, Clone, Copy)]
pub struct OperationMix {
    /// Weight of enqueues.
    pub enqueue: u32,
    /// Weight of dequeues.
    pub dequeue: u32,
    /// Weight of finishes.
    pub finish: u32,
    /// Weight of time advances.
    pub advance: u32,
}

impl OperationMix {
    /// Roughly steady state: work arrives about as fast as it drains.
    #[must_use]
    pub const fn balanced() -> Self {
        Self {
            enqueue: 30,
            dequeue: 30,
            finish: 30,
            advance: 10,
        }
    }

    /// Backlog builds up.
    #[must_use]
    pub const fn enqueue_heavy() -> Self {
        Self {
            enqueue: 50,
            dequeue: 20,
            finish: 20,
            advance: 10,
        }
    }

    /// Queues keep going idle, exercising the restart path.
    #[must_use]
    pub const fn bursty() -> Self {
        Self {
            enqueue: 15,
            dequeue: 35,
            finish: 35,
            advance: 15,
        }
    }

    const fn total(&self) -> u32 {
        self.enqueue + self.dequeue + self.finish + self.advance
    }
}

/// Parameters of a random operation sequence.
#[derive(Debug, Clone, Copy)]
pub struct OperationScenario {
    /// Number of flows; flows are keyed `0..flows`.
    pub flows: u64,
    /// Number of operations to generate.
    pub operations: usize,
    /// Operation weights.
    pub mix: OperationMix,
    /// Largest per-packet estimate; about a quarter of enqueues use the default.
    pub max_estimate_ns: u64,
    /// Largest measured service time.
    pub max_actual_ns: u64,
    /// Largest single time advance.
    pub max_advance_ns: u64,
}

impl OperationScenario {
    /// A small scenario suitable for many seeds.
    #[must_use]
    pub const fn small() -> Self {
        Self {
            flows: 4,
            operations: 500,
            mix: OperationMix::balanced(),
            max_estimate_ns: 200,
            max_actual_ns: 400,
            max_advance_ns: 150,
        }
    }

    /// Returns a copy with a different mix.
    #[must_use]
    pub const fn with_mix(mut self, mix: OperationMix) -> Self {
        self.mix = mix;
        self
    }

    /// Returns a copy with a different flow count.
    #[must_use]
    pub const fn with_flows(mut self, flows: u64) -> Self {
        self.flows = flows;
        self
    }

    /// Generates the operation sequence for `seed`.
    #[must_use]
    pub fn generate(&self, seed: u64) -> Vec<Operation> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let total = self.mix.total().max(1);

        (0..self.operations)
            .map(|_| {
                let mut roll = rng.gen_range(0..total);
                if roll < self.mix.enqueue {
                    let estimate_ns = if rng.gen_ratio(1, 4) {
                        0
                    } else {
                        rng.gen_range(1..=self.max_estimate_ns)
                    };
                    return Operation::Enqueue {
                        flow: FlowKey::new(rng.gen_range(0..self.flows)),
                        estimate_ns,
                    };
                }
                roll -= self.mix.enqueue;
                if roll < self.mix.dequeue {
                    return Operation::Dequeue;
                }
                roll -= self.mix.dequeue;
                if roll < self.mix.finish {
                    return Operation::Finish {
                        pick: rng.gen_range(0..usize::MAX),
                        actual_ns: rng.gen_range(0..=self.max_actual_ns),
                    };
                }
                Operation::Advance {
                    ns: rng.gen_range(1..=self.max_advance_ns),
                }
            })
            .collect()
    }
}
