//! Fair-queue engine simulation tests.
//!
//! These tests drive `FairQueue` with seeded operation sequences and
//! explicit time, checking every property after every operation.
//!
//! # Test Categories
//!
//! 1. **Random Operations**: Mixed enqueue/dequeue/finish/advance sequences
//! 2. **Rotation**: Equal flows are served round-robin
//! 3. **Estimate Correction**: Short service earns credit back
//! 4. **Virtual Past**: Idle flows restart at the virtual clock
//! 5. **Empty Dequeue**: Polling an empty scheduler leaves the clock alone

// Test-specific lint allowances - these are less critical in test code.
#![allow(clippy::cast_possible_truncation)] // u64 to usize safe on 64-bit test machines
#![allow(clippy::unreadable_literal)] // Large seed numbers are fine without separators
#![allow(clippy::uninlined_format_args)] // Format string style not critical for tests

use std::time::Duration;

use helix_core::FlowKey;
use helix_fq::{FairQueue, FairQueueConfig, FlowQueue, FqError, Packet, SyncPolicy, VirtualTime};

use crate::properties::PropertyChecker;
use crate::scenarios::{seeds, Operation, OperationMix, OperationScenario};

/// Engine plus checker, applying scenario operations.
struct Harness {
    engine: FairQueue<u64>,
    checker: PropertyChecker,
    in_service: Vec<Packet<u64>>,
    now_ns: u64,
    next_payload: u64,
}

impl Harness {
    fn new(flows: u64, config: FairQueueConfig) -> Self {
        Self {
            engine: FairQueue::with_flow_count(flows, config, 0).expect("valid config"),
            checker: PropertyChecker::new(),
            in_service: Vec::new(),
            now_ns: 0,
            next_payload: 0,
        }
    }

    fn apply(&mut self, op: Operation) {
        match op {
            Operation::Enqueue { flow, estimate_ns } => {
                let was_idle = self.engine.queue(flow).is_some_and(FlowQueue::is_idle);
                let payload = self.next_payload;
                self.next_payload += 1;
                match self.engine.enqueue_with_estimate(
                    flow,
                    payload,
                    Duration::from_nanos(estimate_ns),
                    self.now_ns,
                ) {
                    Ok(_) => self.checker.after_enqueue(&self.engine, flow, was_idle),
                    Err(FqError::QueueFull { .. }) => {}
                    Err(e) => panic!("unexpected enqueue error: {e}"),
                }
            }
            Operation::Dequeue => {
                self.checker.before_dequeue(&self.engine);
                let packet = self.engine.dequeue(self.now_ns);
                self.checker.after_dequeue(&self.engine, packet.as_ref());
                if let Some(packet) = packet {
                    self.in_service.push(packet);
                }
            }
            Operation::Finish { pick, actual_ns } => {
                if self.in_service.is_empty() {
                    return;
                }
                let packet = self.in_service.swap_remove(pick % self.in_service.len());
                let actual = Duration::from_nanos(actual_ns);
                self.checker.before_finish(&self.engine, &packet);
                self.engine
                    .finish(packet, actual, self.now_ns)
                    .expect("in-service packet finishes");
                self.checker.after_finish(&self.engine, actual);
            }
            Operation::Advance { ns } => {
                self.now_ns += ns;
            }
        }
    }

    /// Serves everything left, finishing each packet at its estimate.
    fn drain(&mut self) {
        loop {
            while !self.engine.is_empty() {
                self.apply(Operation::Dequeue);
            }
            if self.in_service.is_empty() {
                break;
            }
            while let Some(packet) = self.in_service.pop() {
                let actual = packet.estimated_service();
                self.now_ns += actual.as_nanos() as u64;
                self.checker.before_finish(&self.engine, &packet);
                self.engine
                    .finish(packet, actual, self.now_ns)
                    .expect("in-service packet finishes");
                self.checker.after_finish(&self.engine, actual);
            }
        }
    }

    fn run(&mut self, operations: &[Operation]) {
        for &op in operations {
            self.apply(op);
        }
        self.drain();
    }
}

fn run_scenario(scenario: &OperationScenario, config: FairQueueConfig, seed: u64) {
    let mut harness = Harness::new(scenario.flows, config);
    harness.run(&scenario.generate(seed));

    assert!(
        harness.checker.is_clean(),
        "seed {}: {:?}",
        seed,
        harness.checker.violations()
    );
    let stats = harness.engine.stats();
    assert_eq!(stats.total_enqueued, stats.total_finished, "seed {}", seed);
    assert_eq!(stats.active_queues, 0, "seed {}", seed);
    assert_eq!(stats.in_service, 0, "seed {}", seed);
}

// ============================================================================
// Random Operations
// ============================================================================

#[test]
fn test_dst_fair_queue_regression_seeds() {
    let mixes = [
        OperationMix::balanced(),
        OperationMix::enqueue_heavy(),
        OperationMix::bursty(),
    ];
    for mix in mixes {
        let scenario = OperationScenario::small().with_mix(mix);
        for &seed in seeds::REGRESSION_SEEDS {
            run_scenario(&scenario, FairQueueConfig::for_testing(), seed);
        }
    }
}

#[test]
fn test_dst_fair_queue_random_seeds() {
    let scenario = OperationScenario::small().with_flows(7);
    let config = FairQueueConfig {
        concurrency_limit: 2,
        ..FairQueueConfig::for_testing()
    };
    for seed in 0..seeds::CI_SEED_COUNT {
        run_scenario(&scenario, config.clone(), u64::from(seed));
    }
}

#[test]
fn test_dst_fair_queue_enqueue_only_sync() {
    let scenario = OperationScenario::small().with_mix(OperationMix::bursty());
    let config = FairQueueConfig::for_testing().with_sync_policy(SyncPolicy::EnqueueOnly);
    for &seed in seeds::REGRESSION_SEEDS {
        run_scenario(&scenario, config.clone(), seed);
    }
}

#[test]
fn test_dst_fair_queue_bounded_depth() {
    let scenario = OperationScenario::small().with_mix(OperationMix::enqueue_heavy());
    let config = FairQueueConfig::for_testing().with_max_queue_depth(5);
    for &seed in seeds::REGRESSION_SEEDS {
        run_scenario(&scenario, config.clone(), seed);
    }
}

// ============================================================================
// Deterministic Scenarios
// ============================================================================

#[test]
fn test_dst_fair_queue_equal_flows_rotate() {
    let config = FairQueueConfig {
        concurrency_limit: 1,
        ..FairQueueConfig::for_testing()
    };
    let mut engine: FairQueue<u64> = FairQueue::with_flow_count(5, config, 0).unwrap();
    for i in 0..100 {
        engine.enqueue(FlowKey::new(i % 5), i, 0).unwrap();
    }

    let mut now = 0;
    let mut order = Vec::new();
    while let Some(packet) = engine.dequeue(now) {
        order.push(packet.flow().get());
        now += 100;
        engine
            .finish(packet, Duration::from_nanos(100), now)
            .unwrap();
    }

    assert_eq!(order.len(), 100);
    for (i, flow) in order.iter().enumerate() {
        assert_eq!(*flow, (i % 5) as u64, "dispatch {}", i);
    }
}

#[test]
fn test_dst_fair_queue_short_service_earns_credit() {
    let mut engine: FairQueue<u64> =
        FairQueue::with_flow_count(2, FairQueueConfig::for_testing(), 0).unwrap();
    let estimate = Duration::from_nanos(100);
    for i in 0..3 {
        engine
            .enqueue_with_estimate(FlowKey::new(0), i, estimate, 0)
            .unwrap();
        engine
            .enqueue_with_estimate(FlowKey::new(1), i, estimate, 0)
            .unwrap();
    }

    // Flow 0 always finishes in 10ns, flow 1 uses its full estimate.
    let mut order = Vec::new();
    for _ in 0..4 {
        let packet = engine.dequeue(0).unwrap();
        let flow = packet.flow();
        order.push(flow.get());
        let actual = if flow == FlowKey::new(0) { 10 } else { 100 };
        engine
            .finish(packet, Duration::from_nanos(actual), 0)
            .unwrap();
    }

    assert_eq!(order, vec![0, 1, 0, 0]);
}

#[test]
fn test_dst_fair_queue_idle_flow_does_not_bank_credit() {
    let config = FairQueueConfig {
        concurrency_limit: 1,
        ..FairQueueConfig::for_testing()
    };
    let mut engine: FairQueue<u64> = FairQueue::with_flow_count(2, config, 0).unwrap();
    for i in 0..50 {
        engine.enqueue(FlowKey::new(1), i, 0).unwrap();
    }

    // Flow 1 runs alone for ten packets while flow 0 sits idle.
    let mut now = 0;
    for _ in 0..10 {
        let packet = engine.dequeue(now).unwrap();
        now += 100;
        engine
            .finish(packet, Duration::from_nanos(100), now)
            .unwrap();
    }
    assert_eq!(now, 1_000);

    for i in 0..10 {
        engine.enqueue(FlowKey::new(0), i, now).unwrap();
    }
    assert_eq!(engine.virtual_time(), VirtualTime::from_nanos(1_000));
    assert_eq!(
        engine.queue(FlowKey::new(0)).unwrap().virtual_start(),
        VirtualTime::from_nanos(1_000)
    );

    // Flow 0 shares from here on instead of replaying its idle time.
    let mut served = [0_u32; 2];
    for _ in 0..10 {
        let packet = engine.dequeue(now).unwrap();
        served[packet.flow().get() as usize] += 1;
        now += 100;
        engine
            .finish(packet, Duration::from_nanos(100), now)
            .unwrap();
    }
    assert_eq!(served, [5, 5]);
}

#[test]
fn test_dst_fair_queue_empty_dequeue_leaves_clock() {
    let mut engine: FairQueue<u64> =
        FairQueue::with_flow_count(1, FairQueueConfig::for_testing(), 0).unwrap();
    engine.enqueue(FlowKey::new(0), 0, 0).unwrap();
    let packet = engine.dequeue(0).unwrap();

    // In service but nothing pending: polling does not sync.
    assert!(engine.dequeue(500).is_none());
    assert_eq!(engine.virtual_time(), VirtualTime::ZERO);

    // Finishing syncs over the whole interval at ratio 1.
    engine
        .finish(packet, Duration::from_nanos(500), 500)
        .unwrap();
    assert_eq!(engine.virtual_time(), VirtualTime::from_nanos(500));

    // Fully idle: the clock is frozen.
    assert!(engine.dequeue(10_000).is_none());
    engine.sync(10_000);
    assert_eq!(engine.virtual_time(), VirtualTime::from_nanos(500));
}

#[test]
fn test_dst_fair_queue_rejections_leave_state() {
    let config = FairQueueConfig::for_testing().with_max_queue_depth(3);
    let mut engine: FairQueue<u64> = FairQueue::with_flow_count(2, config, 0).unwrap();
    for i in 0..3 {
        engine.enqueue(FlowKey::new(0), i, 0).unwrap();
    }

    let full = engine.enqueue(FlowKey::new(0), 3, 10).unwrap_err();
    assert!(matches!(full, FqError::QueueFull { size: 3, max_size: 3, .. }));
    let missing = engine.enqueue(FlowKey::new(9), 0, 10).unwrap_err();
    assert_eq!(missing, FqError::NoSuchQueue { flow: FlowKey::new(9) });

    let stats = engine.stats();
    assert_eq!(stats.pending, 3);
    assert_eq!(stats.total_rejected, 2);
    // Flow 1 is unaffected.
    engine.enqueue(FlowKey::new(1), 0, 10).unwrap();
    assert_eq!(engine.stats().active_queues, 2);
}
