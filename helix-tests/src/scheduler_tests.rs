//! Scheduler integration tests.
//!
//! `FairQueueScheduler` shared between producer and worker threads, plus
//! admission through flow resolvers.

#![allow(clippy::cast_possible_truncation)] // u64 to usize safe on 64-bit test machines

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use helix_core::FlowKey;
use helix_fq::{FairQueueConfig, FairQueueScheduler, ManualClock, SystemClock};
use helix_runtime::{Admission, AdmissionError, HashFlowResolver, StaticFlowResolver};

const FLOWS: u64 = 4;
const PER_FLOW: u64 = 200;

#[test]
fn test_scheduler_producers_and_workers() {
    let clock = ManualClock::new(0);
    let scheduler: Arc<FairQueueScheduler<u64, ManualClock>> = Arc::new(
        FairQueueScheduler::with_flow_count(FLOWS, FairQueueConfig::for_testing(), clock.clone())
            .unwrap(),
    );
    let completed: Arc<Mutex<BTreeMap<FlowKey, Vec<u64>>>> = Arc::default();

    let producers: Vec<_> = (0..FLOWS)
        .map(|flow| {
            let scheduler = Arc::clone(&scheduler);
            thread::spawn(move || {
                for i in 0..PER_FLOW {
                    scheduler.enqueue(FlowKey::new(flow), i).unwrap();
                }
            })
        })
        .collect();

    let workers: Vec<_> = (0..3)
        .map(|_| {
            let scheduler = Arc::clone(&scheduler);
            let completed = Arc::clone(&completed);
            let clock = clock.clone();
            thread::spawn(move || loop {
                if scheduler.stats().total_finished >= FLOWS * PER_FLOW {
                    break;
                }
                let Some(packet) = scheduler.dequeue() else {
                    thread::yield_now();
                    continue;
                };
                clock.advance_ns(10);
                let done = scheduler.complete(packet).unwrap();
                completed
                    .lock()
                    .unwrap()
                    .entry(done.flow)
                    .or_default()
                    .push(done.payload);
            })
        })
        .collect();

    for handle in producers.into_iter().chain(workers) {
        handle.join().unwrap();
    }

    let stats = scheduler.stats();
    assert_eq!(stats.total_enqueued, FLOWS * PER_FLOW);
    assert_eq!(stats.total_finished, FLOWS * PER_FLOW);
    assert_eq!(stats.active_queues, 0);

    let completed = completed.lock().unwrap();
    for flow in 0..FLOWS {
        let mut payloads = completed[&FlowKey::new(flow)].clone();
        payloads.sort_unstable();
        assert_eq!(payloads, (0..PER_FLOW).collect::<Vec<_>>(), "flow {flow}");
    }
}

#[test]
fn test_scheduler_system_clock_measures_service() {
    let scheduler: FairQueueScheduler<&str, SystemClock> =
        FairQueueScheduler::new([FlowKey::new(0)], FairQueueConfig::for_testing()).unwrap();
    scheduler.enqueue(FlowKey::new(0), "work").unwrap();

    let packet = scheduler.dequeue().unwrap();
    thread::sleep(Duration::from_millis(2));
    let done = scheduler.complete(packet).unwrap();

    assert!(done.actual_service >= Duration::from_millis(2));
    assert_eq!(done.estimated_service, Duration::from_nanos(100));
    assert!(scheduler.virtual_time() > helix_fq::VirtualTime::ZERO);
}

#[test]
fn test_admission_routes_tenants() {
    let scheduler = Arc::new(
        FairQueueScheduler::with_flow_count(3, FairQueueConfig::for_testing(), ManualClock::new(0))
            .unwrap(),
    );
    let resolver = StaticFlowResolver::new()
        .with_route("alpha".to_string(), FlowKey::new(0))
        .with_route("beta".to_string(), FlowKey::new(1));
    let admission = Admission::new(resolver, Arc::clone(&scheduler));

    admission.admit(&"alpha".to_string(), 1_u32).unwrap();
    admission
        .admit_with_estimate(&"beta".to_string(), 2, Duration::from_nanos(40))
        .unwrap();
    assert_eq!(
        admission.admit(&"gamma".to_string(), 3),
        Err(AdmissionError::Unresolved)
    );

    let snapshot = scheduler.snapshot();
    let pending: u64 = snapshot.iter().map(|q| q.pending as u64).sum();
    assert_eq!(pending, 2);
    assert_eq!(scheduler.stats().total_rejected, 0);

    // The cheaper estimate finishes first in virtual time.
    let first = scheduler.dequeue().unwrap();
    assert_eq!(first.flow(), FlowKey::new(1));
}

#[test]
fn test_admission_hash_resolver_is_stable() {
    let scheduler = Arc::new(
        FairQueueScheduler::with_flow_count(8, FairQueueConfig::for_testing(), ManualClock::new(0))
            .unwrap(),
    );
    let admission = Admission::new(HashFlowResolver::new(8).unwrap(), Arc::clone(&scheduler));

    for i in 0..16_u32 {
        admission.admit("tenant-a", i).unwrap();
    }
    // Every packet for one descriptor lands on one flow.
    let busy = scheduler
        .snapshot()
        .into_iter()
        .filter(|q| q.pending > 0)
        .count();
    assert_eq!(busy, 1);
    assert_eq!(scheduler.pending(), 16);
}
