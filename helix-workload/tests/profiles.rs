//! Fairness bounds for the named profiles.

use helix_core::FlowKey;
use helix_workload::{FlowSpec, Profile, Workload};

#[test]
fn test_uniform_flows_share_equally() {
    let stats = Profile::Uniform.workload(42).run().unwrap();

    assert!(stats.violations.is_empty(), "{:?}", stats.violations);
    assert_eq!(stats.packets_finished, 10_000);
    assert!(stats.fairness.is_measurable());
    assert!(
        stats.fairness.deviation < 0.1,
        "deviation {}",
        stats.fairness.deviation
    );
}

#[test]
fn test_random_service_times_share_within_one_percent() {
    for seed in [1, 2, 3] {
        let stats = Profile::RandomService.workload(seed).run().unwrap();

        assert!(stats.violations.is_empty(), "{:?}", stats.violations);
        assert!(
            stats.fairness.deviation < 1.0,
            "seed {seed}: deviation {}",
            stats.fairness.deviation
        );
    }
}

#[test]
fn test_one_burst_flow_cannot_crowd_out_small_flow() {
    let stats = Profile::OneBurst.workload(0).run().unwrap();

    assert!(stats.violations.is_empty());
    assert!(Profile::OneBurst.accepts(&stats));
    // The small flow completes all its work while competing.
    let small = stats.fairness.share(FlowKey::new(1)).unwrap();
    assert!(small.actual_percent > 49.0);
}

#[test]
fn test_long_running_flow_completes() {
    let stats = Profile::LongRunning.workload(0).run().unwrap();

    assert!(stats.violations.is_empty());
    assert_eq!(stats.units_total, 10_000 + 7 * 1_000);
    assert_eq!(stats.makespan_ns, stats.units_total);
}

#[test]
fn test_late_flow_is_not_starved() {
    let mut workload = Workload::builder()
        .seed(3)
        .flow(FlowSpec::uniform(1_000, 1))
        .flow(FlowSpec::uniform(100, 1).starting_at(500))
        .build();
    let stats = workload.run().unwrap();
    assert!(stats.violations.is_empty());

    // The late flow is served within a couple of rounds of arriving.
    let first_late = workload
        .history()
        .records()
        .iter()
        .find(|r| r.flow == FlowKey::new(1))
        .unwrap();
    assert!(first_late.dispatched_at_ns <= 502);
}

#[test]
fn test_runs_are_deterministic() {
    let a = Profile::RandomService.workload(9).run().unwrap();
    let b = Profile::RandomService.workload(9).run().unwrap();

    assert_eq!(a.makespan_ns, b.makespan_ns);
    assert!((a.fairness.deviation - b.fairness.deviation).abs() < f64::EPSILON);
}
