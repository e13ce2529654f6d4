//! Fair-queuing simulator binary.
//!
//! Runs one or all named profiles through the scheduler on simulated time
//! and reports fairness, queueing delay and ordering violations.
//!
//! ```bash
//! fq-sim --profile random-service --seed 7
//! fq-sim --all --servers 4
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

use clap::Parser;
use helix_workload::{Profile, WorkloadStats};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Fair-queuing scheduler simulator.
#[derive(Parser, Debug)]
#[command(name = "fq-sim")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Profile to run.
    #[arg(long, default_value = "uniform")]
    profile: Profile,

    /// Run every profile instead of one.
    #[arg(long)]
    all: bool,

    /// Seed for workload generation.
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Override the number of parallel servers; also sets the concurrency limit.
    #[arg(long)]
    servers: Option<usize>,

    /// Override the scheduler concurrency limit.
    #[arg(long)]
    concurrency_limit: Option<u32>,

    /// Log level.
    #[arg(long, default_value = "info")]
    log_level: Level,
}

fn run_profile(profile: Profile, args: &Args) -> Result<bool, Box<dyn std::error::Error>> {
    let mut builder = profile.builder().seed(args.seed);
    if let Some(servers) = args.servers {
        builder = builder.servers(servers);
    }
    if let Some(limit) = args.concurrency_limit {
        builder = builder.concurrency_limit(limit);
    }
    let mut workload = builder.build();

    info!(
        profile = %profile,
        flows = workload.config().flows.len(),
        servers = workload.config().servers,
        concurrency_limit = workload.config().scheduler.concurrency_limit,
        "Running profile"
    );
    let stats = workload.run()?;
    report(profile, &stats);

    let accepted = profile.accepts(&stats);
    if !accepted {
        warn!(profile = %profile, deviation = stats.fairness.deviation, "Profile rejected");
    }
    Ok(accepted)
}

fn report(profile: Profile, stats: &WorkloadStats) {
    println!("== {profile} ==");
    println!(
        "packets: {}/{} finished, {} units, makespan {}ns",
        stats.packets_finished, stats.packets_total, stats.units_total, stats.makespan_ns
    );
    println!(
        "queueing delay: p50={}ns p99={}ns max={}ns",
        stats.queueing_delay_p50_ns, stats.queueing_delay_p99_ns, stats.queueing_delay_max_ns
    );
    if stats.fairness.is_measurable() {
        println!(
            "fairness: window {} units, deviation {:.4}",
            stats.fairness.window_units, stats.fairness.deviation
        );
        for share in &stats.fairness.flows {
            println!(
                "  {}: ideal {:.3}% actual {:.3}%",
                share.flow, share.ideal_percent, share.actual_percent
            );
        }
    } else {
        println!("fairness: no window where every flow competed");
    }
    match profile.max_deviation() {
        Some(max) => println!("bound: {max}"),
        None => println!("bound: none"),
    }
    for violation in &stats.violations {
        println!("violation: {violation}");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let profiles: Vec<Profile> = if args.all {
        Profile::ALL.to_vec()
    } else {
        vec![args.profile]
    };

    let mut rejected = Vec::new();
    for profile in profiles {
        if !run_profile(profile, &args)? {
            rejected.push(profile.name());
        }
    }

    if rejected.is_empty() {
        Ok(())
    } else {
        Err(format!("profiles rejected: {}", rejected.join(", ")).into())
    }
}
