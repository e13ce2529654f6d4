//! Named simulation profiles.
//!
//! Provides predefined workloads for the fairness scenarios the scheduler
//! is expected to handle, each with the deviation bound it must meet.
//!
//! # Example
//!
//! ```ignore
//! use helix_workload::Profile;
//!
//! let profile: Profile = "uniform".parse().unwrap();
//! let stats = profile.workload(42).run().unwrap();
//! assert!(profile.accepts(&stats));
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::workload::{FlowSpec, Workload, WorkloadBuilder, WorkloadStats};

/// A named workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Ten flows of 1000 one-unit packets each.
    Uniform,
    /// Ten flows of 10000 units with service times drawn from 1..10.
    RandomService,
    /// One flow with 1000 units against one with 100.
    OneBurst,
    /// One flow of 100-unit packets against seven flows of 1-unit packets.
    LongRunning,
    /// Random service times served by four parallel servers.
    Parallel,
}

impl Profile {
    /// Every profile.
    pub const ALL: [Self; 5] = [
        Self::Uniform,
        Self::RandomService,
        Self::OneBurst,
        Self::LongRunning,
        Self::Parallel,
    ];

    /// Profile name as accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::RandomService => "random-service",
            Self::OneBurst => "one-burst",
            Self::LongRunning => "long-running",
            Self::Parallel => "parallel",
        }
    }

    /// Builder preloaded with the profile's flows, before seeding.
    #[must_use]
    pub fn builder(self) -> WorkloadBuilder {
        let builder = Workload::builder().service_quantum(Duration::from_nanos(100));
        match self {
            Self::Uniform => builder.flows(10, FlowSpec::uniform(1_000, 1)),
            Self::RandomService => builder.flows(10, FlowSpec::random(10_000, 1, 10)),
            Self::OneBurst => builder
                .flow(FlowSpec::uniform(1_000, 1))
                .flow(FlowSpec::uniform(100, 1)),
            Self::LongRunning => builder
                .flow(FlowSpec::uniform(10_000, 100))
                .flows(7, FlowSpec::uniform(1_000, 1)),
            Self::Parallel => builder
                .flows(10, FlowSpec::random(10_000, 1, 10))
                .servers(4),
        }
    }

    /// Builds the profile's workload with `seed`.
    #[must_use]
    pub fn workload(self, seed: u64) -> Workload {
        self.builder().seed(seed).build()
    }

    /// Largest acceptable fair-share deviation, in percentage points.
    ///
    /// `None` for profiles that are reported but not judged.
    #[must_use]
    pub const fn max_deviation(self) -> Option<f64> {
        match self {
            Self::Uniform => Some(0.1),
            Self::RandomService | Self::OneBurst => Some(1.0),
            Self::Parallel => Some(2.0),
            Self::LongRunning => None,
        }
    }

    /// Returns true if `stats` has no violations and meets the deviation bound.
    #[must_use]
    pub fn accepts(self, stats: &WorkloadStats) -> bool {
        stats.violations.is_empty()
            && self
                .max_deviation()
                .map_or(true, |max| stats.fairness.deviation <= max)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for an unknown profile name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown profile '{0}'")]
pub struct UnknownProfile(pub String);

impl FromStr for Profile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| UnknownProfile(s.to_string()))
    }
}
