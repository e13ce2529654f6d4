//! Helix Workload: Deterministic Fairness Simulation
//!
//! A framework for checking the fair-queuing scheduler end to end:
//!
//! 1. **Generation** - Per-flow work drawn from a seeded RNG
//! 2. **Simulation** - A discrete-event executor over a manual clock
//! 3. **Verification** - FIFO-per-flow, lost work, and fair share while all
//!    flows compete
//!
//! # Example
//!
//! ```ignore
//! use helix_workload::{FlowSpec, Workload};
//!
//! let mut workload = Workload::builder()
//!     .seed(42)
//!     .flows(10, FlowSpec::uniform(1_000, 1))
//!     .build();
//!
//! let stats = workload.run()?;
//! assert!(stats.violations.is_empty());
//! assert!(stats.fairness.deviation < 0.1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod history;
mod profiles;
mod simulator;
mod verification;
mod workload;

pub use history::{DispatchRecord, FlowTotals, History, HistoryStats};
pub use profiles::{Profile, UnknownProfile};
pub use simulator::{SimulationError, SimulationOutcome, Simulator};
pub use verification::{FairnessReport, FlowShare, Verification, Violation};
pub use workload::{
    Arrival, FlowSpec, WorkItem, Workload, WorkloadBuilder, WorkloadConfig, WorkloadStats,
};
