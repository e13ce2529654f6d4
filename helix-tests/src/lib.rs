//! Helix Tests - Deterministic Simulation Testing for the fair-queuing scheduler.
//!
//! This crate contains the DST (Deterministic Simulation Testing) and
//! integration tests that span more than one Helix crate. Tests are
//! organized by component and type:
//!
//! ## Test Organization
//!
//! **DST Tests** (`*_dst.rs`): Seeded random operation sequences
//! - `fair_queue_dst`: `FairQueue` engine driven with explicit time
//!
//! **Integration Tests** (`*_tests.rs`): Multi-component integration
//! - `scheduler_tests`: `FairQueueScheduler` shared across threads
//! - `dispatcher_tests`: admission, dispatch loop and worker completion
//! - `workload_tests`: simulated workloads across regression seeds
//!
//! **Support Modules**:
//! - `properties`: Invariant checker for engine state
//! - `scenarios`: Reusable seeds and operation generators
//!
//! ## Naming Conventions
//!
//! - DST tests: `test_dst_<component>_<scenario>`
//! - Integration tests: `test_<component>_<scenario>`
//! - Unit tests: Inline in each crate under `#[cfg(test)]`

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod properties;
pub mod scenarios;

// DST test modules.
#[cfg(test)]
mod fair_queue_dst;

#[cfg(test)]
mod scheduler_tests;
