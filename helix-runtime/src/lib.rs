//! Helix Runtime - Tokio glue around the fair-queuing scheduler.
//!
//! The scheduler core never blocks or spawns. This crate supplies what a
//! service needs around it: mapping requests to flows, admitting them, and
//! a dispatch loop that feeds workers while respecting a concurrency bound.
//!
//! # Overview
//!
//! The runtime provides:
//! - `FlowResolver`: Maps a work descriptor to a flow key
//! - `Admission`: Resolves then enqueues
//! - `Dispatcher`: Periodic dispatch loop feeding a worker channel
//! - `DispatcherHandle`: Completes packets and controls the loop
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use helix_fq::{FairQueueConfig, FairQueueScheduler};
//! use helix_runtime::{Admission, DispatchConfig, Dispatcher, HashFlowResolver};
//!
//! let scheduler = Arc::new(FairQueueScheduler::new(
//!     (0..16).map(helix_core::FlowKey::new),
//!     FairQueueConfig::default(),
//! )?);
//! let admission = Admission::new(HashFlowResolver::new(16).unwrap(), Arc::clone(&scheduler));
//!
//! let (dispatcher, mut packets) = Dispatcher::new(DispatchConfig::default(), scheduler)?;
//! let (handle, dispatch_future) = dispatcher.run();
//! tokio::spawn(dispatch_future);
//!
//! admission.admit("tenant-a", request)?;
//! while let Some(packet) = packets.recv().await {
//!     // Serve the request, then:
//!     handle.complete(packet)?;
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod admission;
mod config;
mod dispatcher;
mod error;
mod resolver;

pub use admission::Admission;
pub use config::DispatchConfig;
pub use dispatcher::{DispatchCommand, DispatchStats, Dispatcher, DispatcherHandle};
pub use error::{AdmissionError, ConfigError, DispatchError};
pub use resolver::{FlowResolver, HashFlowResolver, StaticFlowResolver};
