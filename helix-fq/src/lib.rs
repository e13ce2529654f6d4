//! Virtual-time fair queuing for Helix.
//!
//! This crate decides which flow's next work item may start service when
//! many flows compete for a fixed amount of concurrency. It includes:
//!
//! - **Fair queue engine**: One FIFO per flow, a global virtual clock and
//!   smallest-virtual-finish selection with round-robin tie-breaking.
//! - **Scheduler**: The engine behind a mutex, driven by an injected clock.
//! - **Clocks**: System, manual and interval clocks for deterministic tests.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     FairQueueScheduler                          │
//! │                                                                 │
//! │  enqueue ──▶ ┌────────────────────────────────┐ ──▶ dequeue     │
//! │              │          FairQueue             │                 │
//! │              │  FlowQueue  FlowQueue  ...     │                 │
//! │              │  virtual clock (VirtualTime)   │ ◀── finish      │
//! │              └────────────────────────────────┘                 │
//! │                           ▲                                     │
//! │                         Clock                                   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Virtual time
//!
//! The virtual clock advances at `min(reqs, C) / NEQ` per real nanosecond,
//! where `reqs` is pending plus in-service work, `C` the concurrency limit
//! and `NEQ` the number of active queues. A queue's head packet finishes at
//! `virtual_start + estimate`; the smallest finish across queues is served
//! next. Dequeue charges the estimate, finish corrects it to the actual
//! service time.
//!
//! # DST Compatibility
//!
//! [`FairQueue`] accepts `now_ns` as a parameter on every operation rather
//! than reading system time, so simulations control time completely.
//! [`FairQueueScheduler`] reads the same value from a [`Clock`].
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use helix_core::FlowKey;
//! use helix_fq::{FairQueueConfig, FairQueueScheduler, ManualClock};
//!
//! let clock = ManualClock::new(0);
//! let scheduler = FairQueueScheduler::with_flow_count(
//!     2,
//!     FairQueueConfig::for_testing(),
//!     clock.clone(),
//! )
//! .unwrap();
//!
//! scheduler.enqueue(FlowKey::new(0), "a").unwrap();
//! scheduler.enqueue(FlowKey::new(1), "b").unwrap();
//!
//! if let Some(packet) = scheduler.dequeue() {
//!     // Serve the packet...
//!     clock.advance(Duration::from_nanos(80));
//!     let done = scheduler.complete(packet).unwrap();
//!     assert_eq!(done.actual_service, Duration::from_nanos(80));
//! }
//! ```

#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod error;
pub mod fair_queue;
pub mod packet;
pub mod queue;
pub mod scheduler;
pub mod virtual_time;

// Re-export main types for convenience.
pub use clock::{duration_to_nanos, Clock, IntervalClock, ManualClock, SystemClock};
pub use config::{FairQueueConfig, SyncPolicy};
pub use error::{FqError, FqResult};
pub use fair_queue::{FairQueue, FairQueueStats};
pub use packet::{Completion, Packet};
pub use queue::{FlowQueue, LastFinish, QueueSnapshot};
pub use scheduler::FairQueueScheduler;
pub use virtual_time::{VirtualTime, VirtualTimeRatio, FRACTION_BITS};
