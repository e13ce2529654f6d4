//! Helix Core - Strongly-typed identifiers and limits for the Helix scheduler.
//!
//! This crate provides the vocabulary shared by every other crate in the
//! workspace. It does NOT provide clocks or scheduling logic; those live in
//! `helix-fq`.
//!
//! # Design Principles (TigerStyle)
//!
//! - **Strongly-typed IDs**: Prevent mixing up a `FlowKey` with a `PacketId`
//! - **Explicit limits**: Every queue and quantity has a bounded maximum
//! - **Explicit types**: Use u32/u64, not usize
//! - **No unsafe code**: Safety > Performance

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod limits;
mod types;

pub use error::{Error, Result};
pub use limits::Limits;
pub use types::{FlowKey, PacketId};
