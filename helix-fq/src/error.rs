//! Fair-queuing error types.

use helix_core::{FlowKey, PacketId};

/// Fair-queuing error type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FqError {
    /// The flow key does not resolve to a configured queue.
    #[error("no queue configured for {flow}")]
    NoSuchQueue {
        /// The flow key presented at enqueue time.
        flow: FlowKey,
    },

    /// The packet is not currently in service (finished twice, or never
    /// dequeued from this scheduler).
    #[error("{packet} of {flow} is not in service")]
    NotInService {
        /// The packet's flow.
        flow: FlowKey,
        /// The packet.
        packet: PacketId,
    },

    /// Queue is full.
    #[error("queue for {flow} full: {size} packets (max {max_size})")]
    QueueFull {
        /// The flow whose queue is full.
        flow: FlowKey,
        /// Current queue size.
        size: usize,
        /// Maximum queue size.
        max_size: usize,
    },

    /// Two queues were configured with the same flow key.
    #[error("duplicate queue for {flow}")]
    DuplicateQueue {
        /// The repeated flow key.
        flow: FlowKey,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] helix_core::Error),
}

/// Result type for fair-queuing operations.
pub type FqResult<T> = Result<T, FqError>;
