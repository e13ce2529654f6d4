//! Runtime error types.

use helix_fq::FqError;

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Invalid timing configuration.
    #[error("invalid timing: {message}")]
    InvalidTiming {
        /// Error description.
        message: String,
    },
    /// A bound that must be positive was zero.
    #[error("invalid bound: {name} must be positive")]
    InvalidBound {
        /// Name of the bound.
        name: &'static str,
    },
}

/// Dispatcher errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The dispatch loop has stopped.
    #[error("dispatcher unavailable")]
    Unavailable,
    /// The scheduler rejected the operation.
    #[error(transparent)]
    Scheduler(#[from] FqError),
}

/// Admission errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionError {
    /// The descriptor did not resolve to any flow.
    #[error("descriptor does not resolve to a flow")]
    Unresolved,
    /// The scheduler rejected the packet.
    #[error(transparent)]
    Scheduler(#[from] FqError),
}
