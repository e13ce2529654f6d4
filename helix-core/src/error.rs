//! Error types for Helix core operations.
//!
//! Following `TigerStyle`: all errors must be handled explicitly.
//! No silent failures, no ignored errors.

/// The result type for Helix core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while validating identifiers, limits and configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A resource limit was exceeded.
    #[error("limit exceeded: {limit} (max={max}, actual={actual})")]
    LimitExceeded {
        /// Which limit was exceeded.
        limit: &'static str,
        /// The maximum allowed value.
        max: u64,
        /// The actual value that exceeded the limit.
        actual: u64,
    },

    /// An invalid argument was provided.
    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument {
        /// The name of the argument.
        name: &'static str,
        /// Why it was invalid.
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_display() {
        let err = Error::InvalidArgument {
            name: "service_quantum",
            reason: "must be positive",
        };
        assert_eq!(
            format!("{err}"),
            "invalid argument 'service_quantum': must be positive"
        );
    }

    #[test]
    fn test_limit_exceeded_display() {
        let err = Error::LimitExceeded {
            limit: "max_queues",
            max: 1024,
            actual: 2048,
        };
        let msg = format!("{err}");
        assert!(msg.contains("max_queues"));
        assert!(msg.contains("1024"));
        assert!(msg.contains("2048"));
    }
}
