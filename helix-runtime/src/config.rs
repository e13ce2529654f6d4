//! Runtime configuration.
//!
//! Configuration for the dispatch loop.

use std::time::Duration;

use crate::error::ConfigError;

/// Configuration for a [`crate::Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Interval between dispatch passes when nobody kicks the loop.
    pub tick_interval: Duration,
    /// Maximum packets in service at once; the loop stops dequeuing when
    /// this many are outstanding.
    pub max_in_flight: usize,
    /// Maximum packets handed to workers per pass.
    pub max_dispatch_per_tick: usize,
    /// Capacity of the command and worker channels.
    pub channel_capacity: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            max_in_flight: 100,
            max_dispatch_per_tick: 1_000,
            channel_capacity: 256,
        }
    }
}

impl DispatchConfig {
    /// Creates config suitable for testing (fast ticks, small bounds).
    #[must_use]
    pub const fn fast_for_testing() -> Self {
        Self {
            tick_interval: Duration::from_millis(5),
            max_in_flight: 4,
            max_dispatch_per_tick: 16,
            channel_capacity: 64,
        }
    }

    /// Sets the tick interval.
    #[must_use]
    pub const fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Sets the in-flight bound.
    #[must_use]
    pub const fn with_max_in_flight(mut self, max: usize) -> Self {
        self.max_in_flight = max;
        self
    }

    /// Sets the per-pass dispatch bound.
    #[must_use]
    pub const fn with_max_dispatch_per_tick(mut self, max: usize) -> Self {
        self.max_dispatch_per_tick = max;
        self
    }

    /// Sets the channel capacity.
    #[must_use]
    pub const fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns an error if any bound is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::InvalidTiming {
                message: "tick_interval must be positive".to_string(),
            });
        }

        if self.max_in_flight == 0 {
            return Err(ConfigError::InvalidBound {
                name: "max_in_flight",
            });
        }

        if self.max_dispatch_per_tick == 0 {
            return Err(ConfigError::InvalidBound {
                name: "max_dispatch_per_tick",
            });
        }

        if self.channel_capacity == 0 {
            return Err(ConfigError::InvalidBound {
                name: "channel_capacity",
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(DispatchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_fast_config_is_valid() {
        let config = DispatchConfig::fast_for_testing();
        assert!(config.validate().is_ok());
        assert!(config.tick_interval < DispatchConfig::default().tick_interval);
    }

    #[test]
    fn test_zero_tick_rejected() {
        let config = DispatchConfig::default().with_tick_interval(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTiming { .. })
        ));
    }

    #[test]
    fn test_zero_bounds_rejected() {
        let config = DispatchConfig::default().with_max_in_flight(0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidBound {
                name: "max_in_flight"
            })
        );

        let config = DispatchConfig::default().with_channel_capacity(0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidBound {
                name: "channel_capacity"
            })
        );
    }
}
