//! Error types for engine setup
//!
//! Per-request failures never appear here; they reach the caller as an
//! `ErrorCode` on the response. These types cover the one fallible
//! entry point: validating a configuration at engine construction.

use core::fmt;

use crate::constants::MAX_CHANNELS;

/// Result alias for engine construction.
pub type SetupResult<T> = Result<T, ConfigError>;

/// Rejected configuration values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `max_requests` was zero.
    ZeroRequests,

    /// `num_channels` was zero.
    ZeroChannels,

    /// `num_lanes` was zero.
    ZeroLanes,

    /// `num_channels` exceeded the hard maximum.
    TooManyChannels(usize),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroRequests => write!(f, "max_requests must be at least 1"),
            ConfigError::ZeroChannels => write!(f, "num_channels must be at least 1"),
            ConfigError::ZeroLanes => write!(f, "num_lanes must be at least 1"),
            ConfigError::TooManyChannels(n) => {
                write!(f, "num_channels {} exceeds maximum {}", n, MAX_CHANNELS)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            format!("{}", ConfigError::ZeroLanes),
            "num_lanes must be at least 1"
        );
        let e = ConfigError::TooManyChannels(1000);
        assert!(format!("{}", e).contains("1000"));
    }
}
