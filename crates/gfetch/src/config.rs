//! Engine configuration

use gfetch_core::constants::{
    DEFAULT_MAX_REQUESTS, DEFAULT_NUM_CHANNELS, DEFAULT_NUM_LANES, MAX_CHANNELS,
    SINGLE_THREADED_PLATFORM,
};
use gfetch_core::ConfigError;

use crate::dispatch::DispatchMode;

/// Configuration for the engine
///
/// All memory is sized from these values at construction; nothing is
/// allocated afterwards during normal operation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Size of the request pool (maximum in-flight requests).
    pub max_requests: usize,

    /// Number of channels. Each channel gets its own worker thread in
    /// threaded mode.
    pub num_channels: usize,

    /// Number of lanes per channel: the hard cap on requests a channel
    /// processes concurrently.
    pub num_lanes: usize,

    /// Execution strategy for all channels.
    pub dispatch: DispatchMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            num_channels: DEFAULT_NUM_CHANNELS,
            num_lanes: DEFAULT_NUM_LANES,
            dispatch: if SINGLE_THREADED_PLATFORM {
                DispatchMode::Inline
            } else {
                DispatchMode::Threaded
            },
        }
    }
}

impl Config {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the request pool size
    pub fn max_requests(mut self, n: usize) -> Self {
        self.max_requests = n;
        self
    }

    /// Set the number of channels (clamped to the hard maximum)
    pub fn num_channels(mut self, n: usize) -> Self {
        self.num_channels = n.min(MAX_CHANNELS);
        self
    }

    /// Set the number of lanes per channel
    pub fn num_lanes(mut self, n: usize) -> Self {
        self.num_lanes = n;
        self
    }

    /// Set the execution strategy
    pub fn dispatch(mut self, mode: DispatchMode) -> Self {
        self.dispatch = mode;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_requests == 0 {
            return Err(ConfigError::ZeroRequests);
        }
        if self.num_channels == 0 {
            return Err(ConfigError::ZeroChannels);
        }
        if self.num_channels > MAX_CHANNELS {
            return Err(ConfigError::TooManyChannels(self.num_channels));
        }
        if self.num_lanes == 0 {
            return Err(ConfigError::ZeroLanes);
        }
        Ok(())
    }
}
