//! # gfetch-core
//!
//! Core types for the gfetch asynchronous file streaming engine.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! The engine itself (pool, channels, workers, loaders) lives in the
//! `gfetch` crate.
//!
//! ## Modules
//!
//! - `id` - Generation-counted request handle
//! - `ring` - Fixed-capacity ring buffer of slot ids
//! - `state` - Request state machine and error codes
//! - `error` - Setup error types
//! - `kprint` - Kernel-style debug printing macros

pub mod error;
pub mod id;
pub mod kprint;
pub mod ring;
pub mod state;

// Re-exports for convenience
pub use error::{ConfigError, SetupResult};
pub use id::{RequestId, SLOT_NONE};
pub use kprint::{set_log_level, LogLevel};
pub use ring::RingBuffer;
pub use state::{ErrorCode, RequestState};

/// Engine-wide limits and defaults
pub mod constants {
    /// Hard maximum number of channels.
    pub const MAX_CHANNELS: usize = 64;

    /// Default size of the request pool.
    pub const DEFAULT_MAX_REQUESTS: usize = 128;

    /// Default number of channels.
    pub const DEFAULT_NUM_CHANNELS: usize = 1;

    /// Default number of lanes per channel.
    pub const DEFAULT_NUM_LANES: usize = 16;

    /// Maximum accepted path length in bytes.
    pub const MAX_PATH_LEN: usize = 1024;

    /// Maximum size of the inline user-data blob copied at send time.
    pub const MAX_USER_DATA_SIZE: usize = 128;

    /// Sentinel lane index meaning "no lane assigned".
    pub const LANE_NONE: u32 = u32::MAX;

    cfg_if::cfg_if! {
        if #[cfg(target_family = "wasm")] {
            /// Whether this platform lacks worker threads and must run
            /// requests inline on the pumping thread.
            pub const SINGLE_THREADED_PLATFORM: bool = true;
        } else {
            /// Whether this platform lacks worker threads and must run
            /// requests inline on the pumping thread.
            pub const SINGLE_THREADED_PLATFORM: bool = false;
        }
    }
}
