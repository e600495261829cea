//! # gfetch
//!
//! Asynchronous file streaming engine with bounded concurrency.
//!
//! Requests are submitted with `Engine::send` and processed by
//! per-channel worker threads performing blocking reads; the owning
//! thread never blocks. Calling `Engine::dowork` once per frame pumps
//! the channels: it admits queued requests into free lanes, hands them
//! to the workers, drains completed passes, and invokes response
//! callbacks on the calling thread.
//!
//! ```ignore
//! let mut engine = Engine::new(Config::new().num_channels(2))?;
//! let handle = engine.send(
//!     Request::new("assets/level.bin", |resp| {
//!         if resp.fetched() {
//!             consume(resp.data());
//!         }
//!     })
//!     .buffer(vec![0; 64 * 1024])
//!     .chunk_size(64 * 1024),
//! );
//! loop {
//!     engine.dowork();
//!     // render frame ...
//! }
//! ```
//!
//! ## Modules
//!
//! - `config` - Engine configuration
//! - `engine` - Top-level context and public request lifecycle API
//! - `channel` - Lane admission and the pump cycle
//! - `dispatch` - Worker-thread and inline execution strategies
//! - `pool` - Generation-counted request pool
//! - `request` - Request descriptor, slot record, response
//! - `loader` - Platform file loader
//!
//! Known limitation: there is no timeout or stuck-request detection. A
//! request whose I/O never completes occupies its lane forever.

mod channel;
pub mod config;
mod dispatch;
pub mod engine;
mod loader;
mod pool;
pub mod request;

pub use config::Config;
pub use dispatch::DispatchMode;
pub use engine::Engine;
pub use request::{Request, Response, ResponseCallback};

// Re-exports from gfetch-core so most callers need only this crate.
pub use gfetch_core::{set_log_level, ConfigError, ErrorCode, LogLevel, RequestId, RequestState};
