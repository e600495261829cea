//! Engine: the top-level context owning the pool and the channels
//!
//! Constructed explicitly and passed around by the caller; there is no
//! process-global state, and several independent engines can coexist.
//! All engine methods must be called from the thread that owns it; the
//! only other threads involved are the channel workers, which never
//! touch the pool or invoke callbacks.

use gfetch_core::constants::{LANE_NONE, MAX_PATH_LEN, MAX_USER_DATA_SIZE};
use gfetch_core::{kdebug, kinfo, kprint, kwarn, ConfigError, RequestId};

use crate::channel::Channel;
use crate::config::Config;
use crate::pool::RequestPool;
use crate::request::{PendingFlag, Request, ThreadView, UserData};

/// The fetch engine.
///
/// Owns the request pool and one channel per configured index. Dropping
/// the engine stops every worker thread; requests still in flight are
/// discarded and their callbacks never fire again.
pub struct Engine {
    pool: RequestPool,
    channels: Vec<Channel>,
}

impl Engine {
    /// Validate `config` and build the engine. This is the only place
    /// memory is allocated; worker threads (in threaded mode) start
    /// here.
    pub fn new(config: Config) -> Result<Engine, ConfigError> {
        kprint::init();
        config.validate()?;
        let channels = (0..config.num_channels)
            .map(|index| {
                Channel::new(index, config.max_requests, config.num_lanes, config.dispatch)
            })
            .collect();
        kinfo!(
            "engine up: {} requests, {} channels x {} lanes",
            config.max_requests,
            config.num_channels,
            config.num_lanes
        );
        Ok(Engine {
            pool: RequestPool::new(config.max_requests),
            channels,
        })
    }

    /// Submit a request.
    ///
    /// Returns `RequestId::INVALID` when the descriptor fails
    /// validation, the pool is exhausted, or the channel's sent queue
    /// is full. An invalid handle is harmless: every handle-taking
    /// method ignores it, and no callback will ever fire for it.
    pub fn send(&mut self, request: Request) -> RequestId {
        let Request {
            path,
            callback,
            channel,
            buffer,
            chunk_size,
            user_data,
        } = request;

        if path.as_os_str().is_empty() || path.as_os_str().len() > MAX_PATH_LEN {
            kwarn!("send rejected: bad path length {}", path.as_os_str().len());
            return RequestId::INVALID;
        }
        if channel >= self.channels.len() {
            kwarn!("send rejected: channel {} out of range", channel);
            return RequestId::INVALID;
        }
        if user_data.len() > MAX_USER_DATA_SIZE {
            kwarn!("send rejected: user data {} bytes", user_data.len());
            return RequestId::INVALID;
        }

        let id = match self.pool.allocate() {
            Some(id) => id,
            None => {
                kdebug!("send failed: request pool exhausted");
                return RequestId::INVALID;
            }
        };
        {
            let slot = self.pool.slot_mut(id.slot());
            slot.channel = channel;
            slot.lane = LANE_NONE;
            slot.chunk_size = chunk_size;
            slot.callback = Some(callback);
            slot.user_data = UserData::from_slice(&user_data);
            slot.user.buffer = buffer;
            slot.thread = Some(ThreadView::new(path.clone()));
            slot.path = path;
        }
        if !self.channels[channel].try_enqueue_sent(id.slot()) {
            self.pool.free(id);
            kdebug!("send failed: channel {} sent queue full", channel);
            return RequestId::INVALID;
        }
        id
    }

    /// Pump every channel.
    ///
    /// Call periodically from the owning thread (typically once per
    /// frame). Never blocks. Each channel is pumped twice so a request
    /// finishing one phase can start its next phase in the same call
    /// instead of waiting a full external cycle.
    pub fn dowork(&mut self) {
        for _ in 0..2 {
            for channel in &mut self.channels {
                channel.dowork(&mut self.pool);
            }
        }
    }

    /// True while `id` refers to a live request: from `send` until the
    /// request's terminal callback returns. Detects stale handles even
    /// after the pool slot was reused.
    pub fn handle_valid(&self, id: RequestId) -> bool {
        self.pool.contains(id)
    }

    /// Hand a receive buffer to a request outside of its callback.
    ///
    /// Applies only while the request is on the user side (for example
    /// right after `send`, or while paused); during an in-flight pass
    /// the buffer is dropped. From inside a callback use
    /// `Response::set_buffer` instead. No-ops on stale handles.
    pub fn set_buffer(&mut self, id: RequestId, buffer: Vec<u8>) {
        if let Some(slot) = self.pool.get_mut(id) {
            if slot.thread.is_some() {
                slot.user.buffer = Some(buffer);
            } else {
                kwarn!("set_buffer dropped: request {} is in flight", id);
            }
        }
    }

    /// Cancel a request. Observed at the next pump, producing exactly
    /// one terminal callback with the `Cancelled` error code, even if
    /// the request was never dispatched. No-ops on stale handles.
    pub fn cancel(&mut self, id: RequestId) {
        if let Some(slot) = self.pool.get_mut(id) {
            slot.pending_cancel = true;
        }
    }

    /// Pause a request at the next pump. While paused, its callback
    /// runs once per pump cycle with the `Paused` state. No-ops on
    /// stale handles.
    pub fn pause(&mut self, id: RequestId) {
        if let Some(slot) = self.pool.get_mut(id) {
            slot.pending_pause = PendingFlag::Pause;
        }
    }

    /// Resume a paused request at the next pump. The last of
    /// `pause`/`resume` recorded before the pump wins. No-ops on stale
    /// handles.
    pub fn resume(&mut self, id: RequestId) {
        if let Some(slot) = self.pool.get_mut(id) {
            slot.pending_pause = PendingFlag::Resume;
        }
    }

    /// Number of live requests in the pool.
    pub fn active_requests(&self) -> usize {
        self.pool.in_use()
    }

    /// Number of channels.
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Stop every worker thread and discard all queues. Equivalent to
    /// dropping the engine; requests still in flight never complete.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        for channel in &mut self.channels {
            channel.shutdown();
        }
        kinfo!("engine down, {} requests abandoned", self.pool.in_use());
    }
}
