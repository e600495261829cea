//! Request descriptor, pool slot record, and response passed to callbacks
//!
//! A request record is split into two thread-domain views. The user-side
//! view is only ever touched by the thread that owns the engine. The
//! thread-side view travels to the channel's worker inside a `Job` and
//! back; while it is on loan, the slot's `thread` field is `None`, so the
//! exclusive-ownership invariant is enforced by moves instead of by
//! convention.

use std::path::{Path, PathBuf};

use gfetch_core::constants::{LANE_NONE, MAX_USER_DATA_SIZE};
use gfetch_core::{ErrorCode, RequestId, RequestState};

use crate::loader::FileHandle;

/// Response callback, invoked on the thread that pumps the engine.
pub type ResponseCallback = Box<dyn FnMut(&mut Response<'_>) + Send + 'static>;

/// Descriptor for one fetch operation, passed to `Engine::send`.
///
/// Built in chained style:
///
/// ```ignore
/// let req = Request::new("assets/map.bin", |resp| { /* ... */ })
///     .channel(1)
///     .buffer(vec![0; 64 * 1024])
///     .chunk_size(64 * 1024);
/// ```
pub struct Request {
    pub(crate) path: PathBuf,
    pub(crate) callback: ResponseCallback,
    pub(crate) channel: usize,
    pub(crate) buffer: Option<Vec<u8>>,
    pub(crate) chunk_size: usize,
    pub(crate) user_data: Vec<u8>,
}

impl Request {
    /// Create a descriptor for `path` with its response callback.
    ///
    /// The callback runs on the pumping thread for every state the
    /// caller must react to: `Opened`, each `Fetched` chunk, `Paused`
    /// once per pump cycle, and exactly once for `Failed`.
    pub fn new<P, F>(path: P, callback: F) -> Self
    where
        P: Into<PathBuf>,
        F: FnMut(&mut Response<'_>) + Send + 'static,
    {
        Request {
            path: path.into(),
            callback: Box::new(callback),
            channel: 0,
            buffer: None,
            chunk_size: 0,
            user_data: Vec::new(),
        }
    }

    /// Target channel index. Defaults to channel 0.
    pub fn channel(mut self, index: usize) -> Self {
        self.channel = index;
        self
    }

    /// Supply the receive buffer up front.
    ///
    /// A request with a buffer skips the `Opened` callback and goes
    /// straight from opening to fetching.
    pub fn buffer(mut self, buffer: Vec<u8>) -> Self {
        self.buffer = Some(buffer);
        self
    }

    /// Enable streaming: deliver the content in chunks of `bytes`.
    ///
    /// The chunk size must fit the supplied buffer, otherwise the
    /// request fails with `BufferTooSmall`. Zero (the default) loads
    /// the whole content in one fetch.
    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    /// Attach a small user-data blob, copied by value at send time and
    /// readable from every response. At most `MAX_USER_DATA_SIZE` bytes;
    /// longer blobs make `send` return the invalid handle.
    pub fn user_data(mut self, bytes: &[u8]) -> Self {
        self.user_data = bytes.to_vec();
        self
    }
}

/// Inline user-data blob stored in the pool slot.
#[derive(Clone, Copy)]
pub(crate) struct UserData {
    bytes: [u8; MAX_USER_DATA_SIZE],
    len: usize,
}

impl UserData {
    pub(crate) fn empty() -> Self {
        UserData {
            bytes: [0; MAX_USER_DATA_SIZE],
            len: 0,
        }
    }

    /// Copy from a slice. Caller has already validated the length.
    pub(crate) fn from_slice(src: &[u8]) -> Self {
        let mut data = UserData::empty();
        data.bytes[..src.len()].copy_from_slice(src);
        data.len = src.len();
        data
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl Default for UserData {
    fn default() -> Self {
        UserData::empty()
    }
}

/// Deferred pause/resume request, consumed at the next pump cycle.
///
/// A single field, so the last call before the pump wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum PendingFlag {
    #[default]
    None,
    Pause,
    Resume,
}

/// Progress fields owned by the pumping thread.
#[derive(Default)]
pub(crate) struct UserView {
    pub buffer: Option<Vec<u8>>,
    pub content_size: u64,
    /// Total bytes fetched so far.
    pub fetched_offset: u64,
    /// Size of the most recent chunk.
    pub fetched_size: u64,
    pub error: ErrorCode,
    pub finished: bool,
}

impl UserView {
    fn reset(&mut self) {
        self.buffer = None;
        self.content_size = 0;
        self.fetched_offset = 0;
        self.fetched_size = 0;
        self.error = ErrorCode::None;
        self.finished = false;
    }
}

/// Progress fields owned by whichever side currently holds the view.
///
/// Travels to the worker inside a `Job` and back. The open file handle
/// and the caller buffer live here while I/O is in flight.
pub(crate) struct ThreadView {
    pub path: PathBuf,
    pub file: Option<FileHandle>,
    pub buffer: Option<Vec<u8>>,
    pub content_size: u64,
    pub fetched_offset: u64,
    pub fetched_size: u64,
    pub error: ErrorCode,
    pub failed: bool,
    pub finished: bool,
}

impl ThreadView {
    pub(crate) fn new(path: PathBuf) -> Self {
        ThreadView {
            path,
            file: None,
            buffer: None,
            content_size: 0,
            fetched_offset: 0,
            fetched_size: 0,
            error: ErrorCode::None,
            failed: false,
            finished: false,
        }
    }
}

/// One pool slot: the full record for one request.
pub(crate) struct Slot {
    /// Generation counter, bumped at every allocation of this slot.
    pub gen: u32,
    pub state: RequestState,
    pub channel: usize,
    pub lane: u32,
    pub path: PathBuf,
    pub chunk_size: usize,
    pub callback: Option<ResponseCallback>,
    pub user_data: UserData,
    pub pending_cancel: bool,
    pub pending_pause: PendingFlag,
    pub user: UserView,
    /// `None` while the thread view is on loan to the worker.
    pub thread: Option<ThreadView>,
}

impl Slot {
    pub(crate) fn unused() -> Self {
        Slot {
            gen: 0,
            state: RequestState::Initial,
            channel: 0,
            lane: LANE_NONE,
            path: PathBuf::new(),
            chunk_size: 0,
            callback: None,
            user_data: UserData::empty(),
            pending_cancel: false,
            pending_pause: PendingFlag::None,
            user: UserView::default(),
            thread: None,
        }
    }

    /// Return the slot to the unused state, dropping the callback, any
    /// buffer, and any open file handle. The generation stays, so
    /// handles issued for the previous occupant keep failing validation.
    pub(crate) fn reset(&mut self) {
        self.state = RequestState::Initial;
        self.channel = 0;
        self.lane = LANE_NONE;
        self.path = PathBuf::new();
        self.chunk_size = 0;
        self.callback = None;
        self.user_data = UserData::empty();
        self.pending_cancel = false;
        self.pending_pause = PendingFlag::None;
        self.user.reset();
        self.thread = None;
    }
}

/// Everything a callback may read about its request, plus the actions
/// it may record for the engine to apply after it returns.
///
/// Callbacks cannot re-enter the engine (it is mutably borrowed while
/// they run), so buffer hand-over and pause/resume/cancel from inside a
/// callback are recorded here instead and applied at return.
pub struct Response<'a> {
    pub(crate) handle: RequestId,
    pub(crate) state: RequestState,
    pub(crate) finished: bool,
    pub(crate) channel: usize,
    pub(crate) lane: u32,
    pub(crate) path: &'a Path,
    pub(crate) error: ErrorCode,
    pub(crate) content_size: u64,
    pub(crate) data_offset: u64,
    pub(crate) chunk_len: usize,
    pub(crate) user_data: UserData,
    pub(crate) buffer: Option<Vec<u8>>,
    pub(crate) pending_pause: PendingFlag,
    pub(crate) pending_cancel: bool,
}

impl<'a> Response<'a> {
    /// Handle of the request this response belongs to.
    pub fn handle(&self) -> RequestId {
        self.handle
    }

    /// Current request state.
    pub fn state(&self) -> RequestState {
        self.state
    }

    /// True on the last callback this request will ever receive.
    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Channel the request runs on.
    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Lane the request occupies on its channel.
    pub fn lane(&self) -> usize {
        self.lane as usize
    }

    /// Path from the original request descriptor.
    pub fn path(&self) -> &Path {
        self.path
    }

    /// Error code; `ErrorCode::None` unless `failed()`.
    pub fn error(&self) -> ErrorCode {
        self.error
    }

    /// Total content size in bytes, known once the file is opened.
    pub fn content_size(&self) -> u64 {
        self.content_size
    }

    /// Byte offset of the current chunk within the content.
    pub fn data_offset(&self) -> u64 {
        self.data_offset
    }

    /// The valid bytes of the current chunk. Empty unless `fetched()`.
    pub fn data(&self) -> &[u8] {
        if self.state == RequestState::Fetched {
            match &self.buffer {
                Some(buf) => &buf[..self.chunk_len],
                None => &[],
            }
        } else {
            &[]
        }
    }

    /// The user-data blob copied at send time.
    pub fn user_data(&self) -> &[u8] {
        self.user_data.as_slice()
    }

    /// True when the file was opened without a buffer and the caller is
    /// expected to supply one.
    pub fn dispatched(&self) -> bool {
        self.state == RequestState::Opened
    }

    /// True when a chunk of data is available via `data()`.
    pub fn fetched(&self) -> bool {
        self.state == RequestState::Fetched
    }

    /// True while the request sits in the paused state.
    pub fn paused(&self) -> bool {
        self.state == RequestState::Paused
    }

    /// True on the terminal error callback.
    pub fn failed(&self) -> bool {
        self.state == RequestState::Failed
    }

    /// True when the failure was caused by `cancel`.
    pub fn cancelled(&self) -> bool {
        self.error == ErrorCode::Cancelled
    }

    // -- in-callback actions, applied after the callback returns --

    /// Hand a receive buffer to the request, replacing any current one.
    pub fn set_buffer(&mut self, buffer: Vec<u8>) {
        self.buffer = Some(buffer);
    }

    /// Take the buffer back from the engine.
    ///
    /// Meant for the terminal callback, to reclaim the allocation; on a
    /// non-terminal response the request will fail with `NoBuffer` at
    /// its next fetch unless a replacement is supplied.
    pub fn take_buffer(&mut self) -> Option<Vec<u8>> {
        self.buffer.take()
    }

    /// Pause the request at the next pump cycle.
    pub fn pause(&mut self) {
        self.pending_pause = PendingFlag::Pause;
    }

    /// Resume a paused request at the next pump cycle. The last of
    /// `pause`/`resume` recorded before the pump wins.
    pub fn resume(&mut self) {
        self.pending_pause = PendingFlag::Resume;
    }

    /// Cancel the request; it fails with `Cancelled` at the next pump.
    pub fn cancel(&mut self) {
        self.pending_cancel = true;
    }
}
