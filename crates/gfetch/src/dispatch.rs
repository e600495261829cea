//! Request execution strategies
//!
//! A channel hands admitted requests to its `Dispatch` as `Job` values
//! and collects them back once the blocking I/O for that pass is done.
//!
//! Two strategies implement the same interface:
//!
//! - `ThreadedDispatch`: one dedicated OS worker thread per channel,
//!   fed through a bounded Mutex+Condvar queue. The worker blocks only
//!   on that queue and on the I/O syscalls themselves; completed jobs
//!   return through a lock-free queue the pump drains without waiting.
//! - `InlineDispatch`: runs the handler synchronously inside `submit`,
//!   for platforms without worker threads and for deterministic tests.
//!
//! No lock is ever held across a blocking I/O call.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use crossbeam_queue::ArrayQueue;

use gfetch_core::{ErrorCode, RequestState};

use crate::loader::FileHandle;
use crate::request::ThreadView;

/// One unit of work on loan to the dispatch: the slot index, the state
/// to execute, and the request's thread-side view (file handle, buffer,
/// progress counters).
///
/// The worker never touches the pool; everything it needs moves with
/// the job.
pub(crate) struct Job {
    pub slot: u32,
    pub state: RequestState,
    pub chunk_size: usize,
    pub thread: ThreadView,
}

/// Execute one pass of the request handler for `job`.
///
/// Runs in worker context (or inline). Expects `Opening` or `Fetching`
/// on entry; leaves `Opened`, `Fetched`, or `Failed` behind, with the
/// thread view's progress fields updated.
pub(crate) fn execute(job: &mut Job) {
    match job.state {
        RequestState::Opening => {
            let file = match FileHandle::open(&job.thread.path) {
                Ok(file) => file,
                Err(e) => return fail(job, e.into()),
            };
            match file.size() {
                Ok(size) => job.thread.content_size = size,
                Err(e) => return fail(job, e.into()),
            }
            job.thread.file = Some(file);
            if job.thread.buffer.is_some() {
                // Buffer already supplied: skip the Opened round-trip
                // and fetch the first chunk in the same pass.
                job.state = RequestState::Fetching;
                fetch(job);
            } else {
                job.state = RequestState::Opened;
            }
        }
        RequestState::Fetching => fetch(job),
        state => {
            debug_assert!(false, "job in non-worker state {}", state);
            fail(job, ErrorCode::Unknown);
        }
    }
}

fn fetch(job: &mut Job) {
    let buffer_len = job.thread.buffer.as_ref().map_or(0, Vec::len);
    if buffer_len == 0 {
        return fail(job, ErrorCode::NoBuffer);
    }
    if job.thread.file.is_none() {
        return fail(job, ErrorCode::Unknown);
    }

    let content_size = job.thread.content_size;
    let remaining = content_size - job.thread.fetched_offset;
    let bytes_to_read = if job.chunk_size == 0 {
        // Whole-content load: everything must fit the buffer.
        if content_size <= buffer_len as u64 {
            content_size
        } else {
            return fail(job, ErrorCode::BufferTooSmall);
        }
    } else {
        // Streaming: a full chunk must fit the buffer; the final chunk
        // is clamped to the remaining content.
        if job.chunk_size <= buffer_len {
            (job.chunk_size as u64).min(remaining)
        } else {
            return fail(job, ErrorCode::BufferTooSmall);
        }
    };

    let offset = job.thread.fetched_offset;
    let n = bytes_to_read as usize;
    let read = {
        let view = &mut job.thread;
        let file = view.file.as_mut().expect("file presence checked above");
        let buf = view.buffer.as_mut().expect("buffer presence checked above");
        file.pread(offset, &mut buf[..n])
    };
    match read {
        Ok(got) if got == n => {
            let view = &mut job.thread;
            view.fetched_size = bytes_to_read;
            view.fetched_offset += bytes_to_read;
            if view.fetched_offset >= view.content_size {
                view.finished = true;
            }
            job.state = RequestState::Fetched;
        }
        // A short read is fatal for the request, never retried.
        Ok(_) => fail(job, ErrorCode::UnexpectedEof),
        Err(_) => fail(job, ErrorCode::UnexpectedEof),
    }
}

fn fail(job: &mut Job, error: ErrorCode) {
    job.thread.error = error;
    job.thread.failed = true;
    job.thread.finished = true;
    job.state = RequestState::Failed;
}

/// Hand-off seam between a channel's pump and its execution strategy.
pub(crate) trait Dispatch: Send {
    /// Queue one job for execution. Never blocks the pumping thread.
    fn submit(&mut self, job: Job);

    /// Collect one completed job, if any. Never blocks.
    fn poll(&mut self) -> Option<Job>;

    /// Stop the strategy and release its resources. Idempotent. Jobs
    /// still queued or in flight are dropped.
    fn join(&mut self);
}

/// Which execution strategy a channel uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// One dedicated OS worker thread per channel.
    Threaded,

    /// Synchronous execution on the pumping thread.
    Inline,
}

/// Shared state between the pump and the worker thread.
struct Shared {
    /// Pump -> worker. Bounded by the channel's lane count.
    incoming: Mutex<VecDeque<Job>>,
    work_ready: Condvar,
    /// Worker -> pump. Same bound.
    outgoing: ArrayQueue<Job>,
    stop: AtomicBool,
}

/// One worker thread pulling jobs from a condvar-guarded queue.
pub(crate) struct ThreadedDispatch {
    shared: Arc<Shared>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ThreadedDispatch {
    pub(crate) fn new(channel_index: usize, num_lanes: usize) -> Self {
        let shared = Arc::new(Shared {
            incoming: Mutex::new(VecDeque::with_capacity(num_lanes)),
            work_ready: Condvar::new(),
            outgoing: ArrayQueue::new(num_lanes.max(1)),
            stop: AtomicBool::new(false),
        });
        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(format!("gfetch-chan-{}", channel_index))
            .spawn(move || worker_loop(worker_shared))
            .expect("failed to spawn channel worker thread");
        ThreadedDispatch {
            shared,
            handle: Some(handle),
        }
    }
}

impl Dispatch for ThreadedDispatch {
    fn submit(&mut self, job: Job) {
        {
            let mut queue = self.shared.incoming.lock().unwrap();
            queue.push_back(job);
        }
        self.shared.work_ready.notify_one();
    }

    fn poll(&mut self) -> Option<Job> {
        self.shared.outgoing.pop()
    }

    fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.shared.stop.store(true, Ordering::SeqCst);
        // Take the lock before signalling so a worker between its stop
        // check and its wait cannot miss the wakeup.
        drop(self.shared.incoming.lock().unwrap());
        self.shared.work_ready.notify_all();
        let _ = handle.join();
    }
}

impl Drop for ThreadedDispatch {
    fn drop(&mut self) {
        self.join();
    }
}

/// Worker thread main loop: block for a job, run it, return it.
fn worker_loop(shared: Arc<Shared>) {
    loop {
        let mut job = {
            let mut queue = shared.incoming.lock().unwrap();
            loop {
                if shared.stop.load(Ordering::SeqCst) {
                    return;
                }
                if let Some(job) = queue.pop_front() {
                    break job;
                }
                queue = shared.work_ready.wait(queue).unwrap();
            }
        };

        // Blocking I/O happens here, with no lock held.
        execute(&mut job);

        loop {
            match shared.outgoing.push(job) {
                Ok(()) => break,
                Err(returned) => {
                    // The outgoing queue holds one entry per lane, so it
                    // only fills if the pump has stalled. Spin briefly
                    // rather than drop the job.
                    if shared.stop.load(Ordering::SeqCst) {
                        return;
                    }
                    job = returned;
                    std::hint::spin_loop();
                }
            }
        }
    }
}

/// Synchronous execution on the pumping thread.
///
/// The single-threaded platform strategy: `submit` runs the handler
/// immediately and the result is available at the next `poll`.
pub(crate) struct InlineDispatch {
    done: VecDeque<Job>,
}

impl InlineDispatch {
    pub(crate) fn new(num_lanes: usize) -> Self {
        InlineDispatch {
            done: VecDeque::with_capacity(num_lanes),
        }
    }
}

impl Dispatch for InlineDispatch {
    fn submit(&mut self, mut job: Job) {
        execute(&mut job);
        self.done.push_back(job);
    }

    fn poll(&mut self) -> Option<Job> {
        self.done.pop_front()
    }

    fn join(&mut self) {
        self.done.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn temp_file(content: &[u8]) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(content).unwrap();
        tmp.flush().unwrap();
        tmp
    }

    fn job_for(path: PathBuf, buffer: Option<Vec<u8>>, chunk_size: usize) -> Job {
        let mut thread = ThreadView::new(path);
        thread.buffer = buffer;
        Job {
            slot: 0,
            state: RequestState::Opening,
            chunk_size,
            thread,
        }
    }

    #[test]
    fn test_execute_open_without_buffer() {
        let tmp = temp_file(b"0123456789");
        let mut job = job_for(tmp.path().to_path_buf(), None, 0);
        execute(&mut job);
        assert_eq!(job.state, RequestState::Opened);
        assert_eq!(job.thread.content_size, 10);
        assert!(!job.thread.finished);
        assert!(job.thread.file.is_some());
    }

    #[test]
    fn test_execute_open_with_buffer_fetches_immediately() {
        let tmp = temp_file(b"0123456789");
        let mut job = job_for(tmp.path().to_path_buf(), Some(vec![0; 16]), 0);
        execute(&mut job);
        assert_eq!(job.state, RequestState::Fetched);
        assert!(job.thread.finished);
        assert_eq!(job.thread.fetched_size, 10);
        assert_eq!(&job.thread.buffer.as_ref().unwrap()[..10], b"0123456789");
    }

    #[test]
    fn test_execute_chunked_passes() {
        let tmp = temp_file(b"abcdefgh");
        let mut job = job_for(tmp.path().to_path_buf(), Some(vec![0; 3]), 3);
        execute(&mut job);
        assert_eq!(job.state, RequestState::Fetched);
        assert!(!job.thread.finished);
        assert_eq!(&job.thread.buffer.as_ref().unwrap()[..3], b"abc");

        // Second and third passes continue from the recorded offset.
        job.state = RequestState::Fetching;
        execute(&mut job);
        assert_eq!(&job.thread.buffer.as_ref().unwrap()[..3], b"def");
        assert!(!job.thread.finished);

        job.state = RequestState::Fetching;
        execute(&mut job);
        assert_eq!(job.thread.fetched_size, 2);
        assert_eq!(&job.thread.buffer.as_ref().unwrap()[..2], b"gh");
        assert!(job.thread.finished);
    }

    #[test]
    fn test_execute_missing_file_fails() {
        let mut job = job_for(PathBuf::from("/no/such/file.gfetch"), None, 0);
        execute(&mut job);
        assert_eq!(job.state, RequestState::Failed);
        assert_eq!(job.thread.error, ErrorCode::NotFound);
        assert!(job.thread.failed);
        assert!(job.thread.finished);
    }

    #[test]
    fn test_execute_no_buffer_while_fetching_fails() {
        let tmp = temp_file(b"data");
        let mut job = job_for(tmp.path().to_path_buf(), None, 0);
        execute(&mut job);
        assert_eq!(job.state, RequestState::Opened);

        // Re-armed for fetching without a buffer: hard failure.
        job.state = RequestState::Fetching;
        execute(&mut job);
        assert_eq!(job.state, RequestState::Failed);
        assert_eq!(job.thread.error, ErrorCode::NoBuffer);
    }

    #[test]
    fn test_execute_buffer_too_small_fails() {
        let tmp = temp_file(b"more than eight bytes");
        let mut job = job_for(tmp.path().to_path_buf(), Some(vec![0; 8]), 0);
        execute(&mut job);
        assert_eq!(job.state, RequestState::Failed);
        assert_eq!(job.thread.error, ErrorCode::BufferTooSmall);
    }

    #[test]
    fn test_execute_chunk_larger_than_buffer_fails() {
        let tmp = temp_file(b"more than eight bytes");
        let mut job = job_for(tmp.path().to_path_buf(), Some(vec![0; 8]), 16);
        execute(&mut job);
        assert_eq!(job.state, RequestState::Failed);
        assert_eq!(job.thread.error, ErrorCode::BufferTooSmall);
    }

    #[test]
    fn test_inline_dispatch_completes_at_submit() {
        let tmp = temp_file(b"xyz");
        let mut dispatch = InlineDispatch::new(4);
        dispatch.submit(job_for(tmp.path().to_path_buf(), Some(vec![0; 8]), 0));
        let job = dispatch.poll().expect("job completed inline");
        assert_eq!(job.state, RequestState::Fetched);
        assert!(dispatch.poll().is_none());
    }

    #[test]
    fn test_threaded_dispatch_round_trip() {
        let tmp = temp_file(b"threaded bytes");
        let mut dispatch = ThreadedDispatch::new(0, 4);
        dispatch.submit(job_for(tmp.path().to_path_buf(), Some(vec![0; 32]), 0));

        let start = std::time::Instant::now();
        let job = loop {
            if let Some(job) = dispatch.poll() {
                break job;
            }
            assert!(start.elapsed().as_secs() < 5, "worker never completed");
            std::thread::sleep(std::time::Duration::from_millis(1));
        };
        assert_eq!(job.state, RequestState::Fetched);
        assert_eq!(job.thread.content_size, 14);
        dispatch.join();
    }

    #[test]
    fn test_threaded_dispatch_join_is_idempotent() {
        let mut dispatch = ThreadedDispatch::new(1, 2);
        dispatch.join();
        dispatch.join();
    }
}
