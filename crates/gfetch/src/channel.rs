//! Channel: lane admission and the pump cycle
//!
//! A channel bounds its concurrently-processed requests to a fixed
//! number of lanes and shuttles request records between the user-side
//! queues and its dispatch strategy. All queues here are plain rings of
//! slot indices; only the `Job` hand-off to the dispatch crosses a
//! thread boundary.
//!
//! One pump (`dowork`) runs four steps in order:
//!
//! 1. admit sent requests into free lanes
//! 2. apply pending flags, pre-transition, and hand admitted requests
//!    to the dispatch
//! 3. collect completed jobs back into the user-side view
//! 4. drain the outgoing queue, invoking the callback for each item and
//!    either recycling it or feeding it back in for its next pass
//!
//! Callbacks always run on the pumping thread, never on the worker.

use gfetch_core::constants::LANE_NONE;
use gfetch_core::{kdebug, ErrorCode, RequestId, RequestState, RingBuffer};

use crate::dispatch::{Dispatch, DispatchMode, InlineDispatch, Job, ThreadedDispatch};
use crate::pool::RequestPool;
use crate::request::{PendingFlag, Response};

pub(crate) struct Channel {
    index: usize,
    /// Free concurrency tickets. A request holds one lane from
    /// admission until it is recycled.
    free_lanes: RingBuffer,
    /// Sent but not yet admitted.
    sent: RingBuffer,
    /// Admitted; waiting for flag application and hand-off.
    incoming: RingBuffer,
    /// Completed a pass (or short-circuited); waiting for its callback.
    outgoing: RingBuffer,
    dispatch: Box<dyn Dispatch>,
}

impl Channel {
    pub(crate) fn new(
        index: usize,
        max_requests: usize,
        num_lanes: usize,
        mode: DispatchMode,
    ) -> Self {
        let mut free_lanes = RingBuffer::with_capacity(num_lanes);
        for lane in 0..num_lanes {
            free_lanes.enqueue(lane as u32);
        }
        let dispatch: Box<dyn Dispatch> = match mode {
            DispatchMode::Threaded => Box::new(ThreadedDispatch::new(index, num_lanes)),
            DispatchMode::Inline => Box::new(InlineDispatch::new(num_lanes)),
        };
        kdebug!("channel {}: {} lanes, {:?} dispatch", index, num_lanes, mode);
        Channel {
            index,
            free_lanes,
            sent: RingBuffer::with_capacity(max_requests),
            incoming: RingBuffer::with_capacity(max_requests),
            outgoing: RingBuffer::with_capacity(max_requests),
            dispatch,
        }
    }

    /// Queue a freshly sent request. False if the sent queue is full;
    /// the caller then frees the pool slot and reports the failure.
    pub(crate) fn try_enqueue_sent(&mut self, slot: u32) -> bool {
        if self.sent.full() {
            return false;
        }
        self.sent.enqueue(slot);
        true
    }

    /// One pump cycle over this channel.
    pub(crate) fn dowork(&mut self, pool: &mut RequestPool) {
        self.admit(pool);
        self.dispatch_incoming(pool);
        self.collect_completed(pool);
        self.drain_outgoing(pool);
    }

    /// Stop the dispatch strategy. In-flight requests never complete
    /// and their callbacks never fire again.
    pub(crate) fn shutdown(&mut self) {
        self.dispatch.join();
    }

    /// Step 1: the sole admission-control point. Requests leave the
    /// sent queue only while a lane is free, in send order.
    fn admit(&mut self, pool: &mut RequestPool) {
        while !self.sent.empty() && !self.free_lanes.empty() {
            let slot_index = self.sent.dequeue();
            let lane = self.free_lanes.dequeue();
            pool.slot_mut(slot_index).lane = lane;
            self.incoming.enqueue(slot_index);
            kdebug!("channel {}: slot {} admitted on lane {}", self.index, slot_index, lane);
        }
    }

    /// Step 2: apply pending pause/resume, route cancelled and paused
    /// items straight to the outgoing queue, pre-transition the rest
    /// and hand them to the dispatch with their thread view on board.
    fn dispatch_incoming(&mut self, pool: &mut RequestPool) {
        for _ in 0..self.incoming.count() {
            let slot_index = self.incoming.dequeue();
            let slot = pool.slot_mut(slot_index);

            if slot.pending_cancel {
                // Resolved at the drain point below, without touching
                // the worker.
                self.outgoing.enqueue(slot_index);
                continue;
            }
            match std::mem::take(&mut slot.pending_pause) {
                PendingFlag::Pause => slot.state = RequestState::Paused,
                PendingFlag::Resume => {
                    if slot.state == RequestState::Paused {
                        // Re-armed for another fetch pass.
                        slot.state = RequestState::Fetched;
                    }
                }
                PendingFlag::None => {}
            }
            if slot.state == RequestState::Paused {
                // Paused items skip the worker but still get their
                // callback once per pump.
                self.outgoing.enqueue(slot_index);
                continue;
            }

            slot.state = match slot.state {
                RequestState::Allocated => RequestState::Opening,
                RequestState::Opened | RequestState::Fetched => RequestState::Fetching,
                other => other,
            };

            let mut thread = slot
                .thread
                .take()
                .expect("thread view present for user-side request");
            if slot.user.buffer.is_some() {
                thread.buffer = slot.user.buffer.take();
            }
            self.dispatch.submit(Job {
                slot: slot_index,
                state: slot.state,
                chunk_size: slot.chunk_size,
                thread,
            });
        }
    }

    /// Step 3: merge completed jobs back into the user-side view.
    fn collect_completed(&mut self, pool: &mut RequestPool) {
        while let Some(mut job) = self.dispatch.poll() {
            let slot = pool.slot_mut(job.slot);
            slot.state = job.state;
            slot.user.content_size = job.thread.content_size;
            slot.user.fetched_offset = job.thread.fetched_offset;
            slot.user.fetched_size = job.thread.fetched_size;
            slot.user.error = job.thread.error;
            slot.user.finished = job.thread.finished;
            slot.user.buffer = job.thread.buffer.take();
            slot.thread = Some(job.thread);
            self.outgoing.enqueue(job.slot);
        }
    }

    /// Step 4: drain the outgoing queue completely. Every item gets its
    /// callback exactly once per pass through here, then is either
    /// recycled (lane and slot freed) or fed back into the incoming
    /// queue, keeping its lane.
    fn drain_outgoing(&mut self, pool: &mut RequestPool) {
        while !self.outgoing.empty() {
            let slot_index = self.outgoing.dequeue();

            // Deferred cancellation is observed here, turning whatever
            // the request was doing into its terminal callback.
            let slot = pool.slot_mut(slot_index);
            if slot.pending_cancel {
                slot.pending_cancel = false;
                slot.state = RequestState::Failed;
                slot.user.error = ErrorCode::Cancelled;
                slot.user.finished = true;
            }

            let finished = self.invoke_callback(pool, slot_index);

            if finished {
                let slot = pool.slot_mut(slot_index);
                let lane = slot.lane;
                let id = RequestId::new(slot_index, slot.gen);
                debug_assert!(lane != LANE_NONE);
                self.free_lanes.enqueue(lane);
                pool.free(id);
                kdebug!("channel {}: slot {} finished, lane {} freed", self.index, slot_index, lane);
            } else {
                self.incoming.enqueue(slot_index);
            }
        }
    }

    /// Build the response, run the callback, and apply the actions it
    /// recorded. Returns the request's finished flag.
    fn invoke_callback(&mut self, pool: &mut RequestPool, slot_index: u32) -> bool {
        let slot = pool.slot_mut(slot_index);
        let mut callback = match slot.callback.take() {
            Some(callback) => callback,
            None => return slot.user.finished,
        };

        // The caller buffer moves into the response for the duration of
        // the callback, so the callback can read the chunk, replace the
        // buffer, or take it back.
        let buffer = slot.user.buffer.take();
        let mut response = Response {
            handle: RequestId::new(slot_index, slot.gen),
            state: slot.state,
            finished: slot.user.finished,
            channel: self.index,
            lane: slot.lane,
            path: &slot.path,
            error: slot.user.error,
            content_size: slot.user.content_size,
            data_offset: slot.user.fetched_offset - slot.user.fetched_size,
            chunk_len: slot.user.fetched_size as usize,
            user_data: slot.user_data,
            buffer,
            pending_pause: PendingFlag::None,
            pending_cancel: false,
        };
        callback(&mut response);

        let finished = response.finished;
        let buffer_back = response.buffer.take();
        let pause = response.pending_pause;
        let cancel = response.pending_cancel;
        drop(response);

        slot.callback = Some(callback);
        slot.user.buffer = buffer_back;
        if pause != PendingFlag::None {
            slot.pending_pause = pause;
        }
        if cancel {
            slot.pending_cancel = true;
        }
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{Slot, ThreadView, UserData};
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn temp_file(content: &[u8]) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(content).unwrap();
        tmp.flush().unwrap();
        tmp
    }

    fn send_to(
        pool: &mut RequestPool,
        channel: &mut Channel,
        slot_setup: impl FnOnce(&mut Slot),
    ) -> RequestId {
        let id = pool.allocate().unwrap();
        let slot = pool.slot_mut(id.slot());
        slot_setup(slot);
        assert!(channel.try_enqueue_sent(id.slot()));
        id
    }

    #[test]
    fn test_lane_cap_respected() {
        let tmp = temp_file(b"0123456789abcdef");
        let path = tmp.path().to_path_buf();

        let mut pool = RequestPool::new(8);
        let mut channel = Channel::new(0, 8, 2, DispatchMode::Inline);
        let calls = Arc::new(AtomicUsize::new(0));
        let active: Arc<Mutex<HashMap<RequestId, usize>>> = Arc::new(Mutex::new(HashMap::new()));

        // Five chunked requests on a two-lane channel; each needs
        // several passes, so admission must be strictly bounded.
        let mut ids = Vec::new();
        for _ in 0..5 {
            let calls = Arc::clone(&calls);
            let active = Arc::clone(&active);
            let path = path.clone();
            ids.push(send_to(&mut pool, &mut channel, move |slot| {
                slot.path = path.clone();
                slot.chunk_size = 4;
                slot.user.buffer = Some(vec![0; 4]);
                slot.user_data = UserData::empty();
                slot.thread = Some(ThreadView::new(path));
                slot.callback = Some(Box::new(move |resp| {
                    assert!(resp.lane() < 2, "lane index exceeds cap");
                    // No two live requests may share a lane.
                    let mut active = active.lock().unwrap();
                    active.insert(resp.handle(), resp.lane());
                    let mut lanes: Vec<_> = active.values().collect();
                    lanes.sort();
                    lanes.dedup();
                    assert_eq!(lanes.len(), active.len(), "lane collision");
                    if resp.finished() {
                        active.remove(&resp.handle());
                    }
                    calls.fetch_add(1, Ordering::SeqCst);
                }));
            }));
        }

        for _ in 0..32 {
            channel.dowork(&mut pool);
            assert!(pool.in_use() <= 8);
        }
        for id in ids {
            assert!(!pool.contains(id), "request did not complete");
        }
        // 16 bytes in 4-byte chunks: four Fetched callbacks per request.
        assert_eq!(calls.load(Ordering::SeqCst), 20);
        channel.shutdown();
    }

    #[test]
    fn test_sent_queue_full_reports_failure() {
        let mut channel = Channel::new(0, 2, 1, DispatchMode::Inline);
        assert!(channel.try_enqueue_sent(0));
        assert!(channel.try_enqueue_sent(1));
        assert!(!channel.try_enqueue_sent(2));
    }
}
