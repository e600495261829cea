//! Fixed-capacity ring buffer of slot indices
//!
//! The base queue used throughout the engine: free slots in the pool,
//! free lanes, and the per-channel sent/incoming/outgoing queues are
//! all rings of `u32` slot ids.
//!
//! The ring is not itself thread-safe; queues shared with a worker
//! thread are wrapped in a lock by their owner. One backing slot is
//! sacrificed so that full and empty are distinguishable from the
//! head/tail indices alone, without a separate element counter.
//!
//! Enqueue on a full ring and dequeue from an empty ring are programming
//! errors, not recoverable conditions: callers are required to check
//! `full()` / `empty()` first, and violations panic.

/// FIFO queue of `u32` ids with a capacity fixed at construction.
pub struct RingBuffer {
    buf: Vec<u32>,
    /// Write position. Advances on enqueue.
    head: usize,
    /// Read position. Advances on dequeue.
    tail: usize,
}

impl RingBuffer {
    /// Create a ring that can hold up to `capacity` ids.
    ///
    /// Allocates `capacity + 1` backing slots. This is the only
    /// allocation the ring ever performs.
    ///
    /// # Panics
    /// Panics if `capacity == 0`.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be > 0");
        RingBuffer {
            buf: vec![0; capacity + 1],
            head: 0,
            tail: 0,
        }
    }

    /// Maximum number of ids the ring can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len() - 1
    }

    /// Number of ids currently queued.
    #[inline]
    pub fn count(&self) -> usize {
        (self.head + self.buf.len() - self.tail) % self.buf.len()
    }

    /// True if no more ids can be enqueued.
    #[inline]
    pub fn full(&self) -> bool {
        self.count() == self.capacity()
    }

    /// True if no ids are queued.
    #[inline]
    pub fn empty(&self) -> bool {
        self.head == self.tail
    }

    /// Append an id at the head.
    ///
    /// # Panics
    /// Panics if the ring is full.
    pub fn enqueue(&mut self, id: u32) {
        assert!(!self.full(), "enqueue on full ring");
        self.buf[self.head] = id;
        self.head = (self.head + 1) % self.buf.len();
    }

    /// Remove and return the oldest id from the tail.
    ///
    /// # Panics
    /// Panics if the ring is empty.
    pub fn dequeue(&mut self) -> u32 {
        assert!(!self.empty(), "dequeue on empty ring");
        let id = self.buf[self.tail];
        self.tail = (self.tail + 1) % self.buf.len();
        id
    }

    /// Return the `index`-th queued id (0 = oldest) without removing it.
    ///
    /// Used to batch-inspect pending items before dispatch.
    ///
    /// # Panics
    /// Panics if `index >= count()`.
    pub fn peek(&self, index: usize) -> u32 {
        assert!(index < self.count(), "peek index out of range");
        self.buf[(self.tail + index) % self.buf.len()]
    }
}
