//! Request pool
//!
//! Owns every request record. Slots are recycled through a free-list
//! ring; each allocation bumps the slot's generation counter, so a
//! handle kept past its request's terminal callback fails validation in
//! O(1) instead of reaching freed state.
//!
//! The pool is touched only by the thread that owns the engine. Workers
//! never see it; they operate on the thread view handed to them by id.

use gfetch_core::{RequestId, RequestState, RingBuffer};

use crate::request::Slot;

pub(crate) struct RequestPool {
    slots: Vec<Slot>,
    /// Indices of unused slots.
    free: RingBuffer,
}

impl RequestPool {
    /// Create a pool of `max_requests` slots. This is the only place
    /// the pool allocates.
    pub(crate) fn new(max_requests: usize) -> Self {
        let mut free = RingBuffer::with_capacity(max_requests);
        for index in 0..max_requests {
            free.enqueue(index as u32);
        }
        RequestPool {
            slots: (0..max_requests).map(|_| Slot::unused()).collect(),
            free,
        }
    }

    /// Claim a slot for a new request.
    ///
    /// Returns `None` when the pool is exhausted; the caller surfaces
    /// that as the invalid handle.
    pub(crate) fn allocate(&mut self) -> Option<RequestId> {
        if self.free.empty() {
            return None;
        }
        let index = self.free.dequeue();
        let slot = &mut self.slots[index as usize];
        slot.gen = slot.gen.wrapping_add(1);
        slot.state = RequestState::Allocated;
        Some(RequestId::new(index, slot.gen))
    }

    /// Recycle a slot after its terminal callback. Stale handles no-op.
    pub(crate) fn free(&mut self, id: RequestId) {
        if !self.contains(id) {
            return;
        }
        self.slots[id.slot() as usize].reset();
        self.free.enqueue(id.slot());
    }

    /// True iff `id` refers to a live request: index in range, slot
    /// occupied, and the generation matches.
    pub(crate) fn contains(&self, id: RequestId) -> bool {
        if id.is_invalid() {
            return false;
        }
        match self.slots.get(id.slot() as usize) {
            Some(slot) => slot.state != RequestState::Initial && slot.gen == id.generation(),
            None => false,
        }
    }

    /// Look up a live request by handle.
    pub(crate) fn get_mut(&mut self, id: RequestId) -> Option<&mut Slot> {
        if self.contains(id) {
            Some(&mut self.slots[id.slot() as usize])
        } else {
            None
        }
    }

    /// Direct slot access for channel internals, which track raw
    /// indices through the queues.
    pub(crate) fn slot_mut(&mut self, index: u32) -> &mut Slot {
        &mut self.slots[index as usize]
    }

    /// Number of slots currently allocated.
    pub(crate) fn in_use(&self) -> usize {
        self.slots.len() - self.free.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_contains() {
        let mut pool = RequestPool::new(4);
        let id = pool.allocate().unwrap();
        assert!(pool.contains(id));
        assert_eq!(pool.in_use(), 1);
        assert!(!pool.contains(RequestId::INVALID));
    }

    #[test]
    fn test_exhaustion_and_recovery() {
        let mut pool = RequestPool::new(2);
        let a = pool.allocate().unwrap();
        let _b = pool.allocate().unwrap();
        assert!(pool.allocate().is_none());

        // Freeing one slot allows exactly one more allocation.
        pool.free(a);
        assert!(pool.allocate().is_some());
        assert!(pool.allocate().is_none());
    }

    #[test]
    fn test_free_invalidates_handle() {
        let mut pool = RequestPool::new(2);
        let id = pool.allocate().unwrap();
        pool.free(id);
        assert!(!pool.contains(id));
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_reused_slot_rejects_stale_handle() {
        let mut pool = RequestPool::new(1);
        let old = pool.allocate().unwrap();
        pool.free(old);

        let new = pool.allocate().unwrap();
        assert_eq!(old.slot(), new.slot());
        assert_ne!(old.generation(), new.generation());
        assert!(pool.contains(new));
        assert!(!pool.contains(old));
    }

    #[test]
    fn test_double_free_is_noop() {
        let mut pool = RequestPool::new(2);
        let id = pool.allocate().unwrap();
        pool.free(id);
        pool.free(id);
        assert_eq!(pool.in_use(), 0);
        // Both slots still allocatable exactly once each.
        assert!(pool.allocate().is_some());
        assert!(pool.allocate().is_some());
        assert!(pool.allocate().is_none());
    }

    #[test]
    fn test_out_of_range_handle() {
        let pool = RequestPool::new(2);
        assert!(!pool.contains(RequestId::new(99, 1)));
    }
}
