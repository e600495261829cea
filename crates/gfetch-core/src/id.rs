//! Request handle type
//!
//! A `RequestId` identifies one in-flight request in the request pool.
//! It pairs a pool slot index with the generation counter the slot had
//! when the request was allocated. A slot can be recycled for a new
//! request; the generation counter is what distinguishes a stale handle
//! from a live one, without ever dereferencing freed state.

use core::fmt;

/// Sentinel slot index meaning "no slot".
pub const SLOT_NONE: u32 = u32::MAX;

/// Generation-counted handle for one request.
///
/// Returned by `send`. All handle-taking operations tolerate stale or
/// invalid handles by doing nothing, so a caller may keep a handle
/// around past the request's terminal callback without risk.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId {
    slot: u32,
    gen: u32,
}

impl RequestId {
    /// The invalid handle, returned by `send` on pool or queue exhaustion.
    pub const INVALID: RequestId = RequestId {
        slot: SLOT_NONE,
        gen: 0,
    };

    /// Create a handle from a slot index and generation counter.
    #[inline]
    pub const fn new(slot: u32, gen: u32) -> Self {
        RequestId { slot, gen }
    }

    /// Pool slot index this handle refers to.
    #[inline]
    pub const fn slot(self) -> u32 {
        self.slot
    }

    /// Generation counter captured at allocation time.
    #[inline]
    pub const fn generation(self) -> u32 {
        self.gen
    }

    /// Check whether this is the invalid sentinel.
    ///
    /// Note that a non-sentinel handle can still be stale; only the
    /// engine's `handle_valid` can tell, by comparing generations.
    #[inline]
    pub const fn is_invalid(self) -> bool {
        self.slot == SLOT_NONE
    }
}

impl Default for RequestId {
    fn default() -> Self {
        RequestId::INVALID
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            write!(f, "RequestId(INVALID)")
        } else {
            write!(f, "RequestId({}:{})", self.slot, self.gen)
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_invalid() {
            write!(f, "invalid")
        } else {
            write!(f, "{}:{}", self.slot, self.gen)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_basics() {
        let id = RequestId::new(7, 3);
        assert_eq!(id.slot(), 7);
        assert_eq!(id.generation(), 3);
        assert!(!id.is_invalid());
    }

    #[test]
    fn test_request_id_invalid() {
        let id = RequestId::INVALID;
        assert!(id.is_invalid());
        assert_eq!(RequestId::default(), RequestId::INVALID);
    }

    #[test]
    fn test_request_id_generation_distinguishes() {
        // Same slot, different generation: these are different requests.
        let old = RequestId::new(4, 1);
        let new = RequestId::new(4, 2);
        assert_ne!(old, new);
    }
}
